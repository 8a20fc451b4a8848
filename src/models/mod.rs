//! Data models for the context multiplexer.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DatabaseType};
