//! DB Context Multiplexer Library
//!
//! Registers one bounded pool of data contexts per named connection profile and
//! hands out leased contexts by profile name at runtime.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod mux;

pub use config::Config;
pub use db::{ContextOptions, ContextOptionsBuilder, DataContext, SqlContext};
pub use error::{DbError, DbResult};
pub use mux::{Contract, Multiplexer, MultiplexerBuilder, Pooled, Services};
