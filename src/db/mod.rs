//! Database abstraction layer.
//!
//! - Connection pools per database backend
//! - Data contexts and the options they are built from

pub mod context;
pub mod pool;

pub use context::{ContextOptions, ContextOptionsBuilder, DataContext, SqlContext};
pub use pool::{DbPool, create_pool};
