//! Context multiplexing.
//!
//! One bounded context pool per named connection profile, resolved by name at
//! runtime:
//! - [`slug`]: profile name normalization
//! - [`contract`]: per-profile context kinds
//! - [`context_pool`]: bounded pools and leases
//! - [`services`]: pool registration and the singleton container
//! - [`builder`]: profile registration
//! - [`multiplexer`]: lookup by name

pub mod builder;
pub mod context_pool;
pub mod contract;
pub mod multiplexer;
pub mod services;
pub mod slug;

pub use builder::MultiplexerBuilder;
pub use context_pool::{Configure, ContextPool, Pooled};
pub use contract::{ContextKind, Contract, synthesize};
pub use multiplexer::{Multiplexer, ProfileSummary};
pub use services::{PoolIndex, ServiceCollection, ServiceProvider, Services};
pub use slug::normalize;
