//! Named lookup over per-profile context pools.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use crate::mux::context_pool::{ContextPool, Pooled};
use crate::mux::services::{PoolIndex, ServiceProvider};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Status of one profile's pool. No connection secrets.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    /// Identifier of the context kind synthesized for the profile.
    pub kind: String,
    /// Only known once the profile's options have been built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<DatabaseType>,
    pub max_pool_size: usize,
    pub leased: usize,
    pub idle: usize,
    pub created: usize,
}

/// Immutable registry of named context pools.
///
/// Safe to share across tasks; all mutable state lives inside the pools.
pub struct Multiplexer<T> {
    names: Vec<String>,
    index: HashMap<String, PoolIndex>,
    provider: ServiceProvider<T>,
}

impl<T: Send + 'static> Multiplexer<T> {
    pub(crate) fn new(entries: Vec<(String, PoolIndex)>, provider: ServiceProvider<T>) -> Self {
        let names = entries.iter().map(|(name, _)| name.clone()).collect();
        let index = entries.into_iter().collect();
        Self {
            names,
            index,
            provider,
        }
    }

    /// Lease a context from the pool registered under `name`.
    pub async fn get(&self, name: &str) -> DbResult<Pooled<T>> {
        self.provider.resolve(self.lookup(name)?).await
    }

    /// Lease one context per registered profile.
    ///
    /// Fails with the first error; leases already taken are returned to their pools.
    pub async fn get_all(&self) -> DbResult<HashMap<String, Pooled<T>>> {
        let leases = try_join_all(self.names.iter().map(|name| async move {
            let ctx = self.get(name).await?;
            Ok::<_, DbError>((name.clone(), ctx))
        }))
        .await?;
        Ok(leases.into_iter().collect())
    }

    /// Registered profile names, in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Identifier of the context kind registered for `name`.
    pub fn kind(&self, name: &str) -> DbResult<&str> {
        Ok(self.pool(name)?.kind().identifier())
    }

    pub fn pool(&self, name: &str) -> DbResult<&Arc<ContextPool<T>>> {
        self.provider.pool(self.lookup(name)?)
    }

    /// Per-profile pool status, in insertion order.
    pub fn summaries(&self) -> Vec<ProfileSummary> {
        self.provider
            .pools()
            .map(|pool| ProfileSummary {
                name: pool.profile().to_string(),
                kind: pool.kind().identifier().to_string(),
                db_type: pool
                    .built_options()
                    .and_then(|o| o.connection())
                    .map(|c| c.db_type),
                max_pool_size: pool.max_pool_size(),
                leased: pool.leased(),
                idle: pool.idle(),
                created: pool.created(),
            })
            .collect()
    }

    /// Close every profile's database pool.
    pub async fn close_all(&self) {
        self.provider.close_all().await;
        info!(profiles = self.names.len(), "All profile pools closed");
    }

    fn lookup(&self, name: &str) -> DbResult<PoolIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::unknown_profile_name(name))
    }
}

impl<T> std::fmt::Debug for Multiplexer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("names", &self.names)
            .field("provider", &self.provider)
            .finish()
    }
}
