//! Service registration and lookup.
//!
//! [`ServiceCollection`] accepts context pool registrations keyed by context kind and
//! freezes into an immutable [`ServiceProvider`]. Pools live in an arena indexed by
//! [`PoolIndex`]; a provider never grows or shrinks after it is built.
//!
//! [`Services`] is the application-level container multiplexers are published into.

use crate::error::{DbError, DbResult};
use crate::mux::context_pool::{Configure, ContextPool, Pooled};
use crate::mux::contract::ContextKind;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Position of a registered pool inside its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolIndex(usize);

/// Mutable set of context pool registrations.
pub struct ServiceCollection<T> {
    pools: Vec<Arc<ContextPool<T>>>,
    kinds: HashSet<String>,
    acquire_timeout: Duration,
}

impl<T: Send + 'static> ServiceCollection<T> {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            pools: Vec::new(),
            kinds: HashSet::new(),
            acquire_timeout,
        }
    }

    /// Register a pool of `kind` contexts for `profile`, bounded by `max_pool_size`.
    ///
    /// Fails with [`DbError::PoolRegistration`] if the kind is already registered or
    /// the size limit is unusable.
    pub fn add_context_pool(
        &mut self,
        profile: &str,
        kind: ContextKind<T>,
        configure: Configure,
        max_pool_size: usize,
    ) -> DbResult<PoolIndex> {
        if max_pool_size == 0 {
            return Err(DbError::pool_registration(
                profile,
                "max pool size must be greater than 0",
            ));
        }
        if max_pool_size > Semaphore::MAX_PERMITS {
            return Err(DbError::pool_registration(
                profile,
                format!(
                    "max pool size {} exceeds the limit of {}",
                    max_pool_size,
                    Semaphore::MAX_PERMITS
                ),
            ));
        }
        if !self.kinds.insert(kind.identifier().to_string()) {
            return Err(DbError::pool_registration(
                profile,
                format!("context kind '{}' is already registered", kind),
            ));
        }

        debug!(
            profile = %profile,
            kind = %kind,
            max_pool_size,
            "Registered context pool"
        );

        let index = PoolIndex(self.pools.len());
        self.pools.push(Arc::new(ContextPool::new(
            profile,
            kind,
            configure,
            max_pool_size,
            self.acquire_timeout,
        )));
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Freeze the registrations.
    pub fn build_service_provider(self) -> ServiceProvider<T> {
        ServiceProvider {
            pools: self.pools.into(),
        }
    }
}

/// Immutable lookup over registered context pools.
pub struct ServiceProvider<T> {
    pools: Arc<[Arc<ContextPool<T>>]>,
}

impl<T: Send + 'static> ServiceProvider<T> {
    /// Lease a context from the pool at `index`.
    pub async fn resolve(&self, index: PoolIndex) -> DbResult<Pooled<T>> {
        self.pool(index)?.lease().await
    }

    pub fn pool(&self, index: PoolIndex) -> DbResult<&Arc<ContextPool<T>>> {
        self.pools
            .get(index.0)
            .ok_or_else(|| DbError::internal(format!("No context pool at index {}", index.0)))
    }

    pub fn pools(&self) -> impl Iterator<Item = &Arc<ContextPool<T>>> {
        self.pools.iter()
    }

    pub async fn close_all(&self) {
        for pool in self.pools.iter() {
            pool.close().await;
        }
    }
}

impl<T> Clone for ServiceProvider<T> {
    fn clone(&self) -> Self {
        Self {
            pools: Arc::clone(&self.pools),
        }
    }
}

impl<T> std::fmt::Debug for ServiceProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.pools.iter()).finish()
    }
}

/// Application-level container of singleton services, keyed by type.
#[derive(Default)]
pub struct Services {
    singletons: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `service` as the singleton for its type, replacing any previous one.
    pub fn add_singleton<S: Any + Send + Sync>(&mut self, service: Arc<S>) -> &mut Self {
        if self
            .singletons
            .insert(TypeId::of::<S>(), service)
            .is_some()
        {
            warn!(
                service = std::any::type_name::<S>(),
                "Replaced previously registered singleton"
            );
        }
        self
    }

    pub fn get<S: Any + Send + Sync>(&self) -> Option<Arc<S>> {
        self.singletons
            .get(&TypeId::of::<S>())
            .and_then(|service| Arc::clone(service).downcast::<S>().ok())
    }

    pub fn contains<S: Any + Send + Sync>(&self) -> bool {
        self.singletons.contains_key(&TypeId::of::<S>())
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("singletons", &self.singletons.len())
            .finish()
    }
}
