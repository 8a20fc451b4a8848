//! Multiplexer registration.
//!
//! ```ignore
//! let mut services = Services::new();
//! let mux = services
//!     .begin_registering_multiplexer::<SqlContext>()
//!     .add_connection_profile("tenant one", |o| {
//!         o.use_connection_string("postgres://app@db1/tenant_one");
//!     })?
//!     .add_connection_profile("tenant two", |o| {
//!         o.use_connection_string("postgres://app@db2/tenant_two");
//!     })?
//!     .finish()?;
//!
//! let ctx = mux.get("tenant one").await?;
//! ```

use crate::config::{DEFAULT_CONTEXT_ACQUIRE_TIMEOUT_SECS, DEFAULT_MAX_POOL_SIZE};
use crate::db::context::{ContextOptionsBuilder, DataContext};
use crate::error::{DbError, DbResult};
use crate::mux::context_pool::Configure;
use crate::mux::contract::{Contract, synthesize};
use crate::mux::multiplexer::Multiplexer;
use crate::mux::services::{ServiceCollection, Services};
use crate::mux::slug::normalize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

struct ConnectionProfile {
    name: String,
    configure: Configure,
}

impl Services {
    /// Start registering a multiplexer over a [`DataContext`] type.
    pub fn begin_registering_multiplexer<T: DataContext>(&mut self) -> MultiplexerBuilder<'_, T> {
        MultiplexerBuilder::new(self, Contract::of())
    }

    /// Start registering a multiplexer over a type described by `contract`.
    pub fn begin_registering_multiplexer_with<T: Send + 'static>(
        &mut self,
        contract: Contract<T>,
    ) -> MultiplexerBuilder<'_, T> {
        MultiplexerBuilder::new(self, contract)
    }
}

/// Collects connection profiles, then builds one pool per profile.
///
/// Single use: once [`finish`](Self::finish) has been called, every further call
/// fails with [`DbError::AlreadyFinished`].
pub struct MultiplexerBuilder<'a, T> {
    services: &'a mut Services,
    contract: Contract<T>,
    profiles: Vec<ConnectionProfile>,
    max_pool_size: usize,
    acquire_timeout: Duration,
    finished: bool,
}

impl<T> std::fmt::Debug for MultiplexerBuilder<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexerBuilder")
            .field("profiles", &self.profiles.len())
            .field("max_pool_size", &self.max_pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<'a, T: Send + 'static> MultiplexerBuilder<'a, T> {
    fn new(services: &'a mut Services, contract: Contract<T>) -> Self {
        Self {
            services,
            contract,
            profiles: Vec::new(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            acquire_timeout: Duration::from_secs(DEFAULT_CONTEXT_ACQUIRE_TIMEOUT_SECS),
            finished: false,
        }
    }

    /// Limit on leased contexts per profile. Applies to every profile.
    pub fn max_pool_size(&mut self, max_pool_size: usize) -> &mut Self {
        self.max_pool_size = max_pool_size;
        self
    }

    /// How long a lease waits for a free context.
    pub fn acquire_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Add a named connection profile.
    ///
    /// `configure` runs once per profile, when the first context is leased.
    pub fn add_connection_profile<F>(
        &mut self,
        name: impl Into<String>,
        configure: F,
    ) -> DbResult<&mut Self>
    where
        F: Fn(&mut ContextOptionsBuilder) + Send + Sync + 'static,
    {
        if self.finished {
            return Err(DbError::AlreadyFinished);
        }

        let name = name.into();
        if name.is_empty() {
            return Err(DbError::invalid_input("Profile name cannot be empty"));
        }
        if self.profiles.iter().any(|p| p.name == name) {
            return Err(DbError::duplicate_profile_name(name));
        }

        debug!(profile = %name, "Added connection profile");
        self.profiles.push(ConnectionProfile {
            name,
            configure: Arc::new(configure),
        });
        Ok(self)
    }

    /// Names added so far, in insertion order.
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    /// Build one context pool per profile and publish the multiplexer.
    ///
    /// Either every profile is registered and the multiplexer is stored in the
    /// [`Services`] container, or the first error is returned and nothing is
    /// published.
    pub fn finish(&mut self) -> DbResult<Arc<Multiplexer<T>>> {
        if self.finished {
            return Err(DbError::AlreadyFinished);
        }
        self.finished = true;

        let profiles = std::mem::take(&mut self.profiles);
        let mut collection = ServiceCollection::new(self.acquire_timeout);
        let mut entries = Vec::with_capacity(profiles.len());
        let mut slugs: HashMap<String, String> = HashMap::new();

        for profile in profiles {
            let slug = normalize(&profile.name);
            if let Some(other) = slugs.insert(slug.clone(), profile.name.clone()) {
                debug!(
                    profile = %profile.name,
                    other = %other,
                    slug = %slug,
                    "Profile names share a slug; kinds stay distinct by namespace"
                );
            }

            let kind = synthesize(&self.contract, &profile.name)?;
            let index = collection.add_context_pool(
                &profile.name,
                kind,
                profile.configure,
                self.max_pool_size,
            )?;
            entries.push((profile.name, index));
        }

        let multiplexer = Arc::new(Multiplexer::new(
            entries,
            collection.build_service_provider(),
        ));
        self.services.add_singleton(Arc::clone(&multiplexer));

        info!(
            contract = self.contract.name(),
            profiles = multiplexer.len(),
            max_pool_size = self.max_pool_size,
            "Registered context multiplexer"
        );

        Ok(multiplexer)
    }
}
