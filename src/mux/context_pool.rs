//! Bounded pools of data contexts, one per connection profile.
//!
//! # Design Decisions
//!
//! - **`OnceCell` for options**: the configuration callback runs once per pool, on the
//!   first lease; concurrent first leases wait for the same build
//! - **`Semaphore` for capacity**: at most `max_pool_size` contexts are leased at a time;
//!   waiting is bounded by the acquire timeout
//! - **`std::sync::Mutex` for idle contexts**: never held across an await, usable from Drop
//!
//! Returned contexts go back to the idle list after the contract's reset hook runs,
//! so a later lease reuses them instead of constructing a new one.

use crate::db::context::{ContextOptions, ContextOptionsBuilder};
use crate::error::{DbError, DbResult};
use crate::mux::contract::ContextKind;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Per-profile configuration callback.
pub type Configure = Arc<dyn Fn(&mut ContextOptionsBuilder) + Send + Sync>;

/// Pool of contexts for a single profile.
pub struct ContextPool<T> {
    profile: String,
    kind: ContextKind<T>,
    configure: Configure,
    max_pool_size: usize,
    acquire_timeout: Duration,
    options: OnceCell<ContextOptions>,
    idle: Mutex<Vec<T>>,
    permits: Arc<Semaphore>,
    created: AtomicUsize,
}

impl<T: Send + 'static> ContextPool<T> {
    pub(crate) fn new(
        profile: impl Into<String>,
        kind: ContextKind<T>,
        configure: Configure,
        max_pool_size: usize,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            profile: profile.into(),
            kind,
            configure,
            max_pool_size,
            acquire_timeout,
            options: OnceCell::new(),
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(max_pool_size)),
            created: AtomicUsize::new(0),
        }
    }

    /// Lease a context, reusing an idle one when available.
    ///
    /// Waits for a free slot when `max_pool_size` contexts are already leased and
    /// fails with [`DbError::Timeout`] once the acquire timeout expires.
    pub async fn lease(self: &Arc<Self>) -> DbResult<Pooled<T>> {
        let permit = tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        .map_err(|_| {
            DbError::timeout(
                format!("context lease for profile '{}'", self.profile),
                self.acquire_timeout.as_secs_f64().ceil() as u32,
            )
        })?
        .map_err(|_| {
            DbError::connection(
                format!("Context pool for profile '{}' is closed", self.profile),
                "Rebuild the multiplexer",
            )
        })?;

        let options = self.options().await?;

        let reused = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        let instance = match reused {
            Some(instance) => instance,
            None => {
                let created = self.created.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(
                    profile = %self.profile,
                    kind = %self.kind,
                    created,
                    "Constructing new context"
                );
                self.kind.construct(options.clone())
            }
        };

        Ok(Pooled {
            instance: Some(instance),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Options for this profile, built on first use.
    ///
    /// A failed build is not cached; the next lease runs the callback again.
    pub async fn options(&self) -> DbResult<&ContextOptions> {
        self.options
            .get_or_try_init(|| async {
                let mut builder =
                    ContextOptionsBuilder::new(&self.profile, self.kind.identifier());
                (self.configure)(&mut builder);
                builder.build().await
            })
            .await
    }

    fn give_back(&self, mut instance: T) {
        self.kind.reset(&mut instance);
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_pool_size {
                idle.push(instance);
            }
        }
    }

    /// Close the profile's database pool, if one was opened.
    pub async fn close(&self) {
        self.permits.close();
        if let Some(pool) = self.options.get().and_then(|o| o.pool()) {
            pool.close().await;
        }
    }
}

impl<T> ContextPool<T> {
    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn kind(&self) -> &ContextKind<T> {
        &self.kind
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Number of contexts currently leased.
    pub fn leased(&self) -> usize {
        self.max_pool_size - self.permits.available_permits()
    }

    /// Number of returned contexts waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Number of contexts constructed over the pool's lifetime.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    /// Options, if a lease has already built them.
    pub fn built_options(&self) -> Option<&ContextOptions> {
        self.options.get()
    }
}

impl<T> fmt::Debug for ContextPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool")
            .field("profile", &self.profile)
            .field("kind", &self.kind.identifier())
            .field("max_pool_size", &self.max_pool_size)
            .field("leased", &self.leased())
            .field("idle", &self.idle())
            .finish_non_exhaustive()
    }
}

/// A leased context.
///
/// Dereferences to the context. Dropping the lease returns the context to its
/// profile's pool and frees the slot.
pub struct Pooled<T: Send + 'static> {
    instance: Option<T>,
    pool: Arc<ContextPool<T>>,
    _permit: OwnedSemaphorePermit,
}

impl<T: Send + 'static> Pooled<T> {
    pub fn profile(&self) -> &str {
        self.pool.profile()
    }

    /// Identifier of the context kind this lease came from.
    pub fn kind(&self) -> &str {
        self.pool.kind().identifier()
    }
}

impl<T: Send + 'static> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only taken in Drop.
        self.instance.as_ref().expect("pooled context present until drop")
    }
}

impl<T: Send + 'static> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.instance.as_mut().expect("pooled context present until drop")
    }
}

impl<T: Send + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.pool.give_back(instance);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("profile", &self.pool.profile())
            .field("instance", &self.instance)
            .finish()
    }
}
