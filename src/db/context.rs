//! Data contexts and the options they are constructed from.
//!
//! A data context is the unit a multiplexer pools: one instance per lease,
//! constructed from the [`ContextOptions`] of the profile it belongs to.

use crate::config::{ProfileConfig, PoolOptions};
use crate::db::pool::{DbPool, create_pool};
use crate::error::{DbError, DbResult};
use crate::models::ConnectionConfig;
use tracing::debug;

/// Base contract for pooled data contexts.
pub trait DataContext: Send + 'static {
    /// Construct a context from its profile's options.
    fn from_options(options: ContextOptions) -> Self;

    /// Called when a leased context is returned to its pool.
    fn reset(&mut self) {}
}

/// Configuration a context is constructed from.
///
/// Cloning is cheap: the database pool is reference-counted, so every context of
/// one profile shares the same underlying connections.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    profile: String,
    kind: String,
    connection: Option<ConnectionConfig>,
    pool: Option<DbPool>,
}

impl ContextOptions {
    /// Name of the connection profile.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Identifier of the context kind synthesized for the profile.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn connection(&self) -> Option<&ConnectionConfig> {
        self.connection.as_ref()
    }

    pub fn pool(&self) -> Option<&DbPool> {
        self.pool.as_ref()
    }
}

/// Collects a profile's settings inside its configuration callback.
#[derive(Debug)]
pub struct ContextOptionsBuilder {
    profile: String,
    kind: String,
    connection_string: Option<String>,
    writable: bool,
    pool_options: PoolOptions,
}

impl ContextOptionsBuilder {
    pub(crate) fn new(profile: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            kind: kind.into(),
            connection_string: None,
            writable: false,
            pool_options: PoolOptions::default(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Connect contexts of this profile to the given database URL.
    pub fn use_connection_string(&mut self, url: impl Into<String>) -> &mut Self {
        self.connection_string = Some(url.into());
        self
    }

    /// Apply a profile parsed from the command line.
    pub fn use_profile_config(&mut self, config: &ProfileConfig) -> &mut Self {
        self.connection_string = Some(config.connection_string.clone());
        self.writable = config.writable;
        self.pool_options = config.pool_options.clone();
        self
    }

    pub fn writable(&mut self, writable: bool) -> &mut Self {
        self.writable = writable;
        self
    }

    pub fn pool_options(&mut self, pool_options: PoolOptions) -> &mut Self {
        self.pool_options = pool_options;
        self
    }

    pub fn max_connections(&mut self, max_connections: u32) -> &mut Self {
        self.pool_options.max_connections = Some(max_connections);
        self
    }

    /// Resolve the collected settings, connecting the profile's database if one was configured.
    pub(crate) async fn build(self) -> DbResult<ContextOptions> {
        let connection = match self.connection_string {
            Some(url) => Some(
                ConnectionConfig::new(&self.profile, url, self.writable, self.pool_options)
                    .map_err(|e| {
                        DbError::invalid_input(format!("Profile '{}': {}", self.profile, e))
                    })?,
            ),
            None => None,
        };

        let pool = match &connection {
            Some(config) => Some(create_pool(config).await?),
            None => None,
        };

        debug!(
            profile = %self.profile,
            kind = %self.kind,
            connected = pool.is_some(),
            "Built context options"
        );

        Ok(ContextOptions {
            profile: self.profile,
            kind: self.kind,
            connection,
            pool,
        })
    }
}

/// General-purpose context over the profile's database pool.
#[derive(Debug, Clone)]
pub struct SqlContext {
    options: ContextOptions,
}

impl DataContext for SqlContext {
    fn from_options(options: ContextOptions) -> Self {
        Self { options }
    }
}

impl SqlContext {
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn profile(&self) -> &str {
        self.options.profile()
    }

    /// The profile's database pool.
    pub fn pool(&self) -> DbResult<&DbPool> {
        self.options.pool().ok_or_else(|| {
            DbError::invalid_input(format!(
                "Profile '{}' has no connection string configured",
                self.options.profile()
            ))
        })
    }

    pub async fn ping(&self) -> DbResult<()> {
        self.pool()?.ping().await
    }

    pub async fn server_version(&self) -> DbResult<String> {
        self.pool()?.server_version().await
    }
}
