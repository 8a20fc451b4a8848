//! Context contracts and per-profile context kinds.
//!
//! A [`Contract`] describes how to build the base context type from options.
//! [`synthesize`] derives one distinct [`ContextKind`] per connection profile; the
//! kind's identifier is what the service collection keys pools by, so two profiles
//! never share a pool even when their names normalize to the same slug.

use crate::db::context::{ContextOptions, DataContext};
use crate::error::{DbError, DbResult};
use crate::mux::slug::normalize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub type Constructor<T> = Arc<dyn Fn(ContextOptions) -> T + Send + Sync>;
pub type ResetHook<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Runtime description of a base context type.
pub struct Contract<T> {
    name: &'static str,
    constructor: Option<Constructor<T>>,
    reset: Option<ResetHook<T>>,
}

impl<T: DataContext> Contract<T> {
    /// Contract for a type implementing [`DataContext`].
    pub fn of() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            constructor: Some(Arc::new(T::from_options) as Constructor<T>),
            reset: Some(Arc::new(T::reset) as ResetHook<T>),
        }
    }
}

impl<T: Send + 'static> Contract<T> {
    /// Contract without a constructor; supply one with [`Contract::constructor`].
    pub fn new() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            constructor: None,
            reset: None,
        }
    }

    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(ContextOptions) -> T + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor) as Constructor<T>);
        self
    }

    pub fn on_return<F>(mut self, reset: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.reset = Some(Arc::new(reset) as ResetHook<T>);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }
}

impl<T: Send + 'static> Default for Contract<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Contract<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            constructor: self.constructor.clone(),
            reset: self.reset.clone(),
        }
    }
}

impl<T> fmt::Debug for Contract<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("name", &self.name)
            .field("has_constructor", &self.constructor.is_some())
            .field("has_reset", &self.reset.is_some())
            .finish()
    }
}

/// A distinct context kind derived from a contract for one profile.
pub struct ContextKind<T> {
    contract: &'static str,
    namespace: Uuid,
    identifier: String,
    constructor: Constructor<T>,
    reset: Option<ResetHook<T>>,
}

impl<T> ContextKind<T> {
    /// Fully qualified identifier, `<namespace>::DbContext_<slug>`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn namespace(&self) -> Uuid {
        self.namespace
    }

    /// Name of the contract this kind was derived from.
    pub fn contract(&self) -> &'static str {
        self.contract
    }

    /// Build an instance; options are forwarded to the contract's constructor unchanged.
    pub fn construct(&self, options: ContextOptions) -> T {
        (self.constructor)(options)
    }

    pub(crate) fn reset(&self, instance: &mut T) {
        if let Some(reset) = &self.reset {
            reset(instance);
        }
    }
}

impl<T> Clone for ContextKind<T> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract,
            namespace: self.namespace,
            identifier: self.identifier.clone(),
            constructor: Arc::clone(&self.constructor),
            reset: self.reset.clone(),
        }
    }
}

impl<T> PartialEq for ContextKind<T> {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl<T> Eq for ContextKind<T> {}

impl<T> fmt::Debug for ContextKind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextKind")
            .field("contract", &self.contract)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for ContextKind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// Derive a new context kind for `profile` from `contract`.
///
/// Every call draws a fresh namespace, so the result is distinct from every other
/// kind even for repeated or colliding profile names.
pub fn synthesize<T>(contract: &Contract<T>, profile: &str) -> DbResult<ContextKind<T>> {
    let constructor = contract
        .constructor
        .clone()
        .ok_or_else(|| DbError::missing_constructor(contract.name))?;

    let namespace = Uuid::new_v4();
    let identifier = format!("ctx_{}::DbContext_{}", namespace.simple(), normalize(profile));

    debug!(
        profile = %profile,
        contract = contract.name,
        kind = %identifier,
        "Synthesized context kind"
    );

    Ok(ContextKind {
        contract: contract.name,
        namespace,
        identifier,
        constructor,
        reset: contract.reset.clone(),
    })
}
