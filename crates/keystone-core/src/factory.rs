//! Implementation-key → constructor lookup.
//!
//! A [`FactoryRegistry`] replaces "load a class by name": each implementation
//! key maps to a zero-argument constructor closure. Constructors are either
//! registered programmatically at startup or, when the registry was built with
//! [`FactoryRegistry::with_static_registry`], found in the link-time
//! [`COMPONENT_REGISTRY`](crate::COMPONENT_REGISTRY).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::FactoryError;
use crate::lifecycle::Initable;
use crate::registry::{ComponentEntry, static_entry};
use crate::service::Service;

/// Boxed constructor producing a component of capability `C`.
pub type Factory<C> = Arc<dyn Fn() -> Result<Arc<C>, FactoryError> + Send + Sync>;

// =============================================================================
// Component capabilities
// =============================================================================

/// A capability a broker can manage (`dyn Initable` or `dyn Service`).
pub trait Component: Initable {
    /// Capability name used in error messages.
    const CAPABILITY: &'static str;

    /// Builds the component from a link-time entry.
    ///
    /// Fails with [`FactoryError::TypeMismatch`] when the entry does not
    /// provide this capability.
    fn from_entry(entry: &ComponentEntry) -> Result<Arc<Self>, FactoryError>;
}

impl Component for dyn Initable {
    const CAPABILITY: &'static str = "Initable";

    fn from_entry(entry: &ComponentEntry) -> Result<Arc<Self>, FactoryError> {
        Ok((entry.initable)())
    }
}

impl Component for dyn Service {
    const CAPABILITY: &'static str = "Service";

    fn from_entry(entry: &ComponentEntry) -> Result<Arc<Self>, FactoryError> {
        entry
            .service
            .map(|create| create())
            .ok_or(FactoryError::TypeMismatch(Self::CAPABILITY))
    }
}

// =============================================================================
// FactoryRegistry
// =============================================================================

/// Constructors keyed by implementation key.
///
/// # Example
///
/// ```rust,ignore
/// let factories = FactoryRegistry::<dyn Service>::new();
/// factories.register("acme.mailer", || Ok(Arc::new(Mailer::default())));
/// ```
pub struct FactoryRegistry<C: ?Sized + Component> {
    factories: RwLock<HashMap<String, Factory<C>>>,
    use_static: bool,
}

impl<C: ?Sized + Component> FactoryRegistry<C> {
    /// Creates a registry with programmatic registrations only.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            use_static: false,
        }
    }

    /// Creates a registry that falls back to the link-time registry for keys
    /// without a programmatic registration.
    pub fn with_static_registry() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            use_static: true,
        }
    }

    /// Registers (or replaces) the constructor for `key`.
    pub fn register<F>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<C>, FactoryError> + Send + Sync + 'static,
    {
        self.factories.write().insert(key.into(), Arc::new(factory));
    }

    /// Removes the programmatic constructor for `key`.
    pub fn unregister(&self, key: &str) -> bool {
        self.factories.write().remove(key).is_some()
    }

    /// Returns `true` if `key` can be constructed.
    pub fn contains(&self, key: &str) -> bool {
        self.factories.read().contains_key(key) || (self.use_static && static_entry(key).is_some())
    }

    /// Programmatically registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Runs the constructor for `key`.
    ///
    /// Returns `None` when no constructor is known. Panics raised by the
    /// constructor are not caught.
    pub fn create(&self, key: &str) -> Option<Result<Arc<C>, FactoryError>> {
        let factory = self.factories.read().get(key).cloned();
        match factory {
            Some(factory) => Some(factory()),
            None if self.use_static => static_entry(key).map(C::from_entry),
            None => None,
        }
    }
}

impl<C: ?Sized + Component> Default for FactoryRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized + Component> std::fmt::Debug for FactoryRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("capability", &C::CAPABILITY)
            .field("keys", &self.keys())
            .field("use_static", &self.use_static)
            .finish()
    }
}
