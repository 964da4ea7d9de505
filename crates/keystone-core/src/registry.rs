//! Link-time component registry.
//!
//! Crates contribute [`ComponentEntry`] values to [`COMPONENT_REGISTRY`] with
//! the `#[register_initable("key")]` / `#[register_service("key")]` attribute
//! macros, so a [`FactoryRegistry`](crate::FactoryRegistry) built with
//! [`with_static_registry`](crate::FactoryRegistry::with_static_registry) can
//! construct them by key without any startup registration code.

use std::sync::Arc;

use linkme::distributed_slice;

use crate::lifecycle::Initable;
use crate::service::Service;

/// One statically registered component constructor.
pub struct ComponentEntry {
    /// Implementation key the component is registered under.
    pub key: &'static str,
    /// Constructor producing the component as a plain [`Initable`].
    pub initable: fn() -> Arc<dyn Initable>,
    /// Constructor producing the component as a [`Service`], when it is one.
    pub service: Option<fn() -> Arc<dyn Service>>,
}

impl std::fmt::Debug for ComponentEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentEntry")
            .field("key", &self.key)
            .field("service", &self.service.is_some())
            .finish()
    }
}

/// Every component contributed at link time.
#[distributed_slice]
pub static COMPONENT_REGISTRY: [ComponentEntry];

/// Finds the statically registered entry for `key`.
///
/// When several crates register the same key, the first entry in link order
/// wins.
pub fn static_entry(key: &str) -> Option<&'static ComponentEntry> {
    COMPONENT_REGISTRY.iter().find(|entry| entry.key == key)
}

/// Keys of all statically registered components.
pub fn static_keys() -> Vec<&'static str> {
    COMPONENT_REGISTRY.iter().map(|entry| entry.key).collect()
}
