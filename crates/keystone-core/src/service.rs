//! The service capability: an [`Initable`] with a name and configuration.

use std::sync::{Arc, OnceLock};

use crate::config::{Configuration, ConfigurationProvider};
use crate::diagnostics::DiagnosticSink;
use crate::lifecycle::{Initable, Lifecycle};

/// Identity block embedded in every service: lifecycle cell plus the name the
/// broker assigned.
#[derive(Debug, Default)]
pub struct ServiceCore {
    lifecycle: Lifecycle,
    name: OnceLock<String>,
}

impl ServiceCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Assigns the service name. The first assignment wins.
    pub fn set_name(&self, name: &str) {
        let _ = self.name.set(name.to_string());
    }

    /// The assigned name, or `""` before the broker attached identity.
    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or_default()
    }
}

/// A named, configurable component managed by a [`ServiceBroker`].
///
/// Implementors embed a [`ServiceCore`] and return it from [`core`]; their
/// [`Initable::lifecycle`] should return `self.core.lifecycle()`.
///
/// Name and broker reference are attached before any initialization, so a
/// service can read its own configuration from `early_init`.
///
/// [`ServiceBroker`]: crate::ServiceBroker
/// [`core`]: Service::core
pub trait Service: Initable {
    fn core(&self) -> &ServiceCore;

    fn set_name(&self, name: &str) {
        self.core().set_name(name);
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    /// This service's configuration section, empty when none is available.
    fn configuration(&self) -> Configuration {
        self.lifecycle()
            .owner()
            .map(|broker| broker.configuration(self.name()))
            .unwrap_or_default()
    }

    /// Exposes the service as the broker's configuration collaborator.
    ///
    /// Only the service bootstrapped as the configuration service overrides
    /// this.
    fn configuration_provider(self: Arc<Self>) -> Option<Arc<dyn ConfigurationProvider>> {
        None
    }

    /// Exposes the service as the broker's diagnostic sink.
    ///
    /// Only the service bootstrapped as the logging service overrides this.
    fn diagnostic_sink(self: Arc<Self>) -> Option<Arc<dyn DiagnosticSink>> {
        None
    }
}

impl std::fmt::Debug for dyn Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
