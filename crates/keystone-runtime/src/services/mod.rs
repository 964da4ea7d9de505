//! Built-in services the runtime bootstraps before anything else.

pub mod configuration;
pub mod logging;

use std::sync::Arc;

use keystone_core::{FactoryRegistry, Service};

pub use configuration::ConfigurationService;
pub use logging::LoggingService;

/// Service name of the configuration service.
pub const CONFIGURATION_SERVICE: &str = "ConfigurationService";
/// Default implementation key of the configuration service.
pub const CONFIGURATION_SERVICE_KEY: &str = "keystone.configuration";

/// Service name of the logging service.
pub const LOGGING_SERVICE: &str = "LoggingService";
/// Default implementation key of the logging service.
pub const LOGGING_SERVICE_KEY: &str = "keystone.logging";

/// Registers the built-in service factories under their default keys,
/// leaving keys the host already registered untouched.
pub fn register_builtin(factories: &FactoryRegistry<dyn Service>) {
    if !factories.contains(CONFIGURATION_SERVICE_KEY) {
        factories.register(CONFIGURATION_SERVICE_KEY, || {
            let service: Arc<dyn Service> = Arc::new(ConfigurationService::new());
            Ok(service)
        });
    }
    if !factories.contains(LOGGING_SERVICE_KEY) {
        factories.register(LOGGING_SERVICE_KEY, || {
            let service: Arc<dyn Service> = Arc::new(LoggingService::new());
            Ok(service)
        });
    }
}
