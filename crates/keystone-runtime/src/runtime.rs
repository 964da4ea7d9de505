//! Bootstrap of the process-wide service broker.
//!
//! The full service mapping lives in configuration, but reading configuration
//! (and reporting problems while doing so) needs services of its own. The
//! builder resolves this in four steps:
//!
//! 1. register and early-init the configuration service with the startup
//!    data, then install it as the broker's configuration provider;
//! 2. register and early-init the logging service, which reads its own
//!    section from that configuration;
//! 3. switch broker diagnostics from buffering to live, through the logging
//!    service or, if anything above failed, the fallback console sink;
//! 4. register every remaining service declared in configuration, in
//!    declaration order.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use keystone_runtime::ServiceRuntime;
//!
//! let runtime = ServiceRuntime::builder()
//!     .config_file("config/keystone.toml")
//!     .profile("production")
//!     .build()?;
//!
//! runtime.start(&InitData::new(), false)?;
//! let mailer = runtime.get_service_as::<Mailer>("Mailer")?;
//! // ...
//! runtime.shutdown();
//! ```

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use keystone_core::{
    ConfigurationProvider, ConsoleSink, DiagnosticSink, FactoryError, FactoryRegistry, InitData,
    Service, ServiceBroker, TracingSink,
};
use tracing::info;

use crate::config::{ConfigLoader, KeystoneConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::services::{
    CONFIGURATION_SERVICE, CONFIGURATION_SERVICE_KEY, ConfigurationService, LOGGING_SERVICE,
    LOGGING_SERVICE_KEY, register_builtin,
};

/// A bootstrapped service broker.
///
/// Cheap to clone; every clone drives the same broker.
#[derive(Debug, Clone)]
pub struct ServiceRuntime {
    broker: Arc<ServiceBroker>,
}

impl ServiceRuntime {
    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn broker(&self) -> &Arc<ServiceBroker> {
        &self.broker
    }

    /// The configuration loaded during bootstrap, if the configuration
    /// service is the built-in one.
    pub fn config(&self) -> Option<Arc<KeystoneConfig>> {
        self.broker
            .get_service_as::<ConfigurationService>(CONFIGURATION_SERVICE)
            .ok()?
            .config()
    }

    /// Early-initializes every registered service in declaration order.
    ///
    /// With `fail_fast` the first failure is returned; otherwise failures
    /// are reported through the broker's diagnostics and startup continues.
    pub fn start(&self, data: &InitData, fail_fast: bool) -> RuntimeResult<()> {
        self.broker.early_init_all(data, fail_fast)?;
        info!(
            services = self.broker.service_names().len(),
            "Service runtime started"
        );
        Ok(())
    }

    pub fn get_service(&self, name: &str) -> RuntimeResult<Arc<dyn Service>> {
        Ok(self.broker.get_service(name)?)
    }

    pub fn get_service_as<T: Any + Send + Sync>(&self, name: &str) -> RuntimeResult<Arc<T>> {
        Ok(self.broker.get_service_as::<T>(name)?)
    }

    /// Shuts every service down in reverse declaration order.
    pub fn shutdown(&self) {
        self.broker.shutdown_all();
        info!("Service runtime stopped");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder running the bootstrap sequence.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<KeystoneConfig>,
    factories: Arc<FactoryRegistry<dyn Service>>,
    configuration_key: String,
    logging_key: String,
    fallback_sink: Arc<dyn DiagnosticSink>,
    startup_data: InitData,
}

impl RuntimeBuilder {
    /// Creates a builder that loads configuration from the default locations
    /// and constructs statically registered services by key.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            factories: Arc::new(FactoryRegistry::with_static_registry()),
            configuration_key: CONFIGURATION_SERVICE_KEY.to_string(),
            logging_key: LOGGING_SERVICE_KEY.to_string(),
            fallback_sink: Arc::new(ConsoleSink),
            startup_data: InitData::new(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration above the loaded sources.
    pub fn merge(mut self, config: KeystoneConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` as is instead of loading configuration.
    pub fn config(mut self, config: KeystoneConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `factories` instead of the default static-registry lookup.
    pub fn factories(mut self, factories: Arc<FactoryRegistry<dyn Service>>) -> Self {
        self.factories = factories;
        self
    }

    /// Registers a service factory under `key`.
    pub fn factory<F>(self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Service>, FactoryError> + Send + Sync + 'static,
    {
        self.factories.register(key, factory);
        self
    }

    /// Implementation key of the configuration service.
    pub fn configuration_key(mut self, key: impl Into<String>) -> Self {
        self.configuration_key = key.into();
        self
    }

    /// Default implementation key of the logging service. A `LoggingService`
    /// declaration in configuration takes precedence.
    pub fn logging_key(mut self, key: impl Into<String>) -> Self {
        self.logging_key = key.into();
        self
    }

    /// Sink receiving diagnostics when the logging service cannot start.
    pub fn fallback_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.fallback_sink = sink;
        self
    }

    /// Adds startup data for the configuration and logging services.
    pub fn startup_data<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.startup_data.insert(value);
        self
    }

    /// Runs the bootstrap sequence.
    pub fn build(self) -> RuntimeResult<ServiceRuntime> {
        let Self {
            config_loader,
            config,
            factories,
            configuration_key,
            logging_key,
            fallback_sink,
            mut startup_data,
        } = self;

        register_builtin(&factories);
        let broker = ServiceBroker::new(factories);
        match config {
            Some(config) => startup_data.insert(config),
            None => startup_data.insert(config_loader),
        }

        broker.register(CONFIGURATION_SERVICE, &configuration_key);
        let provider = match start_configuration(&broker, &startup_data) {
            Ok(provider) => provider,
            Err(err) => return Err(abort(&broker, fallback_sink, err)),
        };
        broker.set_configuration_provider(Arc::clone(&provider));
        if let Some(root) = provider.application_root() {
            broker.set_application_root(root);
        }

        let logging_key = provider
            .service_declarations()
            .into_iter()
            .find(|(name, _)| name == LOGGING_SERVICE)
            .map(|(_, key)| key)
            .unwrap_or(logging_key);
        broker.register(LOGGING_SERVICE, &logging_key);
        let sink = match start_logging(&broker, &startup_data) {
            Ok(sink) => sink,
            Err(err) => {
                broker.unregister(LOGGING_SERVICE);
                return Err(abort(&broker, fallback_sink, err));
            }
        };

        broker.diagnostics().enable(sink);

        broker.register_all(provider.service_declarations());
        info!(
            services = broker.service_names().len(),
            "Service broker bootstrapped"
        );

        Ok(ServiceRuntime { broker })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn start_configuration(
    broker: &ServiceBroker,
    data: &InitData,
) -> RuntimeResult<Arc<dyn ConfigurationProvider>> {
    broker.early_init_service(CONFIGURATION_SERVICE, data)?;
    broker
        .get_service(CONFIGURATION_SERVICE)?
        .configuration_provider()
        .ok_or_else(|| RuntimeError::MissingCapability {
            service: CONFIGURATION_SERVICE.to_string(),
            capability: "ConfigurationProvider",
        })
}

fn start_logging(broker: &ServiceBroker, data: &InitData) -> RuntimeResult<Arc<dyn DiagnosticSink>> {
    broker.early_init_service(LOGGING_SERVICE, data)?;
    let service = broker.get_service(LOGGING_SERVICE)?;
    Ok(service
        .diagnostic_sink()
        .unwrap_or_else(|| Arc::new(TracingSink)))
}

/// Reports `err`, then flushes buffered diagnostics to `fallback`.
fn abort(broker: &ServiceBroker, fallback: Arc<dyn DiagnosticSink>, err: RuntimeError) -> RuntimeError {
    broker.diagnostics().error(&err);
    broker.diagnostics().enable(fallback);
    err
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use keystone_core::{
        CollectingSink, Diagnostic, InitError, Initable, Lifecycle, ResolutionKind, ServiceCore,
    };
    use parking_lot::RwLock;

    use super::*;
    use crate::config::ServiceDeclaration;

    #[derive(Default)]
    struct Greeter {
        core: ServiceCore,
        greeting: RwLock<String>,
    }

    impl Initable for Greeter {
        fn lifecycle(&self) -> &Lifecycle {
            self.core.lifecycle()
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }

        fn early_init(&self, _data: &InitData) -> Result<(), InitError> {
            let greeting = self
                .configuration()
                .get_str("greeting")
                .unwrap_or("hello")
                .to_string();
            *self.greeting.write() = greeting;
            self.core.lifecycle().mark_initialized();
            Ok(())
        }
    }

    impl Service for Greeter {
        fn core(&self) -> &ServiceCore {
            &self.core
        }
    }

    fn greeter() -> Result<Arc<dyn Service>, FactoryError> {
        Ok(Arc::new(Greeter::default()))
    }

    #[test]
    fn test_bootstrap_order_and_lifecycle() {
        let fallback = Arc::new(CollectingSink::new());
        let runtime = ServiceRuntime::builder()
            .config(KeystoneConfig {
                application_root: Some(PathBuf::from("/srv/app")),
                services: vec![
                    ServiceDeclaration::new("Greeter", "test.greeter").setting("greeting", "hi"),
                    ServiceDeclaration::new("Clock", "test.greeter"),
                ],
            })
            .factory("test.greeter", greeter)
            .fallback_sink(fallback.clone())
            .build()
            .unwrap();
        let broker = runtime.broker();

        assert_eq!(
            broker.service_names(),
            [CONFIGURATION_SERVICE, LOGGING_SERVICE, "Greeter", "Clock"]
        );
        assert!(broker.diagnostics().is_live());
        assert!(fallback.entries().is_empty());
        assert_eq!(broker.application_root(), Some(PathBuf::from("/srv/app")));
        assert_eq!(runtime.config().unwrap().services.len(), 2);

        runtime.start(&InitData::new(), true).unwrap();
        let greeter = runtime.get_service_as::<Greeter>("Greeter").unwrap();
        let clock = runtime.get_service_as::<Greeter>("Clock").unwrap();
        assert_eq!(*greeter.greeting.read(), "hi");
        assert_eq!(*clock.greeting.read(), "hello");

        runtime.shutdown();
        for name in broker.service_names() {
            assert!(!broker.is_initialized(&name), "{name} still initialized");
        }
    }

    #[test]
    fn test_configuration_failure_flushes_to_fallback() {
        let fallback = Arc::new(CollectingSink::new());
        let err = ServiceRuntime::builder()
            .config_file("/nonexistent/keystone.toml")
            .without_env()
            .fallback_sink(fallback.clone())
            .build()
            .unwrap_err();

        assert!(matches!(&err, RuntimeError::Broker(e) if e.key() == CONFIGURATION_SERVICE));
        assert!(matches!(
            fallback.entries().first(),
            Some(Diagnostic::Notice(message)) if message.contains(CONFIGURATION_SERVICE)
        ));
        assert!(
            fallback
                .errors()
                .iter()
                .any(|message| message.contains("Configuration file not found"))
        );
    }

    #[test]
    fn test_logging_failure_flushes_to_fallback() {
        let fallback = Arc::new(CollectingSink::new());
        let err = ServiceRuntime::builder()
            .config(KeystoneConfig::default())
            .logging_key("test.missing-logging")
            .fallback_sink(fallback.clone())
            .build()
            .unwrap_err();

        match err {
            RuntimeError::Broker(e) => {
                assert_eq!(e.key(), LOGGING_SERVICE);
                assert_eq!(e.resolution_kind(), Some(ResolutionKind::Unavailable));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(
            fallback
                .errors()
                .iter()
                .any(|message| message.contains("test.missing-logging is unavailable"))
        );
    }

    #[test]
    fn test_logging_key_from_configuration() {
        let runtime = ServiceRuntime::builder()
            .config(KeystoneConfig {
                services: vec![ServiceDeclaration::new(LOGGING_SERVICE, "test.quiet-logging")],
                ..Default::default()
            })
            .factory("test.quiet-logging", greeter)
            .build()
            .unwrap();
        let broker = runtime.broker();

        assert_eq!(
            broker.implementation_of(LOGGING_SERVICE).as_deref(),
            Some("test.quiet-logging")
        );
        assert!(broker.is_initialized(LOGGING_SERVICE));
        assert!(broker.diagnostics().is_live());
        assert_eq!(broker.service_names(), [CONFIGURATION_SERVICE, LOGGING_SERVICE]);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_bootstrap_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("keystone.toml"),
            r#"
[[services]]
name = "LoggingService"
level = "debug"

[[services]]
name = "Greeter"
implementation = "test.greeter"
greeting = "from file"
"#,
        )
        .unwrap();

        let runtime = ServiceRuntime::builder()
            .search_path(dir.path())
            .without_env()
            .factory("test.greeter", greeter)
            .build()
            .unwrap();

        assert_eq!(
            runtime.broker().service_names(),
            [CONFIGURATION_SERVICE, LOGGING_SERVICE, "Greeter"]
        );
        let greeter = runtime.get_service_as::<Greeter>("Greeter").unwrap();
        assert!(greeter.is_initialized());
        assert_eq!(
            runtime.broker().configuration("Greeter").get_str("greeting"),
            Some("from file")
        );
    }
}
