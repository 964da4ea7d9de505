//! The configuration service.
//!
//! Loads the [`KeystoneConfig`] during early init and serves it to the broker
//! as its [`ConfigurationProvider`]. The startup data decides where the
//! configuration comes from:
//!
//! - a [`KeystoneConfig`] is used as is (after validation);
//! - otherwise a [`ConfigLoader`] is run;
//! - with neither, the default loader searches the usual locations.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use keystone_core::{
    Configuration, ConfigurationProvider, InitData, InitError, Initable, Lifecycle, Service,
    ServiceCore,
};
use parking_lot::RwLock;
use tracing::info;

use crate::config::{ConfigLoader, ConfigResult, KeystoneConfig, validate_config};

struct Loaded {
    config: Arc<KeystoneConfig>,
    tree: Configuration,
}

#[derive(Default)]
pub struct ConfigurationService {
    core: ServiceCore,
    loaded: RwLock<Option<Loaded>>,
}

impl ConfigurationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded configuration, `None` before initialization.
    pub fn config(&self) -> Option<Arc<KeystoneConfig>> {
        self.loaded
            .read()
            .as_ref()
            .map(|loaded| Arc::clone(&loaded.config))
    }

    fn load(data: Option<&InitData>) -> ConfigResult<KeystoneConfig> {
        if let Some(config) = data.and_then(|data| data.get::<KeystoneConfig>()) {
            validate_config(config)?;
            return Ok(config.clone());
        }
        match data.and_then(|data| data.get::<ConfigLoader>()) {
            Some(loader) => loader.load(),
            None => ConfigLoader::new().load(),
        }
    }

    fn install(&self, data: Option<&InitData>) -> Result<(), InitError> {
        let config = Self::load(data)
            .map_err(|e| InitError::with_source("Failed to load configuration", e))?;
        info!(
            service = %self.name(),
            services = config.services.len(),
            "Configuration loaded"
        );
        let tree = config.to_configuration();
        *self.loaded.write() = Some(Loaded {
            config: Arc::new(config),
            tree,
        });
        self.core.lifecycle().mark_initialized();
        Ok(())
    }
}

impl Initable for ConfigurationService {
    fn lifecycle(&self) -> &Lifecycle {
        self.core.lifecycle()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn early_init(&self, data: &InitData) -> Result<(), InitError> {
        self.install(Some(data))
    }

    fn late_init(&self) -> Result<(), InitError> {
        self.install(None)
    }

    fn shutdown(&self) {
        self.loaded.write().take();
        self.core.lifecycle().mark_uninitialized();
    }
}

impl Service for ConfigurationService {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn configuration_provider(self: Arc<Self>) -> Option<Arc<dyn ConfigurationProvider>> {
        Some(self)
    }
}

impl ConfigurationProvider for ConfigurationService {
    fn configuration(&self, prefix: &str) -> Option<Configuration> {
        let loaded = self.loaded.read();
        let section = loaded.as_ref()?.tree.subset(prefix);
        (!section.is_empty()).then_some(section)
    }

    fn service_declarations(&self) -> Vec<(String, String)> {
        self.loaded
            .read()
            .as_ref()
            .map(|loaded| loaded.config.declarations())
            .unwrap_or_default()
    }

    fn application_root(&self) -> Option<PathBuf> {
        self.config()
            .and_then(|config| config.application_root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceDeclaration;

    fn sample() -> KeystoneConfig {
        KeystoneConfig {
            application_root: Some(PathBuf::from("/srv/app")),
            services: vec![
                ServiceDeclaration::new("Cache", "acme.cache").setting("capacity", 64),
                ServiceDeclaration::new("Mailer", "acme.mailer"),
            ],
        }
    }

    #[test]
    fn test_early_init_with_preloaded_config() {
        let service = ConfigurationService::new();
        service
            .early_init(&InitData::new().with(sample()))
            .unwrap();

        assert!(service.is_initialized());
        let section = ConfigurationProvider::configuration(&service, "services.Cache").unwrap();
        assert_eq!(section.get_i64("capacity"), Some(64));
        assert_eq!(section.get_str("implementation"), Some("acme.cache"));
        assert_eq!(
            service.service_declarations(),
            vec![
                ("Cache".to_string(), "acme.cache".to_string()),
                ("Mailer".to_string(), "acme.mailer".to_string()),
            ]
        );
        assert_eq!(
            ConfigurationProvider::application_root(&service),
            Some(PathBuf::from("/srv/app"))
        );
    }

    #[test]
    fn test_invalid_config_fails_init() {
        let mut config = sample();
        config.services.push(ServiceDeclaration::new("Cache", "acme.other"));

        let service = ConfigurationService::new();
        let err = service
            .early_init(&InitData::new().with(config))
            .unwrap_err();

        assert!(keystone_core::error_chain(&err).contains("Duplicate service declaration: Cache"));
        assert!(!service.is_initialized());
    }

    #[test]
    fn test_loader_from_startup_data() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new().search_path(dir.path()).without_env();

        let service = ConfigurationService::new();
        service.early_init(&InitData::new().with(loader)).unwrap();
        assert!(service.service_declarations().is_empty());

        service.shutdown();
        assert!(!service.is_initialized());
        assert!(service.config().is_none());
        assert!(ConfigurationProvider::configuration(&service, "services.Cache").is_none());
    }
}
