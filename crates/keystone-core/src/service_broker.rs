//! The service broker: named services over the Initable broker machinery.
//!
//! A [`ServiceBroker`] keeps an ordered `name → implementation key` mapping.
//! Instances are cached under the service name, so two names mapped to the
//! same implementation key get two independent instances. Bulk startup walks
//! the mapping in declaration order; bulk shutdown walks it backwards, which
//! approximates dependency order for services declared after the services
//! they use.

use std::any::{Any, type_name};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::config::{Configuration, ConfigurationProvider, SERVICE_PREFIX};
use crate::diagnostics::Diagnostics;
use crate::error::{BrokerError, BrokerResult};
use crate::factory::FactoryRegistry;
use crate::initable_broker::InitableBroker;
use crate::lifecycle::InitData;
use crate::service::Service;

/// Per-service setting that opts a service out of [`ServiceBroker::early_init_all`].
pub const EARLY_INIT_SETTING: &str = "early_init";

/// Registry and lifecycle driver for named services.
pub struct ServiceBroker {
    services: InitableBroker<dyn Service>,
    mapping: RwLock<IndexMap<String, String>>,
    configuration: RwLock<Option<Arc<dyn ConfigurationProvider>>>,
    service_objects: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    application_root: RwLock<Option<PathBuf>>,
}

impl ServiceBroker {
    pub fn new(factories: Arc<FactoryRegistry<dyn Service>>) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let owner: Weak<dyn Broker> = me.clone();
            Self {
                services: InitableBroker::with_owner(owner, factories),
                mapping: RwLock::new(IndexMap::new()),
                configuration: RwLock::new(None),
                service_objects: RwLock::new(HashMap::new()),
                application_root: RwLock::new(None),
            }
        })
    }

    pub fn factories(&self) -> &Arc<FactoryRegistry<dyn Service>> {
        self.services.factories()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.services.diagnostics()
    }

    // =========================================================================
    // Mapping
    // =========================================================================

    /// Maps `name` to `implementation`.
    ///
    /// The first declaration of a name wins: re-registering the same value is
    /// a no-op, a conflicting value is ignored with a warning notice. Returns
    /// `true` if `name` maps to `implementation` afterwards.
    pub fn register(&self, name: &str, implementation: &str) -> bool {
        let existing = {
            let mut mapping = self.mapping.write();
            match mapping.get(name) {
                Some(existing) => existing.clone(),
                None => {
                    mapping.insert(name.to_string(), implementation.to_string());
                    debug!(service = %name, implementation, "Service registered");
                    return true;
                }
            }
        };
        if existing == implementation {
            return true;
        }
        warn!(
            service = %name,
            existing = %existing,
            ignored = %implementation,
            "Conflicting service registration ignored"
        );
        self.diagnostics().notice(format!(
            "Service {name} is already mapped to {existing}, ignoring {implementation}"
        ));
        false
    }

    /// Registers every `(name, implementation)` pair in order. Returns how
    /// many pairs ended up mapped as requested.
    pub fn register_all<I, N, K>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (N, K)>,
        N: AsRef<str>,
        K: AsRef<str>,
    {
        entries
            .into_iter()
            .filter(|(name, implementation)| self.register(name.as_ref(), implementation.as_ref()))
            .count()
    }

    /// Removes the mapping entry for `name` together with any cached
    /// instance. The instance is not shut down.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.mapping.write().shift_remove(name).is_some();
        self.services.evict(name);
        removed
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.mapping.read().contains_key(name)
    }

    pub fn is_constructed(&self, name: &str) -> bool {
        self.services.is_constructed(name)
    }

    /// Returns `true` if `name` has a cached, initialized instance.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.services
            .instance(name)
            .is_some_and(|service| service.is_initialized())
    }

    pub fn instance_count(&self) -> usize {
        self.services.instance_count()
    }

    pub fn implementation_of(&self, name: &str) -> Option<String> {
        self.mapping.read().get(name).cloned()
    }

    /// Registered service names in declaration order.
    pub fn service_names(&self) -> Vec<String> {
        self.mapping.read().keys().cloned().collect()
    }

    /// Registered service names starting with `prefix`, in declaration order.
    pub fn service_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.mapping
            .read()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Snapshot of the whole mapping in declaration order.
    pub fn mapping(&self) -> Vec<(String, String)> {
        self.mapping
            .read()
            .iter()
            .map(|(name, implementation)| (name.clone(), implementation.clone()))
            .collect()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Cached instance of `name`, or a fresh one with its name attached.
    fn service_instance(&self, name: &str) -> BrokerResult<Arc<dyn Service>> {
        if let Some(service) = self.services.instance(name) {
            return Ok(service);
        }
        let implementation = self
            .implementation_of(name)
            .ok_or_else(|| BrokerError::unknown_service(name))?;
        self.services
            .instance_or_construct(name, &implementation, |service| service.set_name(name))
    }

    /// Early-initializes the service registered as `name`.
    pub fn early_init_service(&self, name: &str, data: &InitData) -> BrokerResult<()> {
        self.diagnostics()
            .notice(format!("Start initializing service (early): {name}"));
        self.services
            .early_init_with(name, data, || self.service_instance(name))
    }

    /// Early-initializes every registered service in declaration order.
    ///
    /// Services whose configuration sets `early_init = false` are skipped and
    /// late-initialize on first use instead. With `fail_fast` the first
    /// failure is returned and the remaining services are left alone.
    /// Otherwise every failure is reported through the diagnostic channel and
    /// the walk continues.
    pub fn early_init_all(&self, data: &InitData, fail_fast: bool) -> BrokerResult<()> {
        for name in self.service_names() {
            if !self.configuration(&name).get_bool(EARLY_INIT_SETTING, true) {
                debug!(service = %name, "Early init disabled by configuration");
                continue;
            }
            if let Err(err) = self.early_init_service(&name, data) {
                if fail_fast {
                    return Err(err);
                }
                self.diagnostics().error(&err);
            }
        }
        self.diagnostics().notice("Finished initializing all services");
        Ok(())
    }

    /// Returns the ready service registered as `name`, late-initializing it on
    /// first use.
    pub fn get_service(&self, name: &str) -> BrokerResult<Arc<dyn Service>> {
        self.services
            .late_init_with(name, || self.service_instance(name))
    }

    /// Like [`get_service`](Self::get_service), downcast to the concrete type.
    pub fn get_service_as<T: Any + Send + Sync>(&self, name: &str) -> BrokerResult<Arc<T>> {
        self.get_service(name)?
            .as_any()
            .downcast::<T>()
            .map_err(|_| BrokerError::type_mismatch(name, type_name::<T>()))
    }

    /// Shuts down `name` if it is constructed and initialized. Returns `true`
    /// if a shutdown actually ran.
    pub fn shutdown_service(&self, name: &str) -> bool {
        if !self.is_registered(name) && !self.is_constructed(name) {
            self.diagnostics().error_message(format!(
                "Shutdown of a nonexistent service '{name}' was requested"
            ));
            return false;
        }
        self.services.shutdown_instance(name)
    }

    /// Shuts down every registered service in reverse declaration order.
    pub fn shutdown_all(&self) {
        self.diagnostics().notice("Shutting down all services");
        for name in self.service_names().iter().rev() {
            if self.is_initialized(name) {
                self.diagnostics()
                    .notice(format!("Shutting down service: {name}"));
            }
            self.shutdown_service(name);
        }
    }

    // =========================================================================
    // Configuration and host data
    // =========================================================================

    pub fn set_configuration_provider(&self, provider: Arc<dyn ConfigurationProvider>) {
        *self.configuration.write() = Some(provider);
    }

    pub fn configuration_provider(&self) -> Option<Arc<dyn ConfigurationProvider>> {
        self.configuration.read().clone()
    }

    /// Configuration section of service `name`; empty when nothing is
    /// configured or no provider is installed.
    pub fn configuration(&self, name: &str) -> Configuration {
        // Cloned out so the provider runs without the broker's lock held.
        let provider = self.configuration_provider();
        provider
            .and_then(|provider| provider.configuration(&format!("{SERVICE_PREFIX}{name}")))
            .unwrap_or_default()
    }

    /// Configuration of service `name` flattened to dotted string properties.
    pub fn properties(&self, name: &str) -> BTreeMap<String, String> {
        self.configuration(name).properties()
    }

    /// Stores a host-application object for services to look up by name.
    pub fn set_service_object<T: Any + Send + Sync>(&self, name: &str, value: T) {
        self.service_objects
            .write()
            .insert(name.to_string(), Arc::new(value));
    }

    pub fn service_object<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let object = self.service_objects.read().get(name).cloned()?;
        object.downcast::<T>().ok()
    }

    pub fn set_application_root(&self, root: impl Into<PathBuf>) {
        *self.application_root.write() = Some(root.into());
    }

    pub fn application_root(&self) -> Option<PathBuf> {
        self.application_root.read().clone()
    }
}

impl Broker for ServiceBroker {
    fn early_init(&self, key: &str, data: &InitData) -> BrokerResult<()> {
        self.early_init_service(key, data)
    }

    fn resolve_any(&self, key: &str) -> BrokerResult<Arc<dyn Any + Send + Sync>> {
        self.get_service(key).map(|service| service.as_any())
    }

    fn shutdown(&self, key: &str) {
        self.shutdown_service(key);
    }

    fn configuration(&self, key: &str) -> Configuration {
        ServiceBroker::configuration(self, key)
    }

    fn diagnostics(&self) -> &Diagnostics {
        self.services.diagnostics()
    }
}

impl std::fmt::Debug for ServiceBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBroker")
            .field("mapping", &self.mapping())
            .field("constructed", &self.services.keys())
            .finish()
    }
}
