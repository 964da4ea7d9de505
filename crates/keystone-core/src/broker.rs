//! The broker handle components hold on to.
//!
//! Components keep a `Weak<dyn Broker>` back-reference (set through
//! [`Initable::attach_owner`](crate::Initable::attach_owner)) so that their own
//! initialization code can early-init or resolve the components they depend on
//! without owning the broker.

use std::any::{Any, type_name};
use std::sync::Arc;

use crate::config::Configuration;
use crate::diagnostics::Diagnostics;
use crate::error::{BrokerError, BrokerResult};
use crate::lifecycle::InitData;

/// Object-safe view of a broker, as seen from inside a component.
///
/// Keys are implementation keys for an [`InitableBroker`] and service names
/// for a [`ServiceBroker`].
///
/// [`InitableBroker`]: crate::InitableBroker
/// [`ServiceBroker`]: crate::ServiceBroker
pub trait Broker: Send + Sync {
    /// Early-initializes `key` with `data`, detecting circular chains.
    fn early_init(&self, key: &str, data: &InitData) -> BrokerResult<()>;

    /// Returns a ready instance of `key`, late-initializing it on first use.
    fn resolve_any(&self, key: &str) -> BrokerResult<Arc<dyn Any + Send + Sync>>;

    /// Shuts `key` down if it is initialized.
    fn shutdown(&self, key: &str);

    /// Configuration for `key`; empty when nothing is configured.
    fn configuration(&self, _key: &str) -> Configuration {
        Configuration::default()
    }

    /// Diagnostic channel of this broker.
    fn diagnostics(&self) -> &Diagnostics;
}

impl dyn Broker {
    /// Resolves `key` and downcasts the ready instance to `T`.
    pub fn resolve_as<T: Any + Send + Sync>(&self, key: &str) -> BrokerResult<Arc<T>> {
        self.resolve_any(key)?
            .downcast::<T>()
            .map_err(|_| BrokerError::type_mismatch(key, type_name::<T>()))
    }
}
