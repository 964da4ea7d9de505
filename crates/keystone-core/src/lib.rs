//! # Keystone Core
//!
//! Component lifecycle broker of the Keystone service framework.
//!
//! This crate lazily constructs, initializes (in two phases) and tears down
//! named pluggable components, detecting circular initialization chains and
//! serializing concurrent first access.
//!
//! ## Building blocks
//!
//! - **Lifecycle capability**: [`Initable`] with its embedded [`Lifecycle`]
//!   cell, and startup data passed as [`InitData`]
//! - **Initable broker**: [`InitableBroker`] owns one instance per
//!   implementation key, constructed through a [`FactoryRegistry`]
//! - **Service capability**: [`Service`], an [`Initable`] with a name and a
//!   configuration section ([`ServiceCore`], [`Configuration`])
//! - **Service broker**: [`ServiceBroker`] maps logical service names to
//!   implementation keys and drives bulk startup and shutdown
//! - **Diagnostics**: [`Diagnostics`] buffers broker notices until a
//!   [`DiagnosticSink`] is available
//!
//! ## Lifecycle
//!
//! ```text
//! Unregistered ─register─▶ Registered ─construct─▶ Constructed
//!                                                     │
//!                              early_init / late_init │
//!                                                     ▼
//!                          Uninitialized ◀─shutdown─ Initialized
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keystone_core::{FactoryRegistry, InitData, ServiceBroker, TracingSink};
//!
//! let factories = Arc::new(FactoryRegistry::new());
//! factories.register("acme.mailer", || Ok(Arc::new(Mailer::default())));
//!
//! let broker = ServiceBroker::new(factories);
//! // Without the service runtime nothing switches diagnostics to live mode.
//! broker.diagnostics().enable(Arc::new(TracingSink));
//! broker.register("Mailer", "acme.mailer");
//! broker.early_init_all(&InitData::new(), false)?;
//!
//! let mailer = broker.get_service_as::<Mailer>("Mailer")?;
//! ```

pub mod broker;
pub mod config;
mod dependency;
pub mod diagnostics;
pub mod error;
pub mod factory;
pub mod initable_broker;
pub mod lifecycle;
pub mod registry;
pub mod service;
pub mod service_broker;

pub use broker::Broker;
pub use config::{
    Configuration, ConfigurationProvider, IMPLEMENTATION_KEY, SERVICE_PREFIX, StaticConfiguration,
};
pub use diagnostics::{
    CollectingSink, ConsoleSink, DEFAULT_BUFFER_LIMIT, Diagnostic, DiagnosticSink, Diagnostics,
    TracingSink,
};
pub use error::{
    BoxError, BrokerError, BrokerResult, FactoryError, InitError, ResolutionKind, error_chain,
};
pub use factory::{Component, Factory, FactoryRegistry};
pub use initable_broker::InitableBroker;
pub use lifecycle::{InitData, Initable, Lifecycle};
pub use registry::{COMPONENT_REGISTRY, ComponentEntry, static_entry, static_keys};
pub use service::{Service, ServiceCore};
pub use service_broker::{EARLY_INIT_SETTING, ServiceBroker};

// Used by the registration macros.
#[doc(hidden)]
pub use linkme;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Broker, BrokerError, BrokerResult, Configuration, FactoryError, FactoryRegistry, InitData,
        InitError, Initable, InitableBroker, Lifecycle, Service, ServiceBroker, ServiceCore,
    };
}
