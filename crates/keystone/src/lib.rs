//! # Keystone
//!
//! A dependency-aware component lifecycle broker with a configuration-driven
//! service bootstrap.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐     ┌───────────────┐     ┌─────────────────────────┐
//! │ ServiceRuntime │────▶│ ServiceBroker │────▶│ "Mailer" → acme.mailer  │──▶ instance
//! │  (bootstrap)   │     │ (name → key)  │────▶│ "Cache"  → acme.cache   │──▶ instance
//! └────────────────┘     └───────────────┘     └─────────────────────────┘
//! ```
//!
//! - **Runtime**: Loads configuration, starts logging, registers declared services
//! - **Service broker**: Resolves names to implementation keys, drives lifecycles
//! - **Initable broker**: Constructs, caches and initializes components by key
//! - **Components**: Your types, implementing `Initable` or `Service`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keystone::prelude::*;
//!
//! #[register_service("acme.mailer")]
//! fn mailer() -> Mailer {
//!     Mailer::default()
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = ServiceRuntime::builder().build()?;
//!     runtime.start(&InitData::new(), false)?;
//!
//!     let mailer = runtime.get_service_as::<Mailer>("Mailer")?;
//!     // ...
//!
//!     runtime.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: Enable the registration attributes (default)
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use keystone_core as core;
pub use keystone_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use keystone::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use keystone_runtime::{KeystoneConfig, RuntimeError, ServiceDeclaration, ServiceRuntime};

    // Brokers and component traits
    pub use keystone_core::prelude::*;
    pub use keystone_core::{DiagnosticSink, ResolutionKind, StaticConfiguration};

    // Registration attributes
    #[cfg(feature = "macros")]
    pub use keystone_macros::{register_initable, register_service};
}
