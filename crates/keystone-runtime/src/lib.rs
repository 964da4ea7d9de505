//! Keystone Runtime - bootstrap layer of the Keystone service framework.
//!
//! This crate provides:
//! - The bootstrap sequence producing the process-wide broker (`ServiceRuntime`)
//! - figment-based configuration loading (`config`)
//! - The built-in configuration and logging services (`services`)
//! - `tracing` subscriber setup (`logging`)
//!
//! ```ignore
//! use keystone_runtime::ServiceRuntime;
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = ServiceRuntime::builder().build()?;
//!     runtime.start(&InitData::new(), false)?;
//!
//!     // ...
//!
//!     runtime.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod services;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, KeystoneConfig, LoggingConfig, ServiceDeclaration,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, init_from_config};
pub use runtime::{RuntimeBuilder, ServiceRuntime};
pub use services::{
    CONFIGURATION_SERVICE, ConfigurationService, LOGGING_SERVICE, LoggingService,
    register_builtin,
};

// Re-export tracing for use by other crates
pub use tracing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
