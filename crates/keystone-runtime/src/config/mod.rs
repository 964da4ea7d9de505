//! Configuration module for the Keystone runtime.
//!
//! This module provides figment-based loading and validation of the
//! configuration tree the configuration service serves to every other
//! service.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, PROFILE_VAR, load_config, load_config_from_file};
pub use schema::{
    KeystoneConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ServiceDeclaration,
    SpanEventConfig,
};
pub use validation::{validate_config, validate_logging_config};
