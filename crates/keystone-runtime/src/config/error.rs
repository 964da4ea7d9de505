//! Errors raised while loading or validating configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The extension is unknown, or its format feature is disabled.
    #[error("Unsupported or disabled configuration file format: .{0}")]
    UnsupportedFormat(String),

    /// The merged sources do not fit the schema.
    #[error("Failed to extract configuration")]
    Extract(#[source] Box<figment::Error>),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    #[error("Duplicate service declaration: {0}")]
    DuplicateService(String),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
