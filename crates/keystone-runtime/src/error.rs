//! Runtime error types.

use keystone_core::BrokerError;
use thiserror::Error;

/// Errors that can occur while bootstrapping or running services.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A broker operation failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A bootstrap service does not provide the capability its slot needs.
    #[error("Service {service} does not provide {capability}")]
    MissingCapability {
        service: String,
        capability: &'static str,
    },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
