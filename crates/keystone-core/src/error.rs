//! Error types for the Keystone broker.
//!
//! Two kinds of failure reach callers:
//!
//! - [`InitError`] is what a component reports from its own `early_init` /
//!   `late_init`.
//! - [`BrokerError`] is what the broker reports: a circular early-init chain,
//!   a key that could not be resolved to a live instance, or an instance that
//!   failed to initialize.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error used as the cause of broker and component failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// =============================================================================
// Resolution classification
// =============================================================================

/// Why a key could not be resolved to a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    /// No factory is registered for the implementation key.
    Unavailable,
    /// The factory reported that something it needs is unavailable.
    MissingDependency,
    /// The component does not provide the requested capability or type.
    TypeMismatch,
    /// The factory ran and failed.
    ConstructionFailed,
    /// The service name has no mapping entry.
    UnknownService,
}

impl ResolutionKind {
    /// Returns a short, stable label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::MissingDependency => "missing-dependency",
            Self::TypeMismatch => "type-mismatch",
            Self::ConstructionFailed => "construction-failed",
            Self::UnknownService => "unknown-service",
        }
    }

    /// Renders the human-readable classification message.
    ///
    /// `implementation` is the implementation key the broker tried to build and
    /// `capability` the trait (or concrete type) that was requested.
    pub fn describe(&self, implementation: &str, capability: &str) -> String {
        match self {
            Self::Unavailable => format!(
                "Component {implementation} is unavailable. Check your registered factories."
            ),
            Self::MissingDependency => format!(
                "A component referenced by {implementation} is unavailable. \
                 Check your registered factories."
            ),
            Self::TypeMismatch => {
                format!("Component {implementation} doesn't implement {capability}.")
            }
            Self::ConstructionFailed => format!("Failed to instantiate {implementation}"),
            Self::UnknownService => format!("ServiceBroker: unknown service {implementation} requested"),
        }
    }
}

impl std::fmt::Display for ResolutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Component-side errors
// =============================================================================

/// Failure reported by a component's own initialization code.
#[derive(Debug, Error)]
pub enum InitError {
    /// The component could not bring itself into a working state.
    #[error("{message}")]
    Failed {
        /// What went wrong, in the component's words.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// A nested broker call made during initialization failed.
    ///
    /// The broker propagates the inner failure unchanged so the caller sees
    /// the key that actually failed (and, for cycles, the full chain).
    #[error(transparent)]
    Broker(Box<BrokerError>),
}

impl InitError {
    /// Creates a failure with a message and no cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a failure wrapping `source`.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<BrokerError> for InitError {
    fn from(err: BrokerError) -> Self {
        Self::Broker(Box::new(err))
    }
}

/// Failure reported by a component factory.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Something the component needs at construction time is unavailable.
    #[error("required component '{0}' is unavailable")]
    MissingDependency(String),

    /// The registered constructor does not produce the requested capability.
    #[error("component does not implement {0}")]
    TypeMismatch(&'static str),

    /// The constructor itself failed.
    #[error("constructor failed")]
    Failed(#[source] BoxError),
}

impl FactoryError {
    /// Wraps an arbitrary constructor failure.
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }

    fn kind(&self) -> ResolutionKind {
        match self {
            Self::MissingDependency(_) => ResolutionKind::MissingDependency,
            Self::TypeMismatch(_) => ResolutionKind::TypeMismatch,
            Self::Failed(_) => ResolutionKind::ConstructionFailed,
        }
    }
}

// =============================================================================
// Broker errors
// =============================================================================

/// Errors reported by [`InitableBroker`](crate::InitableBroker) and
/// [`ServiceBroker`](crate::ServiceBroker).
#[derive(Debug, Error)]
pub enum BrokerError {
    /// An early-init call chain came back to a key that is still initializing.
    #[error(
        "{key} couldn't be initialized because of circular dependency chain: {}",
        .chain.join("->")
    )]
    CircularDependency {
        /// The key whose early-init closed the cycle.
        key: String,
        /// Keys from the first occurrence of `key` up to and including the repeat.
        chain: Vec<String>,
    },

    /// The key could not be turned into a component instance.
    #[error("cannot resolve '{key}': {message}")]
    Resolution {
        /// The requested key or service name.
        key: String,
        /// Classification of the failure.
        kind: ResolutionKind,
        /// Rendered classification message.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The instance exists but could not be initialized.
    #[error("{key} failed to initialize")]
    Initialization {
        /// The key whose initialization failed.
        key: String,
        /// What the component (or the broker's post-init check) reported.
        #[source]
        source: InitError,
    },
}

impl BrokerError {
    /// Builds a circular-dependency error from the cycle's key sequence.
    pub fn circular(key: impl Into<String>, chain: Vec<String>) -> Self {
        Self::CircularDependency {
            key: key.into(),
            chain,
        }
    }

    /// Builds a resolution error without a cause.
    pub fn resolution(
        key: impl Into<String>,
        kind: ResolutionKind,
        implementation: &str,
        capability: &str,
    ) -> Self {
        Self::Resolution {
            key: key.into(),
            kind,
            message: kind.describe(implementation, capability),
            source: None,
        }
    }

    /// Normalizes a factory failure into a resolution error.
    pub fn from_factory(
        key: impl Into<String>,
        implementation: &str,
        capability: &str,
        err: FactoryError,
    ) -> Self {
        let kind = err.kind();
        Self::Resolution {
            key: key.into(),
            kind,
            message: kind.describe(implementation, capability),
            source: Some(Box::new(err)),
        }
    }

    /// The service name has no mapping entry.
    pub fn unknown_service(name: &str) -> Self {
        Self::resolution(name, ResolutionKind::UnknownService, name, "Service")
    }

    /// The resolved instance is not of the requested concrete type.
    pub fn type_mismatch(key: &str, type_name: &str) -> Self {
        Self::resolution(key, ResolutionKind::TypeMismatch, key, type_name)
    }

    /// Wraps a component's init failure.
    pub fn initialization(key: impl Into<String>, source: InitError) -> Self {
        Self::Initialization {
            key: key.into(),
            source,
        }
    }

    /// The key this error is about.
    pub fn key(&self) -> &str {
        match self {
            Self::CircularDependency { key, .. }
            | Self::Resolution { key, .. }
            | Self::Initialization { key, .. } => key,
        }
    }

    /// Returns the dependency chain when this is a circular-dependency error.
    pub fn chain(&self) -> Option<&[String]> {
        match self {
            Self::CircularDependency { chain, .. } => Some(chain),
            _ => None,
        }
    }

    /// Returns the classification when this is a resolution error.
    pub fn resolution_kind(&self) -> Option<ResolutionKind> {
        match self {
            Self::Resolution { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Renders an error and its whole `source()` chain on one line.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        current = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_message_renders_chain() {
        let err = BrokerError::circular(
            "A",
            vec!["A".into(), "B".into(), "C".into(), "A".into()],
        );
        assert_eq!(
            err.to_string(),
            "A couldn't be initialized because of circular dependency chain: A->B->C->A"
        );
        assert_eq!(err.chain().map(<[String]>::len), Some(4));
    }

    #[test]
    fn test_factory_error_classification() {
        let err = BrokerError::from_factory(
            "cache",
            "keystone.cache",
            "Service",
            FactoryError::MissingDependency("db".into()),
        );
        assert_eq!(err.resolution_kind(), Some(ResolutionKind::MissingDependency));
        assert_eq!(err.key(), "cache");
        assert!(error_chain(&err).contains("required component 'db' is unavailable"));
    }

    #[test]
    fn test_nested_broker_error_is_transparent() {
        let inner = BrokerError::unknown_service("ghost");
        let expected = inner.to_string();
        let init: InitError = inner.into();
        assert_eq!(init.to_string(), expected);
    }
}
