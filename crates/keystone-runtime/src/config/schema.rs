//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use keystone_core::{Configuration, IMPLEMENTATION_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root configuration structure.
///
/// ```toml
/// application_root = "/srv/app"
///
/// [[services]]
/// name = "LoggingService"
/// level = "debug"
///
/// [[services]]
/// name = "Mailer"
/// implementation = "acme.mailer"
/// host = "smtp.example.org"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeystoneConfig {
    /// Root directory of the hosting application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_root: Option<PathBuf>,

    /// Service declarations, in declaration order.
    ///
    /// Left out when empty, so merging a config that declares no services
    /// keeps the declarations of lower-priority sources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceDeclaration>,
}

/// One `[[services]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeclaration {
    /// Logical service name.
    pub name: String,

    /// Implementation key. Entries without one only carry settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,

    /// Everything else in the entry.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ServiceDeclaration {
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: Some(implementation.into()),
            settings: Map::new(),
        }
    }

    /// Adds a setting to the declaration.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

impl KeystoneConfig {
    /// Looks up the declaration for `name`.
    pub fn service(&self, name: &str) -> Option<&ServiceDeclaration> {
        self.services.iter().find(|service| service.name == name)
    }

    /// `name → implementation key` pairs in declaration order, skipping
    /// entries that only carry settings.
    pub fn declarations(&self) -> Vec<(String, String)> {
        self.services
            .iter()
            .filter_map(|service| {
                service
                    .implementation
                    .as_ref()
                    .map(|implementation| (service.name.clone(), implementation.clone()))
            })
            .collect()
    }

    /// The whole configuration as one tree: every service's settings under
    /// `services.<name>`, with its implementation key as `implementation`.
    pub fn to_configuration(&self) -> Configuration {
        let mut services = Map::new();
        for service in &self.services {
            let mut section = service.settings.clone();
            if let Some(implementation) = &service.implementation {
                section.insert(
                    IMPLEMENTATION_KEY.to_string(),
                    Value::String(implementation.clone()),
                );
            }
            services.insert(service.name.clone(), Value::Object(section));
        }

        let mut root = Map::new();
        if let Some(path) = &self.application_root {
            root.insert(
                "application_root".to_string(),
                Value::String(path.display().to_string()),
            );
        }
        root.insert("services".to_string(), Value::Object(services));
        Configuration::new(root)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Settings of the logging service, read from its own service section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file, required for `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub thread_ids: bool,
    /// Include file names and line numbers.
    pub file_location: bool,
    /// Per-target levels, e.g. `keystone_core = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            thread_ids: false,
            file_location: false,
            filters: BTreeMap::new(),
            span_events: SpanEventConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declarations_skip_settings_only_entries() {
        let config = KeystoneConfig {
            application_root: Some(PathBuf::from("/srv/app")),
            services: vec![
                ServiceDeclaration::new("Mailer", "acme.mailer").setting("host", "smtp"),
                ServiceDeclaration {
                    name: "LoggingService".into(),
                    ..Default::default()
                },
            ],
        };

        assert_eq!(
            config.declarations(),
            vec![("Mailer".to_string(), "acme.mailer".to_string())]
        );

        let tree = config.to_configuration();
        assert_eq!(tree.get_str("services.Mailer.host"), Some("smtp"));
        assert_eq!(tree.get_str("services.Mailer.implementation"), Some("acme.mailer"));
        assert_eq!(tree.get_str("application_root"), Some("/srv/app"));
        assert!(tree.subset("services.LoggingService").is_empty());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: LoggingConfig =
            Configuration::from_value(json!({ "level": "debug", "filters": { "keystone_core": "trace" } }))
                .deserialize()
                .unwrap();

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.output, LogOutput::Stdout);
        assert_eq!(config.filters.get("keystone_core"), Some(&LogLevel::Trace));
    }
}
