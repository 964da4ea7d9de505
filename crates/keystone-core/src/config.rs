//! Per-service configuration and the configuration collaborator contract.
//!
//! The broker never parses configuration itself. It asks a
//! [`ConfigurationProvider`] for the section keyed by
//! [`SERVICE_PREFIX`]` + name` and hands services a [`Configuration`] view of
//! it; when no provider is installed, or nothing is configured, services get an
//! empty configuration rather than an error.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix of service sections in the configuration tree.
pub const SERVICE_PREFIX: &str = "services.";

/// Setting naming a service's implementation key inside its section.
pub const IMPLEMENTATION_KEY: &str = "implementation";

// =============================================================================
// Configuration
// =============================================================================

/// A read-only section of configuration.
///
/// Keys may be dotted (`"pool.size"`) to reach into nested tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: Map<String, Value>,
}

impl Configuration {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Wraps a JSON value; anything but an object yields an empty configuration.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Top-level keys of this section.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Looks up a possibly dotted key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        parts.try_fold(self.values.get(first)?, |value, part| value.get(part))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Boolean setting; also accepts the strings `"true"` / `"false"`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(value)) => *value,
            Some(Value::String(value)) => value.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(number) => number.as_i64(),
            Value::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    /// Nested section under a possibly dotted prefix.
    pub fn subset(&self, prefix: &str) -> Configuration {
        let prefix = prefix.trim_end_matches('.');
        match self.get(prefix) {
            Some(Value::Object(values)) => Self::new(values.clone()),
            _ => Self::default(),
        }
    }

    /// Deserializes the whole section into `T`.
    ///
    /// Use `#[serde(default)]` on `T` so that an empty section still works.
    pub fn deserialize<T>(&self) -> serde_json::Result<T>
    where
        T: DeserializeOwned,
    {
        T::deserialize(Value::Object(self.values.clone()))
    }

    /// Flattens the section into dotted keys and string values.
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        for (key, value) in &self.values {
            flatten_into(&mut properties, key.clone(), value);
        }
        properties
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

fn flatten_into(properties: &mut BTreeMap<String, String>, key: String, value: &Value) {
    match value {
        Value::Object(table) => {
            for (child, value) in table {
                flatten_into(properties, format!("{key}.{child}"), value);
            }
        }
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",");
            properties.insert(key, joined);
        }
        Value::String(text) => {
            properties.insert(key, text.clone());
        }
        Value::Null => {
            properties.insert(key, String::new());
        }
        other => {
            properties.insert(key, other.to_string());
        }
    }
}

// =============================================================================
// Provider contract
// =============================================================================

/// External configuration collaborator consulted by the service broker.
pub trait ConfigurationProvider: Send + Sync {
    /// The section at `prefix` (for example `"services.Cache"`), if any.
    fn configuration(&self, prefix: &str) -> Option<Configuration>;

    /// Every `name → implementation key` declaration, in declaration order.
    fn service_declarations(&self) -> Vec<(String, String)>;

    /// Application root directory, when the configuration names one.
    fn application_root(&self) -> Option<PathBuf> {
        None
    }
}

/// In-memory provider, for hosts that assemble their configuration in code.
///
/// # Example
///
/// ```rust,ignore
/// let provider = StaticConfiguration::new()
///     .service("Cache", "keystone.cache", json!({ "capacity": 128 }))
///     .service("Mailer", "acme.mailer", json!({}));
/// broker.set_configuration_provider(Arc::new(provider));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticConfiguration {
    root: Map<String, Value>,
    declarations: Vec<(String, String)>,
    application_root: Option<PathBuf>,
}

impl StaticConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a service with its implementation key and settings.
    pub fn service(mut self, name: &str, implementation: &str, settings: Value) -> Self {
        self.declarations
            .push((name.to_string(), implementation.to_string()));
        self.settings(name, settings)
    }

    /// Sets configuration for a service without declaring it.
    pub fn settings(mut self, name: &str, settings: Value) -> Self {
        let services = self
            .root
            .entry("services")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(services) = services {
            services.insert(name.to_string(), settings);
        }
        self
    }

    /// Sets an arbitrary top-level section.
    pub fn section(mut self, key: &str, value: Value) -> Self {
        self.root.insert(key.to_string(), value);
        self
    }

    pub fn application_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.application_root = Some(root.into());
        self
    }
}

impl ConfigurationProvider for StaticConfiguration {
    fn configuration(&self, prefix: &str) -> Option<Configuration> {
        let section = Configuration::new(self.root.clone()).subset(prefix);
        (!section.is_empty()).then_some(section)
    }

    fn service_declarations(&self) -> Vec<(String, String)> {
        self.declarations.clone()
    }

    fn application_root(&self) -> Option<PathBuf> {
        self.application_root.clone()
    }
}
