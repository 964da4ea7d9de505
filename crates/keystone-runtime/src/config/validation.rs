//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{KeystoneConfig, LogOutput, LoggingConfig, ServiceDeclaration};

/// Validates the entire configuration.
pub fn validate_config(config: &KeystoneConfig) -> ConfigResult<()> {
    validate_services(&config.services)?;
    if let Some(root) = &config.application_root
        && root.as_os_str().is_empty()
    {
        return Err(ConfigError::validation("application_root must not be empty"));
    }
    Ok(())
}

/// Validates all service declarations.
fn validate_services(services: &[ServiceDeclaration]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for service in services {
        if service.name.trim().is_empty() {
            return Err(ConfigError::missing_field("services.name"));
        }
        if !seen.insert(service.name.as_str()) {
            return Err(ConfigError::DuplicateService(service.name.clone()));
        }
        if service.name.contains('.') {
            return Err(ConfigError::validation(format!(
                "Service name '{}' must not contain '.'",
                service.name
            )));
        }
        if let Some(implementation) = &service.implementation
            && implementation.trim().is_empty()
        {
            return Err(ConfigError::validation(format!(
                "Service '{}' has an empty implementation key",
                service.name
            )));
        }
    }

    Ok(())
}

/// Validates the logging service settings.
pub fn validate_logging_config(config: &LoggingConfig) -> ConfigResult<()> {
    if config.output == LogOutput::File && config.file_path.is_none() {
        return Err(ConfigError::missing_field("file_path"));
    }
    if let Some(target) = config.filters.keys().find(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid filter target '{target}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_rejected() {
        let config = KeystoneConfig {
            services: vec![
                ServiceDeclaration::new("Cache", "acme.cache"),
                ServiceDeclaration::new("Cache", "acme.other"),
            ],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateService(name)) if name == "Cache"
        ));
    }

    #[test]
    fn test_empty_and_dotted_names_rejected() {
        let empty = KeystoneConfig {
            services: vec![ServiceDeclaration::new(" ", "acme.cache")],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&empty),
            Err(ConfigError::MissingField { .. })
        ));

        let dotted = KeystoneConfig {
            services: vec![ServiceDeclaration::new("acme.Cache", "acme.cache")],
            ..Default::default()
        };
        assert!(validate_config(&dotted).is_err());

        let no_key = KeystoneConfig {
            services: vec![ServiceDeclaration::new("Cache", "")],
            ..Default::default()
        };
        assert!(validate_config(&no_key).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let config = LoggingConfig {
            output: LogOutput::File,
            ..Default::default()
        };
        assert!(validate_logging_config(&config).is_err());
        assert!(validate_logging_config(&LoggingConfig::default()).is_ok());
    }
}
