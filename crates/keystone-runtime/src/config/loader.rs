//! figment-based configuration loading.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults;
//! 2. `keystone.toml` from the first search path that has one, or the file
//!    passed to [`ConfigLoader::file`];
//! 3. `keystone.<profile>.toml` next to it, when a profile is active;
//! 4. `KEYSTONE_*` environment variables, `__` separating nested keys
//!    (`KEYSTONE_APPLICATION_ROOT=/srv/app`);
//! 5. programmatic overrides, in the order they were added.
//!
//! Tables merge key by key. Arrays, `services` included, are replaced whole by
//! the higher-priority source; an override without services leaves them
//! alone.
//!
//! With the `yaml-config` feature `keystone.yaml` / `keystone.yml` are found
//! too; TOML wins when both exist.
//!
//! ```rust,ignore
//! use keystone_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .search_path("/etc/keystone")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::KeystoneConfig;
use super::validation::validate_config;

/// Prefix of environment variables merged into the configuration.
pub const ENV_PREFIX: &str = "KEYSTONE_";

/// Environment variable selecting the active profile.
pub const PROFILE_VAR: &str = "KEYSTONE_PROFILE";

/// Layered configuration loader.
///
/// Plain data: it can be cloned and handed to the configuration service as
/// startup data, which runs it during early init.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    profile: Option<String>,
    search_paths: Vec<PathBuf>,
    explicit_file: Option<PathBuf>,
    read_env: bool,
    overrides: Vec<KeystoneConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader reading the default search paths and the environment, with
    /// the profile taken from `KEYSTONE_PROFILE`.
    pub fn new() -> Self {
        Self {
            profile: std::env::var(PROFILE_VAR)
                .ok()
                .filter(|profile| !profile.is_empty()),
            search_paths: Vec::new(),
            explicit_file: None,
            read_env: true,
            overrides: Vec::new(),
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn active_profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Adds a directory to search. Once any is added, the defaults (the
    /// working directory, then the user config directory) are not searched.
    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Layers `config` above every other source.
    pub fn merge(mut self, config: KeystoneConfig) -> Self {
        self.overrides.push(config);
        self
    }

    /// Merges all sources, then validates the result.
    pub fn load(&self) -> ConfigResult<KeystoneConfig> {
        let config: KeystoneConfig = self.figment()?.extract()?;
        validate_config(&config)?;
        debug!(
            profile = self.profile.as_deref().unwrap_or("-"),
            services = config.services.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(KeystoneConfig::default()));

        figment = match &self.explicit_file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => self.merge_with_profile(figment, path)?,
            None => match self.find_main_file() {
                Some(path) => self.merge_with_profile(figment, &path)?,
                None => {
                    warn!("No configuration file found, using defaults");
                    figment
                }
            },
        };

        if self.read_env {
            trace!(prefix = ENV_PREFIX, "Merging environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }

        for config in &self.overrides {
            figment = figment.merge(Serialized::defaults(config));
        }
        Ok(figment)
    }

    /// Merges `main_file`, then its profile sibling if one exists.
    fn merge_with_profile(&self, figment: Figment, main_file: &Path) -> ConfigResult<Figment> {
        info!(path = %main_file.display(), "Loading configuration file");
        let mut figment = merge_file(figment, main_file)?;

        if let Some(profile_file) = self.profile_file(main_file)
            && profile_file.exists()
        {
            debug!(path = %profile_file.display(), "Loading profile configuration file");
            figment = merge_file(figment, &profile_file)?;
        }
        Ok(figment)
    }

    /// `dir/keystone.toml` → `dir/keystone.<profile>.toml`.
    fn profile_file(&self, main_file: &Path) -> Option<PathBuf> {
        let profile = self.profile.as_deref()?;
        let stem = main_file.file_stem()?.to_str()?;
        let ext = main_file.extension()?.to_str()?;
        Some(main_file.with_file_name(format!("{stem}.{profile}.{ext}")))
    }

    fn find_main_file(&self) -> Option<PathBuf> {
        let directories = if self.search_paths.is_empty() {
            default_search_paths()
        } else {
            self.search_paths.clone()
        };

        directories.iter().find_map(|directory| {
            supported_extensions()
                .into_iter()
                .map(|ext| directory.join(format!("keystone.{ext}")))
                .find(|path| path.exists())
        })
    }
}

fn default_search_paths() -> Vec<PathBuf> {
    std::env::current_dir()
        .ok()
        .into_iter()
        .chain(dirs::config_dir().map(|dir| dir.join("keystone")))
        .collect()
}

#[allow(unused_mut)]
fn supported_extensions() -> Vec<&'static str> {
    let mut extensions = Vec::new();
    #[cfg(feature = "toml-config")]
    extensions.push("toml");
    #[cfg(feature = "yaml-config")]
    extensions.extend(["yaml", "yml"]);
    extensions
}

#[allow(unused_variables)]
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<KeystoneConfig> {
    ConfigLoader::new().load()
}

/// Loads one file plus its profile sibling and the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<KeystoneConfig> {
    ConfigLoader::new().file(path).load()
}
