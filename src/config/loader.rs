//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles YAML file discovery,
//! environment detection, and merging of environment override sections.

use super::error::{ConfigResult, ConfigurationError};
use super::TrackerConfig;
use crate::constants::{
    system, CONFIG_DIR_VAR, CONFIG_FILE_NAMES, ENVIRONMENT_VAR, KNOWN_ENVIRONMENTS,
};
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded and validated configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: TrackerConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config_file = Self::find_config_file(&config_directory)?;
        let yaml_content = Self::read_config_file_safely(&config_file)?;
        let config = Self::parse_and_merge(
            &yaml_content,
            environment,
            &config_file.display().to_string(),
        )?;

        config.validate()?;

        info!(
            environment = %environment,
            config_file = %config_file.display(),
            sampling_interval_seconds = config.coordinator.sampling_interval_seconds,
            cloud_update_interval_seconds = config.coordinator.cloud_update_interval_seconds,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Build a validated configuration from YAML text
    pub fn from_yaml_str(yaml_content: &str, environment: &str) -> ConfigResult<TrackerConfig> {
        let config = Self::parse_and_merge(yaml_content, environment, "<inline>")?;
        config.validate()?;
        Ok(config)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Get the configuration as JSON for debugging output
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var(ENVIRONMENT_VAR)
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// Get default configuration directory
    fn default_config_directory() -> PathBuf {
        if let Ok(dir) = env::var(CONFIG_DIR_VAR) {
            return PathBuf::from(dir);
        }

        let possible_dirs = [PathBuf::from("config"), PathBuf::from("../config")];
        for dir in possible_dirs {
            if CONFIG_FILE_NAMES
                .iter()
                .any(|name| dir.join(name).exists())
            {
                debug!("Found config directory: {}", dir.display());
                return dir;
            }
        }

        PathBuf::from("config")
    }

    /// Find the configuration file
    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();

        for name in CONFIG_FILE_NAMES {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.exists() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    /// Safely read a configuration file with size limits
    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if metadata.len() > system::MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                format!(
                    "Configuration file too large ({} bytes > {} bytes limit)",
                    metadata.len(),
                    system::MAX_CONFIG_FILE_SIZE
                ),
            ));
        }

        if !metadata.is_file() {
            return Err(ConfigurationError::invalid_value(
                "file_type",
                "directory or special file",
                "Configuration path must point to a regular file",
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    /// Parse YAML and merge the environment-specific override section
    fn parse_and_merge(
        yaml_content: &str,
        environment: &str,
        source: &str,
    ) -> ConfigResult<TrackerConfig> {
        let mut yaml_data: YamlValue = if yaml_content.trim().is_empty() {
            YamlValue::Null
        } else {
            serde_yaml::from_str(yaml_content)
                .map_err(|e| ConfigurationError::invalid_yaml(source, e))?
        };
        if yaml_data.is_null() {
            yaml_data = YamlValue::Mapping(Default::default());
        }

        if let Some(env_overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            if !matches!(env_overrides, YamlValue::Mapping(_) | YamlValue::Null) {
                return Err(ConfigurationError::environment_config_error(
                    environment,
                    "environment override section must be a mapping",
                ));
            }
            debug!(
                "Applying environment-specific overrides for: {}",
                environment
            );
            Self::merge_yaml_values(&mut yaml_data, env_overrides);
        }

        // Environment sections are not part of the config structure
        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for name in KNOWN_ENVIRONMENTS {
                map.remove(YamlValue::String(name.to_string()));
            }
            map.remove(YamlValue::String(environment.to_string()));
        }

        let mut config: TrackerConfig = serde_yaml::from_value(yaml_data).map_err(|e| {
            ConfigurationError::invalid_yaml(
                source,
                format!("Failed to deserialize configuration: {e}"),
            )
        })?;

        config.environment = environment.to_string();

        Ok(config)
    }

    /// Recursively merge YAML values (environment overrides into base config)
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (_, YamlValue::Null) => {}
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing_value, value);
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
    }
}
