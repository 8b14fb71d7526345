//! Configuration management for verdict
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use verdict::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Validation backend: {}", config.backend.base_url);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `VERDICT__<section>__<key>`
//!
//! Examples:
//! - `VERDICT__BACKEND__BASE_URL=https://validation.example.org`
//! - `VERDICT__HTTP__UPLOAD_TIMEOUT=2m`
//! - `VERDICT__UPDATES__CURRENT_VERSION=3.1.0-BETA`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/verdict.toml`.
//! This can be overridden using the `VERDICT_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{BackendConfig, Config, HttpSettings, TaskingManagerConfig, UpdatesConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`VERDICT__*`)
    /// 2. TOML file (default: `config/verdict.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - A base URL, timeout, repository or version fails validation
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[backend]
base_url = "https://validation.example.org"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.backend.base_url, "https://validation.example.org");
    }

    #[test]
    fn test_validation_catches_bad_repository() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[updates]
repository = "just-a-name"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidRepository(_))
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[backend]
base_url = "https://validation.example.org"

[tasking_manager]
base_url = "https://tasking-manager.example.org/api/v2"

[updates]
api_base = "https://api.github.example"
repository = "example/validator-plugin"
current_version = "3.1.0"
asset_extension = ".zip"

[http]
connect_timeout = "5s"
read_timeout = "10s"
upload_timeout = "45s"
user_agent = "validator-plugin/3.1.0"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.tasking_manager.base_url, "https://tasking-manager.example.org/api/v2");
        assert_eq!(config.updates.asset_extension, ".zip");
        assert_eq!(config.http.upload_timeout.to_string(), "45s");
        assert_eq!(config.http.user_agent, "validator-plugin/3.1.0");
    }
}
