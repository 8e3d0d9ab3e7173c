use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid max_retries: {0}. Must be at least 1")]
    InvalidMaxRetries(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid timeout for {0}: must be positive")]
    InvalidTimeout(&'static str),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .aegis/config.yaml (project config)
    /// 3. .aegis/local.yaml (project local overrides, optional)
    /// 4. Environment variables (AEGIS_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".aegis/config.yaml"))
            .merge(Yaml::file(".aegis/local.yaml"))
            .merge(Env::prefixed("AEGIS_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("AEGIS_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.engine.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(config.engine.max_iterations));
        }

        if config.engine.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.engine.max_retries));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.tools.command_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("tools.command_timeout_secs"));
        }
        if config.tools.code_execution_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("tools.code_execution_timeout_secs"));
        }
        if config.planner.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("planner.timeout_secs"));
        }

        if config.audit.enabled
            && (config.audit.log_group.trim().is_empty() || config.audit.log_stream.trim().is_empty())
        {
            return Err(ConfigError::ValidationFailed(
                "audit log_group and log_stream cannot be empty".to_string(),
            ));
        }

        if config.approval.default_user.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "approval.default_user cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RiskLevel;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigLoader::validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_retries() {
        let mut config = Config::default();
        config.engine.max_retries = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRetries(0))
        ));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_rejects_empty_audit_stream() {
        let mut config = Config::default();
        config.audit.log_stream = "  ".to_string();
        assert!(ConfigLoader::validate(&config).is_err());

        config.audit.enabled = false;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "engine:\n  max_iterations: 4\napproval:\n  threshold: medium").unwrap();

        temp_env::with_vars(
            [
                ("AEGIS_ENGINE__MAX_RETRIES", Some("7")),
                ("AEGIS_APPROVAL__THRESHOLD", Some("critical")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.engine.max_iterations, 4);
                assert_eq!(config.engine.max_retries, 7);
                assert_eq!(config.approval.threshold, RiskLevel::Critical);
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "engine:\n  max_iterations: 0").unwrap();
        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
