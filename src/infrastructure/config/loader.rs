use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, ControlBackend};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Unknown log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown log rotation policy.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    /// Database path is empty.
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// Connection limit out of range.
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// Public base URL is not http(s).
    #[error("Invalid public_base_url: {0}. Must start with http:// or https://")]
    InvalidPublicBaseUrl(String),

    /// Redis backend selected without a URL.
    #[error("control.redis_url is required when control.backend is redis")]
    MissingRedisUrl,

    /// Remote scheduler enabled without a URL.
    #[error("scheduler.base_url is required when the scheduler is enabled")]
    MissingSchedulerUrl,

    /// A duration setting is zero.
    #[error("Invalid {0}: must be greater than zero")]
    ZeroDuration(&'static str),

    /// Any other invalid setting.
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
    /// 2. .runwire/config.yaml
    /// 3. .runwire/local.yaml (optional local overrides)
    /// 4. Environment variables (RUNWIRE_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".runwire/config.yaml"))
            .merge(Yaml::file(".runwire/local.yaml"))
            .merge(Env::prefixed("RUNWIRE_").split("__"))
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("RUNWIRE_").split("__"))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
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
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        let base = &config.server.public_base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidPublicBaseUrl(base.clone()));
        }

        if config.control.backend == ControlBackend::Redis
            && config.control.redis_url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::MissingRedisUrl);
        }
        if config.control.response_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration("control.response_ttl_secs"));
        }
        if config.control.marker_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration("control.marker_ttl_secs"));
        }
        if config.control.status_poll_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("control.status_poll_interval_ms"));
        }

        if config.scheduler.enabled
            && config.scheduler.base_url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::MissingSchedulerUrl);
        }
        if config.scheduler.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("scheduler.request_timeout_secs"));
        }

        if let Some(instance_id) = &config.execution.instance_id {
            if instance_id.trim().is_empty() || instance_id.contains(':') {
                return Err(ConfigError::ValidationFailed(format!(
                    "execution.instance_id '{instance_id}' must be non-empty and contain no ':'"
                )));
            }
        }

        Ok(())
    }
}
