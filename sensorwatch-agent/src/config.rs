//! Agent configuration
//!
//! Handles:
//! - Kernel ingest endpoint and optional API key
//! - Collection cadence
//! - Delivery budget (retry count, retry delay, per-attempt timeout)
//!
//! Loaded once at startup; there is no hot reload.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::delivery::RetryPolicy;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub server_url: String,
    pub api_key: Option<String>,
    pub collection_interval_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub attempt_timeout_secs: u64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_retries must be at least 1")]
    NoAttempts,
    #[error("server_url must be an http(s) URL, got '{0}'")]
    BadUrl(String),
    #[error("attempt_timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("collection_interval_secs must be greater than zero")]
    ZeroInterval,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000/ingest".to_string(),
            api_key: None,
            collection_interval_secs: 60,
            max_retries: 3,
            retry_delay_secs: 5,
            attempt_timeout_secs: 10,
        }
    }
}

impl AgentConfig {
    /// Load config from `$SENSORWATCH_AGENT_CONFIG` or the OS-specific location
    pub async fn load() -> Result<Self> {
        let config_path = match std::env::var("SENSORWATCH_AGENT_CONFIG") {
            Ok(path) => PathBuf::from(path),
            Err(_) => Self::config_file_path()?,
        };

        let config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("sensorwatch-agent");
        path.push("config.toml");
        Ok(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.attempt_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.collection_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::BadUrl(self.server_url.clone()));
        }
        Ok(())
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.server_url, "http://localhost:8000/ingest");
        assert_eq!(config.collection_interval(), Duration::from_secs(60));
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(5));
        assert_eq!(policy.attempt_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AgentConfig::from_toml(
            "server_url = \"https://collector.lan/ingest\"\nmax_retries = 5\n",
        )
        .unwrap();
        assert_eq!(config.server_url, "https://collector.lan/ingest");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_secs, 5);
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_validation() {
        let config = AgentConfig { max_retries: 0, ..AgentConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::NoAttempts));

        let config = AgentConfig { server_url: "localhost:8000".into(), ..AgentConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::BadUrl(_))));

        let config = AgentConfig { attempt_timeout_secs: 0, ..AgentConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_zero_collection_interval_is_rejected() {
        let config = AgentConfig::from_toml("collection_interval_secs = 0\n").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));

        let config = AgentConfig { collection_interval_secs: 1, ..AgentConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_path() {
        if let Ok(path) = AgentConfig::config_file_path() {
            assert!(path.to_string_lossy().contains("sensorwatch-agent"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
