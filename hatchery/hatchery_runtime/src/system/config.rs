//! Configuration for the hatchery runtime.
//!
//! Handles loading and managing runtime configuration.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// Errors that can occur in configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Location of the code bundle isolates are spawned from
    #[serde(default = "default_bundle_location")]
    pub bundle_location: String,

    /// Capacity of the control-plane command channel
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Capacity of the readiness event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Additional configuration
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_bundle_location() -> String {
    "./bundle".to_string()
}

fn default_command_buffer() -> usize {
    64
}

fn default_event_buffer() -> usize {
    64
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bundle_location: default_bundle_location(),
            command_buffer: default_command_buffer(),
            event_buffer: default_event_buffer(),
            extra: HashMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a file
    pub async fn load(path: Option<&str>) -> Result<Self> {
        // Start with default configuration
        let mut config = RuntimeConfig::default();

        if let Some(path) = path {
            info!("Loading configuration from {}", path);

            if !Path::new(path).exists() {
                warn!("Configuration file not found: {}", path);
                return Ok(config);
            }

            let content = fs::read_to_string(path)
                .await
                .context(format!("Failed to read configuration file: {}", path))?;

            config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(e.to_string()))
                .context(format!("Failed to parse configuration file: {}", path))?;
        } else {
            info!("No configuration file specified, using defaults");
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bundle_location.is_empty() {
            return Err(
                ConfigError::Invalid("Bundle location cannot be empty".to_string()).into(),
            );
        }

        if self.command_buffer == 0 {
            return Err(
                ConfigError::Invalid("Command buffer cannot be zero".to_string()).into(),
            );
        }

        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("Event buffer cannot be zero".to_string()).into());
        }

        Ok(())
    }

    /// Merge with another configuration
    pub fn merge(&mut self, other: RuntimeConfig) {
        if !other.bundle_location.is_empty() {
            self.bundle_location = other.bundle_location;
        }

        if other.command_buffer > 0 {
            self.command_buffer = other.command_buffer;
        }

        if other.event_buffer > 0 {
            self.event_buffer = other.event_buffer;
        }

        for (key, value) in other.extra {
            self.extra.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config() {
        let config = RuntimeConfig::load(None).await.unwrap();

        assert_eq!(config.bundle_location, "./bundle");
        assert_eq!(config.command_buffer, 64);
        assert_eq!(config.event_buffer, 64);
    }

    #[tokio::test]
    async fn test_load_config() {
        let path = std::env::temp_dir().join("hatchery_config_test.json");
        let path_str = path.to_str().unwrap();

        let config_json = r#"
        {
            "bundle_location": "/opt/app/bundle",
            "command_buffer": 16
        }
        "#;
        fs::write(&path, config_json).await.unwrap();

        let config = RuntimeConfig::load(Some(path_str)).await.unwrap();
        assert_eq!(config.bundle_location, "/opt/app/bundle");
        assert_eq!(config.command_buffer, 16);
        // Unspecified fields keep their defaults
        assert_eq!(config.event_buffer, 64);

        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let config = RuntimeConfig::load(Some("/nonexistent/hatchery.json"))
            .await
            .unwrap();
        assert_eq!(config.bundle_location, "./bundle");
    }

    #[test]
    fn test_validate_rejects_empty_bundle() {
        let config = RuntimeConfig {
            bundle_location: String::new(),
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_buffers() {
        let config = RuntimeConfig {
            command_buffer: 0,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_config() {
        let mut base = RuntimeConfig::default();

        let mut override_config = RuntimeConfig::default();
        override_config.bundle_location = "/override/bundle".to_string();
        override_config.command_buffer = 8;

        base.merge(override_config);

        assert_eq!(base.bundle_location, "/override/bundle");
        assert_eq!(base.command_buffer, 8);
        assert_eq!(base.event_buffer, 64);
    }
}
