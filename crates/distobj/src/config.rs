// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Repository configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Object server host.
    #[serde(default = "default_server_host")]
    pub server_host: String,

    /// Object server port.
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Class schema file (TOML or JSON).
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,

    /// How many disabled objects are kept for revival.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Bound of the transport's inbound message queue.
    #[serde(default = "default_inbound_queue_capacity")]
    pub inbound_queue_capacity: usize,

    /// Largest accepted frame, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Delay between pump passes once the queue is drained.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    7199
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("classes.toml")
}

fn default_cache_capacity() -> usize {
    10
}

fn default_inbound_queue_capacity() -> usize {
    4096
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
            schema_path: default_schema_path(),
            cache_capacity: default_cache_capacity(),
            inbound_queue_capacity: default_inbound_queue_capacity(),
            max_message_size: default_max_message_size(),
            poll_interval_ms: default_poll_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl RepositoryConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_host.is_empty() {
            return Err(ConfigError::Invalid("server_host is empty".into()));
        }
        if self.server_port == 0 {
            return Err(ConfigError::Invalid("server_port must be non-zero".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache_capacity must be at least 1".into(),
            ));
        }
        if self.inbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "inbound_queue_capacity must be at least 1".into(),
            ));
        }
        // Smallest lifecycle message: type + object id.
        if self.max_message_size < 6 || self.max_message_size > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "max_message_size {} out of range",
                self.max_message_size
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` of the object server.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RepositoryConfig::default();
        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.server_addr(), "127.0.0.1:7199");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RepositoryConfig = toml::from_str(
            r#"
server_host = "objects.local"
cache_capacity = 3
"#,
        )
        .unwrap();
        assert_eq!(config.server_host, "objects.local");
        assert_eq!(config.cache_capacity, 3);
        assert_eq!(config.server_port, 7199);
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_zero_cache_capacity_rejected() {
        let config = RepositoryConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distobj.toml");

        let config = RepositoryConfig {
            server_port: 4000,
            schema_path: PathBuf::from("/etc/distobj/classes.json"),
            ..Default::default()
        };
        config.to_file(&path).unwrap();

        let loaded = RepositoryConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "max_message_size = 2\n").unwrap();

        assert!(matches!(
            RepositoryConfig::from_file(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
