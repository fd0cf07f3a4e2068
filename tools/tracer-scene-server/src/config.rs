// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scene server configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracer::config::{DistributionConfig, DEFAULT_DISTRIBUTION_PORT, DEFAULT_MAX_PEERS};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Scene server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (IP, `localhost` or `*`).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to bind (0 = ephemeral).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding one file per segment (`header`, `nodes`, ...).
    #[serde(default = "default_scene_dir")]
    pub scene_dir: PathBuf,

    /// Reload the segment files every N seconds (0 = load once).
    #[serde(default)]
    pub reload_interval_secs: u64,

    /// Statistics logging interval in seconds (0 = disabled).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Longest wait of one server poll in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deadline for writing one complete response in milliseconds.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Maximum simultaneously connected peers.
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_DISTRIBUTION_PORT
}

fn default_scene_dir() -> PathBuf {
    PathBuf::from("scene")
}

fn default_stats_interval() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_write_timeout_ms() -> u64 {
    5000
}

fn default_max_peers() -> usize {
    DEFAULT_MAX_PEERS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            scene_dir: default_scene_dir(),
            reload_interval_secs: 0,
            stats_interval_secs: default_stats_interval(),
            poll_interval_ms: default_poll_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            max_peers: default_max_peers(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        tracer::config::parse_ip(&self.bind_address)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.scene_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("scene_dir is empty".into()));
        }
        self.to_distribution_config()?
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Library-level server configuration.
    pub fn to_distribution_config(&self) -> Result<DistributionConfig, ConfigError> {
        Ok(DistributionConfig::new(&self.bind_address, self.port)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_write_timeout(Duration::from_millis(self.write_timeout_ms))
            .with_max_peers(self.max_peers))
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ServerConfig = toml::from_str("scene_dir = \"/srv/scene\"").unwrap();
        assert_eq!(config.port, DEFAULT_DISTRIBUTION_PORT);
        assert_eq!(config.scene_dir, PathBuf::from("/srv/scene"));
        assert!(config.reload_interval().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let config = ServerConfig {
            port: 6001,
            reload_interval_secs: 2,
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.reload_interval(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_addr = ServerConfig {
            bind_address: "not-an-address".into(),
            ..Default::default()
        };
        assert!(matches!(bad_addr.validate(), Err(ConfigError::Invalid(_))));

        let zero_poll = ServerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(zero_poll.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            toml::from_str::<ServerConfig>("port = \"high\"").map_err(ConfigError::from),
            Err(ConfigError::Toml(_))
        ));
    }
}
