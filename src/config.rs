//! Configuration Module
//!
//! This module defines all configuration structures for the aggregator service.
//! Configuration is loaded from TOML files and parsed using serde.

use crate::ItemKind;
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use thiserror::Error;

/// Default quiet period before a group is finalized
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration structure
///
/// Every section is optional in the file; missing sections fall back to defaults.
///
/// # Example TOML
/// ```toml
/// [aggregator]
/// timeout_ms = 1000
/// aggregate_kinds = ["photo", "video"]
///
/// [api]
/// host = "127.0.0.1"
/// port = 8545
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub api: ApiConfig,
}

/// Group aggregation configuration
///
/// # Fields
/// - `timeout_ms`: Quiet period in milliseconds; the timer restarts on every new item
/// - `aggregate_kinds`: Item kinds that are collected into groups; other kinds pass through
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub timeout_ms: u64,
    pub aggregate_kinds: Vec<ItemKind>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            aggregate_kinds: vec![ItemKind::Photo, ItemKind::Video],
        }
    }
}

impl AggregatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on (e.g., 8545)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8545,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
