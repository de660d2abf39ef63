//! # Gateway Configuration
//!
//! Loaded from defaults, environment variables or a TOML file.
//!
//! ```toml
//! api_debug = false
//! ipfs_mode = "local"
//! dht_enabled = true
//! announce_dbs = true
//! announce_interval_ms = 1800000
//! keep_alive_interval_ms = 10000
//! sink_capacity = 64
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default period between database announcements.
pub const DEFAULT_ANNOUNCE_INTERVAL_MS: u64 = 1_800_000;

/// Default period between keep-alive frames on client streams.
pub const DEFAULT_KEEP_ALIVE_MS: u64 = 10_000;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {error}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        error: String,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// An environment variable holds an unusable value.
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Offending value
        value: String,
    },
}

/// How the gateway reaches its IPFS node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpfsMode {
    /// Remote daemon over its HTTP API.
    Api,
    /// In-process node.
    #[default]
    Local,
}

impl FromStr for IpfsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "local" => Ok(Self::Local),
            other => Err(other.to_string()),
        }
    }
}

/// Gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Include error detail in client errors.
    pub api_debug: bool,

    /// IPFS connection mode.
    pub ipfs_mode: IpfsMode,

    /// DHT enabled on the local node.
    pub dht_enabled: bool,

    /// Periodically re-announce every open database.
    pub announce_dbs: bool,

    /// Announcement period in milliseconds.
    pub announce_interval_ms: u64,

    /// Keep-alive period for client streams in milliseconds.
    pub keep_alive_interval_ms: u64,

    /// Frames buffered per client sink.
    pub sink_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_debug: false,
            ipfs_mode: IpfsMode::Local,
            dht_enabled: false,
            announce_dbs: false,
            announce_interval_ms: DEFAULT_ANNOUNCE_INTERVAL_MS,
            keep_alive_interval_ms: DEFAULT_KEEP_ALIVE_MS,
            sink_capacity: 64,
        }
    }
}

fn parse_flag(var: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(var) {
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" | "" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnv {
                var: var.to_string(),
                value: v,
            }),
        },
        Err(_) => Ok(None),
    }
}

fn parse_number<T: FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value: v,
            }),
        Err(_) => Ok(None),
    }
}

impl GatewayConfig {
    /// Create a config for testing (short intervals, debug errors).
    pub fn for_testing() -> Self {
        Self {
            api_debug: true,
            ipfs_mode: IpfsMode::Local,
            dht_enabled: true,
            announce_dbs: false,
            announce_interval_ms: 50,
            keep_alive_interval_ms: 20,
            sink_capacity: 64,
        }
    }

    /// Defaults overridden by environment variables.
    ///
    /// - `API_DEBUG`: include error detail (default: false)
    /// - `IPFS_MODE`: `api` or `local` (default: local)
    /// - `IPFS_DHT`: DHT enabled on the local node (default: false)
    /// - `ANNOUNCE_DBS`: periodic announcements (default: false)
    /// - `ANNOUNCE_INTERVAL`: announcement period in ms (default: 1800000)
    /// - `KEEP_ALIVE_MS`: keep-alive period in ms (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = parse_flag("API_DEBUG")? {
            config.api_debug = v;
        }
        if let Ok(v) = env::var("IPFS_MODE") {
            config.ipfs_mode = v.parse().map_err(|value| ConfigError::InvalidEnv {
                var: "IPFS_MODE".to_string(),
                value,
            })?;
        }
        if let Some(v) = parse_flag("IPFS_DHT")? {
            config.dht_enabled = v;
        }
        if let Some(v) = parse_flag("ANNOUNCE_DBS")? {
            config.announce_dbs = v;
        }
        if let Some(v) = parse_number("ANNOUNCE_INTERVAL")? {
            config.announce_interval_ms = v;
        }
        if let Some(v) = parse_number("KEEP_ALIVE_MS")? {
            config.keep_alive_interval_ms = v;
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string. Missing keys keep defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// True if announcements can reach the DHT in this mode.
    pub fn announce_effective(&self) -> bool {
        match self.ipfs_mode {
            IpfsMode::Api => true,
            IpfsMode::Local => self.dht_enabled,
        }
    }

    /// True if periodic announcing should run. Logs a warning when it was
    /// requested but cannot take effect.
    pub fn periodic_announce(&self) -> bool {
        if !self.announce_dbs {
            return false;
        }
        if !self.announce_effective() {
            warn!(
                mode = ?self.ipfs_mode,
                "Announcing databases requires api mode or a local node with the DHT enabled"
            );
            return false;
        }
        true
    }

    /// Announcement period.
    pub fn announce_interval(&self) -> Duration {
        Duration::from_millis(self.announce_interval_ms.max(1))
    }

    /// Keep-alive period.
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms.max(1))
    }
}
