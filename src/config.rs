//! Configuration management for driftkv
//!
//! Both binaries load an optional TOML file, apply `DRIFTKV_*` environment
//! overrides, then validate. A storage node's port comes from its single
//! command-line argument; everything else lives here.

use crate::cluster::ring::DEFAULT_VIRTUAL_NODES;
use crate::store::DEFAULT_NUM_SHARDS;
use crate::wal::{SyncPolicy, WalError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Valid levels: {:?}",
                self.level, valid_levels
            ));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(format!(
                "Invalid log format: {}. Valid formats: {:?}",
                self.format, valid_formats
            ));
        }
        Ok(())
    }
}

/// Storage node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Bind address (the port comes from the CLI argument)
    pub bind_addr: String,
    /// Number of shards
    pub num_shards: usize,
    /// Directory holding `wal_<port>.log`
    pub wal_dir: String,
    /// WAL sync policy: none, flush or sync
    pub wal_sync_policy: String,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            num_shards: DEFAULT_NUM_SHARDS,
            wal_dir: ".".to_string(),
            wal_sync_policy: "flush".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from `config/node.toml` (if present) with
    /// environment overrides.
    pub async fn load() -> crate::Result<Self> {
        let mut config = if Path::new("config/node.toml").exists() {
            let content = fs::read_to_string("config/node.toml").await?;
            toml::from_str(&content)?
        } else {
            NodeConfig::default()
        };

        config.apply_env_overrides();
        config.validate().map_err(crate::Error::from)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind_addr) = std::env::var("DRIFTKV_BIND_ADDR") {
            self.bind_addr = bind_addr;
        }
        if let Ok(num_shards) = std::env::var("DRIFTKV_NUM_SHARDS") {
            if let Ok(shards) = num_shards.parse::<usize>() {
                self.num_shards = shards;
            }
        }
        if let Ok(wal_dir) = std::env::var("DRIFTKV_WAL_DIR") {
            self.wal_dir = wal_dir;
        }
        if let Ok(sync_policy) = std::env::var("DRIFTKV_WAL_SYNC_POLICY") {
            self.wal_sync_policy = sync_policy;
        }
        if let Ok(level) = std::env::var("DRIFTKV_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("DRIFTKV_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.num_shards == 0 {
            return Err("Number of shards must be greater than 0".to_string());
        }
        SyncPolicy::parse(&self.wal_sync_policy).map_err(|err| err.to_string())?;
        self.logging.validate()
    }

    /// WAL file path for a node bound to `port`.
    pub fn wal_path(&self, port: u16) -> PathBuf {
        Path::new(&self.wal_dir).join(format!("wal_{}.log", port))
    }

    /// Parsed WAL sync policy.
    pub fn sync_policy(&self) -> Result<SyncPolicy, WalError> {
        SyncPolicy::parse(&self.wal_sync_policy)
    }
}

/// Proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Bind address
    pub bind_addr: String,
    /// Listen port (8000 by convention)
    pub port: u16,
    /// Virtual nodes per physical node on the ring
    pub virtual_nodes: u32,
    /// Timeout for forwarded data operations, in seconds
    pub request_timeout_secs: u64,
    /// Timeout for health probes, in seconds
    pub probe_timeout_secs: u64,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            request_timeout_secs: 5,
            probe_timeout_secs: 2,
            logging: LoggingConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from `config/proxy.toml` (if present) with
    /// environment overrides.
    pub async fn load() -> crate::Result<Self> {
        let mut config = if Path::new("config/proxy.toml").exists() {
            let content = fs::read_to_string("config/proxy.toml").await?;
            toml::from_str(&content)?
        } else {
            ProxyConfig::default()
        };

        config.apply_env_overrides();
        config.validate().map_err(crate::Error::from)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind_addr) = std::env::var("DRIFTKV_PROXY_BIND_ADDR") {
            self.bind_addr = bind_addr;
        }
        if let Ok(port) = std::env::var("DRIFTKV_PROXY_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.port = port;
            }
        }
        if let Ok(virtual_nodes) = std::env::var("DRIFTKV_VIRTUAL_NODES") {
            if let Ok(count) = virtual_nodes.parse::<u32>() {
                self.virtual_nodes = count;
            }
        }
        if let Ok(timeout) = std::env::var("DRIFTKV_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.request_timeout_secs = secs;
            }
        }
        if let Ok(timeout) = std::env::var("DRIFTKV_PROBE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.probe_timeout_secs = secs;
            }
        }
        if let Ok(level) = std::env::var("DRIFTKV_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("DRIFTKV_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.virtual_nodes == 0 {
            return Err("Virtual node count must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err("Timeouts must be greater than 0".to_string());
        }
        self.logging.validate()
    }
}
