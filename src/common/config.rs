//! Configuration for imdg processes
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file
//! (`imdg.toml` in the working directory unless a path is given), then
//! `IMDG__SECTION__FIELD` environment variables. Binaries apply CLI flags last.

use crate::common::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Manager-specific config
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Storage-node-specific config
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("imdg").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("IMDG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

/// Manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Listen address for client text requests
    #[serde(default = "default_client_addr")]
    pub client_addr: SocketAddr,

    /// Listen address for storage nodes
    #[serde(default = "default_storage_addr")]
    pub storage_addr: SocketAddr,

    /// Listen address for the admin HTTP API
    #[serde(default = "default_admin_addr")]
    pub admin_addr: SocketAddr,

    /// Write-ahead log of accepted commands
    #[serde(default = "default_wal_path")]
    pub wal_path: PathBuf,

    /// Pending WAL appends before producers wait
    #[serde(default = "default_wal_queue_capacity")]
    pub wal_queue_capacity: usize,

    /// Delay before the first periodic resync
    #[serde(default = "default_resync_initial_delay")]
    pub resync_initial_delay_secs: u64,

    /// Period of the full-log resync (0 disables it)
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Upper bound on one request/response exchange with a node
    #[serde(default = "default_node_timeout")]
    pub node_timeout_ms: u64,
}

fn default_client_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7000))
}
fn default_storage_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7001))
}
fn default_admin_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7080))
}
fn default_wal_path() -> PathBuf {
    PathBuf::from("file.json")
}
fn default_wal_queue_capacity() -> usize {
    1024
}
fn default_resync_initial_delay() -> u64 {
    10
}
fn default_resync_interval() -> u64 {
    5
}
fn default_node_timeout() -> u64 {
    30_000
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            client_addr: default_client_addr(),
            storage_addr: default_storage_addr(),
            admin_addr: default_admin_addr(),
            wal_path: default_wal_path(),
            wal_queue_capacity: default_wal_queue_capacity(),
            resync_initial_delay_secs: default_resync_initial_delay(),
            resync_interval_secs: default_resync_interval(),
            node_timeout_ms: default_node_timeout(),
        }
    }
}

impl ManagerConfig {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    /// `None` when periodic resync is disabled
    pub fn resync_schedule(&self) -> Option<(Duration, Duration)> {
        if self.resync_interval_secs == 0 {
            return None;
        }
        Some((
            Duration::from_secs(self.resync_initial_delay_secs),
            Duration::from_secs(self.resync_interval_secs),
        ))
    }
}

/// Storage node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Manager address to dial
    #[serde(default = "default_manager_addr")]
    pub manager_addr: String,

    /// Directory holding the private replay file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_manager_addr() -> String {
    "127.0.0.1:7001".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            manager_addr: default_manager_addr(),
            data_dir: default_data_dir(),
        }
    }
}
