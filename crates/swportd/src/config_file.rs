//! Configuration file support for swportd
//!
//! Loads and validates swportd settings from TOML files.
//! Default location: /etc/swportd/swportd.toml

use crate::error::{PortdError, PortdResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use swport_netconf::CommitOptions;

/// Default settings file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/swportd/swportd.toml";

/// Background refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between background refreshes of each device
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,

    /// Refresh every device once at startup
    #[serde(default = "default_warm_on_start")]
    pub warm_on_start: bool,
}

/// Cache expiry windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Reconciled interface list per device
    #[serde(default = "default_interfaces_ttl")]
    pub interfaces_ttl_secs: u64,

    /// Single-interface live lookups
    #[serde(default = "default_live_ttl")]
    pub live_ttl_secs: u64,

    /// Aggregate summaries
    #[serde(default = "default_aggregate_ttl")]
    pub aggregate_ttl_secs: u64,
}

/// Session defaults shared by all devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetconfConfig {
    /// NETCONF-over-SSH port
    #[serde(default = "default_netconf_port")]
    pub port: u16,

    /// Per-RPC timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout while a commit transaction runs
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout_secs: u64,

    /// Use `commit confirmed <n>` before the final commit
    #[serde(default)]
    pub commit_confirm_minutes: Option<u32>,

    /// Default login
    #[serde(default = "default_username")]
    pub username: String,

    /// Default private key
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Default password, used when no key is configured
    #[serde(default)]
    pub password: Option<String>,
}

/// One managed switch stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Management address
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

/// Complete swportd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortdConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub netconf: NetconfConfig,

    /// Device inventory keyed by device name
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,
}

// Default functions
fn default_sync_interval() -> u64 {
    180
}

fn default_warm_on_start() -> bool {
    true
}

fn default_interfaces_ttl() -> u64 {
    30
}

fn default_live_ttl() -> u64 {
    10
}

fn default_aggregate_ttl() -> u64 {
    300
}

fn default_netconf_port() -> u16 {
    830
}

fn default_timeout() -> u64 {
    30
}

fn default_commit_timeout() -> u64 {
    120
}

fn default_username() -> String {
    "netconf_automation".to_string()
}

// Default implementations
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            warm_on_start: default_warm_on_start(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            interfaces_ttl_secs: default_interfaces_ttl(),
            live_ttl_secs: default_live_ttl(),
            aggregate_ttl_secs: default_aggregate_ttl(),
        }
    }
}

impl Default for NetconfConfig {
    fn default() -> Self {
        Self {
            port: default_netconf_port(),
            timeout_secs: default_timeout(),
            commit_timeout_secs: default_commit_timeout(),
            commit_confirm_minutes: None,
            username: default_username(),
            key_path: None,
            password: None,
        }
    }
}

/// Expiry windows for the three cache spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub interfaces: Duration,
    pub live: Duration,
    pub aggregates: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        CacheConfig::default().ttls()
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            interfaces: Duration::from_secs(self.interfaces_ttl_secs),
            live: Duration::from_secs(self.live_ttl_secs),
            aggregates: Duration::from_secs(self.aggregate_ttl_secs),
        }
    }
}

impl PortdConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> PortdResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config = toml::from_str(&content).map_err(|e| {
                    PortdError::Configuration(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(PortdError::Io(e)),
        }
    }

    /// Get background refresh interval as Duration
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Commit behaviour for the session client
    pub fn commit_options(&self) -> CommitOptions {
        CommitOptions {
            timeout: Duration::from_secs(self.netconf.commit_timeout_secs),
            confirm_minutes: self.netconf.commit_confirm_minutes,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> PortdResult<()> {
        if self.sync.interval_secs == 0 {
            return Err(PortdError::Configuration(
                "sync.interval_secs must be > 0".to_string(),
            ));
        }

        let ttls = [
            ("cache.interfaces_ttl_secs", self.cache.interfaces_ttl_secs),
            ("cache.live_ttl_secs", self.cache.live_ttl_secs),
            ("cache.aggregate_ttl_secs", self.cache.aggregate_ttl_secs),
            ("netconf.timeout_secs", self.netconf.timeout_secs),
            ("netconf.commit_timeout_secs", self.netconf.commit_timeout_secs),
        ];
        for (field, value) in ttls {
            if value == 0 {
                return Err(PortdError::Configuration(format!("{} must be > 0", field)));
            }
        }

        if self.netconf.port == 0 {
            return Err(PortdError::Configuration(
                "netconf.port must be > 0".to_string(),
            ));
        }

        if self.netconf.commit_confirm_minutes == Some(0) {
            return Err(PortdError::Configuration(
                "netconf.commit_confirm_minutes must be > 0 when set".to_string(),
            ));
        }

        for (name, device) in &self.devices {
            if device.host.trim().is_empty() {
                return Err(PortdError::Configuration(format!(
                    "devices.{}.host must not be empty",
                    name
                )));
            }
        }

        Ok(())
    }
}
