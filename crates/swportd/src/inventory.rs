//! Device inventory: maps device names to session targets.

use crate::config_file::{DeviceConfig, NetconfConfig, PortdConfig};
use crate::error::{PortdError, PortdResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use swport_netconf::{Credentials, DeviceTarget};
use tracing::info;

/// Known devices, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    devices: BTreeMap<String, DeviceTarget>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the inventory from the `[devices]` table.
    pub fn from_config(config: &PortdConfig) -> PortdResult<Self> {
        Self::from_devices(&config.devices, &config.netconf)
    }

    /// Loads a JSON device file of the form `{"sw1": {"host": ..., "username": ...}}`.
    ///
    /// Missing per-device settings fall back to the `[netconf]` defaults.
    pub fn load_json(path: impl AsRef<Path>, defaults: &NetconfConfig) -> PortdResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let devices: BTreeMap<String, DeviceConfig> =
            serde_json::from_str(&content).map_err(|e| {
                PortdError::Configuration(format!(
                    "Failed to parse device file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        let inventory = Self::from_devices(&devices, defaults)?;
        info!(path = %path.display(), devices = inventory.len(), "Loaded device file");
        Ok(inventory)
    }

    fn from_devices(
        devices: &BTreeMap<String, DeviceConfig>,
        defaults: &NetconfConfig,
    ) -> PortdResult<Self> {
        let mut inventory = Self::new();
        for (name, device) in devices {
            inventory.insert(resolve_target(name, device, defaults)?);
        }
        Ok(inventory)
    }

    /// Adds or replaces a device.
    pub fn insert(&mut self, target: DeviceTarget) {
        self.devices.insert(target.name.clone(), target);
    }

    /// Looks up a device by name.
    pub fn get(&self, name: &str) -> PortdResult<&DeviceTarget> {
        self.devices
            .get(name)
            .ok_or_else(|| PortdError::not_found("device", name))
    }

    pub fn names(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

// Key files win over passwords; device settings win over [netconf] defaults.
fn resolve_target(
    name: &str,
    device: &DeviceConfig,
    defaults: &NetconfConfig,
) -> PortdResult<DeviceTarget> {
    let credentials = if let Some(key) = &device.key_path {
        Credentials::KeyFile(key.clone())
    } else if let Some(password) = &device.password {
        Credentials::Password(password.clone())
    } else if let Some(key) = &defaults.key_path {
        Credentials::KeyFile(key.clone())
    } else if let Some(password) = &defaults.password {
        Credentials::Password(password.clone())
    } else {
        return Err(PortdError::Configuration(format!(
            "device {} has no key_path or password",
            name
        )));
    };

    let username = device
        .username
        .clone()
        .unwrap_or_else(|| defaults.username.clone());

    Ok(DeviceTarget::new(name, device.host.clone(), username, credentials)
        .with_port(device.port.unwrap_or(defaults.port))
        .with_timeout(Duration::from_secs(defaults.timeout_secs)))
}
