//! Shared harness: one inventoried device backed by the mock NETCONF device.

#![allow(dead_code)]

use std::sync::Arc;
use swport_netconf::mock::MockDevice;
use swport_netconf::{CommitOptions, Credentials, DeviceTarget, NetconfClient};
use swportd::{CacheTtls, Inventory, MemoryStore, Services};

pub const DEVICE: &str = "access-sw01";

pub struct Harness {
    pub device: MockDevice,
    pub services: Services,
}

pub fn harness(device: MockDevice) -> Harness {
    harness_with(device, CacheTtls::default(), CommitOptions::default())
}

pub fn harness_with(device: MockDevice, ttls: CacheTtls, options: CommitOptions) -> Harness {
    let mut inventory = Inventory::new();
    inventory.insert(DeviceTarget::new(
        DEVICE,
        "192.0.2.10",
        "netconf_automation",
        Credentials::Password("secret".to_string()),
    ));
    let client = NetconfClient::new(Arc::new(device.clone()), options);
    let services = Services::new(inventory, Arc::new(MemoryStore::new()), client, ttls);
    Harness { device, services }
}
