//! State Reconciler
//!
//! Merges three independently fetched views of a device into one interface
//! list:
//!
//! - declared configuration (what the operator configured),
//! - operational status (what the ports are doing),
//! - virtual-chassis port status (which ports are stack fabric).
//!
//! Fabric status beats operational status, and operational status beats
//! configuration defaults. Each source can fail on its own; a failed source
//! is treated as empty and reported as a warning.

use crate::error::{PortdError, PortdResult};
use crate::inventory::Inventory;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use swport_netconf::codec;
use swport_netconf::{FabricPort, NetconfClient, OperationalView, Partial};
use swport_types::{AggregateSummary, InterfaceName, InterfaceRecord};
use tracing::{debug, instrument, warn};

/// Builds reconciled interface lists straight from the device.
#[derive(Clone)]
pub struct Reconciler {
    client: NetconfClient,
    inventory: Arc<Inventory>,
}

impl Reconciler {
    pub fn new(client: NetconfClient, inventory: Arc<Inventory>) -> Self {
        Self { client, inventory }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Reconciled interfaces, sorted by name.
    pub async fn reconcile(&self, device: &str) -> PortdResult<Vec<InterfaceRecord>> {
        Ok(self.reconcile_detailed(device).await?.value)
    }

    /// Like [`reconcile`](Self::reconcile), also reporting degraded sources.
    ///
    /// Fails only for an unknown device.
    #[instrument(skip(self))]
    pub async fn reconcile_detailed(
        &self,
        device: &str,
    ) -> PortdResult<Partial<Vec<InterfaceRecord>>> {
        let target = self.inventory.get(device)?;

        let (declared, operational, fabric) = tokio::join!(
            self.client.get_declared(target),
            self.client.get_operational(target),
            self.client.get_fabric_ports(target),
        );

        let mut warnings = Vec::new();
        let declared = declared.unwrap_or_else(|e| {
            warn!(device, error = %e, "Configuration fetch failed, using empty set");
            warnings.push(format!("configuration: {}", e));
            Vec::new()
        });
        let operational = match operational {
            Ok(view) => {
                warnings.extend(view.warnings);
                view.value
            }
            Err(e) => {
                warn!(device, error = %e, "Operational fetch failed, using empty set");
                warnings.push(format!("operational: {}", e));
                OperationalView::default()
            }
        };
        let fabric = fabric.unwrap_or_else(|e| {
            warn!(device, error = %e, "Fabric port fetch failed, using empty set");
            warnings.push(format!("fabric: {}", e));
            Vec::new()
        });

        let records = merge(declared, &operational, &fabric);
        debug!(device, interfaces = records.len(), degraded = warnings.len(), "Reconciled");
        Ok(Partial {
            value: records,
            warnings,
        })
    }

    /// One reconciled interface.
    pub async fn reconcile_interface(
        &self,
        device: &str,
        interface: &str,
    ) -> PortdResult<InterfaceRecord> {
        self.reconcile(device)
            .await?
            .into_iter()
            .find(|r| r.name == interface)
            .ok_or_else(|| PortdError::not_found("interface", interface))
    }

    /// Aggregate summaries from declared configuration and operational status.
    #[instrument(skip(self))]
    pub async fn aggregates(&self, device: &str) -> PortdResult<Partial<Vec<AggregateSummary>>> {
        let target = self.inventory.get(device)?;
        let (declared, operational) = tokio::join!(
            self.client.get_declared(target),
            self.client.get_operational(target),
        );

        let mut warnings = Vec::new();
        let declared = declared.unwrap_or_else(|e| {
            warn!(device, error = %e, "Configuration fetch failed, using empty set");
            warnings.push(format!("configuration: {}", e));
            Vec::new()
        });
        let status = match operational {
            Ok(view) => view.value.status,
            Err(e) => {
                warn!(device, error = %e, "Operational fetch failed, using empty set");
                warnings.push(format!("operational: {}", e));
                HashMap::new()
            }
        };

        Ok(Partial {
            value: codec::summarize_aggregates(&declared, &status),
            warnings,
        })
    }
}

/// Merges the three views. Pure; output is sorted by name.
pub fn merge(
    declared: Vec<InterfaceRecord>,
    operational: &OperationalView,
    fabric: &[FabricPort],
) -> Vec<InterfaceRecord> {
    let fabric_status: HashMap<&str, &str> = fabric
        .iter()
        .map(|p| (p.name.as_str(), p.vc_status.as_str()))
        .collect();

    let mut merged: BTreeMap<String, InterfaceRecord> = BTreeMap::new();

    for mut record in declared {
        if let Some(vc_status) = fabric_status.get(record.name.as_str()) {
            record.make_fabric(vc_status);
        } else {
            match operational.status.get(&record.name) {
                Some(status) => {
                    record.admin_up = status.admin_up;
                    record.oper_up = status.oper_up;
                }
                None => {
                    record.admin_up = true;
                    record.oper_up = false;
                }
            }
            record.vc_port = false;
            record.vc_status = None;
            if let Some(poe) = operational.poe.get(&record.name) {
                record.poe = Some(*poe);
            }
        }
        merged.insert(record.name.clone(), record);
    }

    for port in fabric {
        if merged.contains_key(&port.name) {
            continue;
        }
        match InterfaceName::parse(&port.name) {
            Ok(parsed) => {
                let record =
                    InterfaceRecord::fabric_placeholder(port.name.clone(), parsed, &port.vc_status);
                merged.insert(port.name.clone(), record);
            }
            Err(e) => debug!(port = %port.name, error = %e, "Skipping fabric port"),
        }
    }

    for (name, status) in &operational.status {
        if merged.contains_key(name) {
            continue;
        }
        // lo0, vme, irb and friends are not switch ports
        if let Ok(parsed) = InterfaceName::parse(name) {
            let mut record = InterfaceRecord::operational_placeholder(
                name.clone(),
                parsed,
                status.admin_up,
                status.oper_up,
            );
            record.poe = operational.poe.get(name).copied();
            merged.insert(name.clone(), record);
        }
    }

    merged.into_values().collect()
}
