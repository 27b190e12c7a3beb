//! Direct device operations: bulk commit, rollback and history.
//!
//! These bypass the approval workflow but are audited the same way.

use crate::audit::{AuditAction, AuditEntry, Auditor};
use crate::cache::InterfaceCache;
use crate::error::PortdResult;
use crate::inventory::Inventory;
use crate::store::Store;
use serde_json::json;
use std::sync::Arc;
use swport_netconf::{CommitEntry, CommitReport, NetconfClient, RollbackReport};
use swport_types::{DesiredConfig, InterfaceChange, VlanEntry};
use tracing::{info, instrument, warn};

pub struct DeviceOps {
    store: Arc<dyn Store>,
    auditor: Auditor,
    client: NetconfClient,
    inventory: Arc<Inventory>,
    cache: Arc<InterfaceCache>,
}

impl DeviceOps {
    pub fn new(
        store: Arc<dyn Store>,
        client: NetconfClient,
        inventory: Arc<Inventory>,
        cache: Arc<InterfaceCache>,
    ) -> Self {
        Self {
            auditor: Auditor::new(Arc::clone(&store)),
            store,
            client,
            inventory,
            cache,
        }
    }

    /// Commits several interface changes in one device transaction.
    ///
    /// Validation problems are returned before the device is contacted. A
    /// device-side failure comes back as a failed report.
    #[instrument(skip(self, changes), fields(changes = changes.len()))]
    pub async fn commit(
        &self,
        device: &str,
        actor: &str,
        changes: Vec<InterfaceChange>,
    ) -> PortdResult<CommitReport> {
        let target = self.inventory.get(device)?;
        for change in &changes {
            change.config.validate_for(&change.interface)?;
        }
        let interfaces: Vec<String> = changes.iter().map(|c| c.interface.clone()).collect();

        let report = match self.client.commit_bulk(target, changes.clone()).await {
            Ok(report) => report,
            Err(e) => {
                self.auditor
                    .record(
                        AuditEntry::new(actor, AuditAction::CommitFailed, device)
                            .with_comment(Some(e.to_string()))
                            .with_payload(json!({ "interfaces": interfaces })),
                    )
                    .await?;
                return Err(e.into());
            }
        };

        if report.ok {
            self.cache.invalidate(device).await;
            for change in &changes {
                if let Err(e) = self
                    .store
                    .upsert_desired(device, &change.interface, &change.config)
                    .await
                {
                    warn!(
                        device,
                        interface = %change.interface,
                        error = %e,
                        "Failed to record desired state"
                    );
                }
            }
            self.auditor
                .record(
                    AuditEntry::new(actor, AuditAction::Commit, device)
                        .with_payload(json!({ "interfaces": interfaces, "diff": report.diff })),
                )
                .await?;
            info!(device, interfaces = interfaces.len(), "Bulk commit applied");
        } else {
            self.auditor
                .record(
                    AuditEntry::new(actor, AuditAction::CommitFailed, device)
                        .with_comment(report.error.clone())
                        .with_payload(json!({ "interfaces": interfaces })),
                )
                .await?;
        }
        Ok(report)
    }

    /// Reloads checkpoint `index` and commits it.
    #[instrument(skip(self))]
    pub async fn rollback(
        &self,
        device: &str,
        actor: &str,
        index: u32,
    ) -> PortdResult<RollbackReport> {
        let target = self.inventory.get(device)?;
        let report = match self.client.rollback(target, index).await {
            Ok(report) => report,
            Err(e) => RollbackReport::failed(e.to_string()),
        };

        if report.ok {
            self.cache.invalidate(device).await;
            self.auditor
                .record(
                    AuditEntry::new(actor, AuditAction::Rollback, device)
                        .with_payload(json!({ "index": index, "diff": report.diff })),
                )
                .await?;
            info!(device, index, "Rolled back");
        } else {
            self.auditor
                .record(
                    AuditEntry::new(actor, AuditAction::RollbackFailed, device)
                        .with_comment(report.error.clone())
                        .with_payload(json!({ "index": index })),
                )
                .await?;
        }
        Ok(report)
    }

    /// Raw `show system commit` text.
    pub async fn rollback_list(&self, device: &str) -> PortdResult<String> {
        let target = self.inventory.get(device)?;
        Ok(self.client.get_rollback_list(target).await?)
    }

    pub async fn history(&self, device: &str) -> PortdResult<Vec<CommitEntry>> {
        let target = self.inventory.get(device)?;
        Ok(self.client.get_commit_history(target).await?)
    }

    /// Diff between checkpoint `index` and the active configuration.
    pub async fn rollback_diff(&self, device: &str, index: u32) -> PortdResult<String> {
        let target = self.inventory.get(device)?;
        Ok(self.client.get_rollback_diff(target, index).await?)
    }

    pub async fn vlans(&self, device: &str) -> PortdResult<Vec<VlanEntry>> {
        let target = self.inventory.get(device)?;
        Ok(self.client.get_vlans(target).await?)
    }

    /// Last committed desired state of one interface.
    pub async fn desired(
        &self,
        device: &str,
        interface: &str,
    ) -> PortdResult<Option<DesiredConfig>> {
        self.store.desired(device, interface).await
    }
}
