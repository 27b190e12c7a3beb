//! Change-request workflow.
//!
//! ```text
//! pending ──approve──▶ approved ──apply ok──▶ approved (terminal)
//!    │                    └──────apply error──▶ failed (terminal)
//!    └──────reject───▶ rejected (terminal)
//! ```
//!
//! Transitions are compare-and-swap against the stored status, so two
//! approvers racing on one request cannot both win. Every transition writes
//! one audit entry; each apply outcome writes one more.

use crate::audit::{AuditAction, AuditEntry, Auditor};
use crate::cache::InterfaceCache;
use crate::error::{PortdError, PortdResult};
use crate::inventory::Inventory;
use crate::store::{RequestFilter, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use swport_netconf::NetconfClient;
use swport_types::DesiredConfig;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// What a request does to the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Merge the desired configuration.
    Config,
    /// Remove the interface stanza.
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed interface change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: Uuid,
    pub device: String,
    pub interface: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub config: Option<DesiredConfig>,
    pub requester: String,
    /// Set when the request leaves `pending`.
    pub approver: Option<String>,
    pub status: RequestStatus,
    /// Decision comment, or the device error after a failed apply.
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChangeRequest {
    pub fn new(
        device: impl Into<String>,
        interface: impl Into<String>,
        kind: RequestKind,
        config: Option<DesiredConfig>,
        requester: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            device: device.into(),
            interface: interface.into(),
            kind,
            config,
            requester: requester.into(),
            approver: None,
            status: RequestStatus::Pending,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn audit(&self, actor: &str, action: AuditAction) -> AuditEntry {
        AuditEntry::new(actor, action, &self.device)
            .with_interface(&self.interface)
            .with_request(self.id)
    }
}

/// Drives change requests through approval and device apply.
pub struct ChangeWorkflow {
    store: Arc<dyn Store>,
    auditor: Auditor,
    client: NetconfClient,
    inventory: Arc<Inventory>,
    cache: Arc<InterfaceCache>,
}

impl ChangeWorkflow {
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

    /// Records a pending configuration change. Nothing else happens until approval.
    pub async fn submit(
        &self,
        device: &str,
        interface: &str,
        config: DesiredConfig,
        requester: &str,
    ) -> PortdResult<ChangeRequest> {
        self.insert(ChangeRequest::new(
            device,
            interface,
            RequestKind::Config,
            Some(config),
            requester,
        ))
        .await
    }

    /// Records a pending removal of an interface's configuration.
    pub async fn submit_delete(
        &self,
        device: &str,
        interface: &str,
        requester: &str,
    ) -> PortdResult<ChangeRequest> {
        self.insert(ChangeRequest::new(
            device,
            interface,
            RequestKind::Delete,
            None,
            requester,
        ))
        .await
    }

    async fn insert(&self, request: ChangeRequest) -> PortdResult<ChangeRequest> {
        self.store.insert_request(&request).await?;
        info!(
            id = %request.id,
            device = %request.device,
            interface = %request.interface,
            requester = %request.requester,
            "Change request submitted"
        );
        Ok(request)
    }

    pub async fn get(&self, id: Uuid) -> PortdResult<ChangeRequest> {
        self.store
            .get_request(id)
            .await?
            .ok_or_else(|| PortdError::not_found("request", id.to_string()))
    }

    /// Newest first.
    pub async fn list(&self, filter: &RequestFilter) -> PortdResult<Vec<ChangeRequest>> {
        self.store.list_requests(filter).await
    }

    /// Approves a pending request and applies it to the device.
    ///
    /// An apply failure marks the request `failed` with the device error as
    /// its comment and is returned to the caller.
    #[instrument(skip(self, comment))]
    pub async fn approve(
        &self,
        id: Uuid,
        approver: &str,
        comment: Option<String>,
    ) -> PortdResult<ChangeRequest> {
        let request = self
            .decide(id, approver, comment, RequestStatus::Approved)
            .await?;
        if let Err(e) = self
            .auditor
            .record(
                request
                    .audit(approver, AuditAction::Approve)
                    .with_comment(request.comment.clone()),
            )
            .await
        {
            // never leave an approved request that was not applied
            self.mark_failed(&request, e.to_string()).await?;
            return Err(e);
        }

        match self.apply(&request).await {
            Ok(()) => {
                self.auditor
                    .record(request.audit(approver, AuditAction::ApplySuccess).with_payload(
                        serde_json::json!({ "type": request.kind, "config": request.config }),
                    ))
                    .await?;
                self.refresh_after_apply(&request, approver).await;
                Ok(request)
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    id = %request.id,
                    device = %request.device,
                    error = %message,
                    "Apply failed"
                );

                self.mark_failed(&request, message.clone()).await?;
                self.auditor
                    .record(
                        request
                            .audit(approver, AuditAction::ApplyFailed)
                            .with_comment(Some(message)),
                    )
                    .await?;
                Err(e)
            }
        }
    }

    /// Rejects a pending request. The device is not touched.
    #[instrument(skip(self, comment))]
    pub async fn reject(
        &self,
        id: Uuid,
        approver: &str,
        comment: Option<String>,
    ) -> PortdResult<ChangeRequest> {
        let request = self
            .decide(id, approver, comment, RequestStatus::Rejected)
            .await?;
        self.auditor
            .record(
                request
                    .audit(approver, AuditAction::Reject)
                    .with_comment(request.comment.clone()),
            )
            .await?;
        Ok(request)
    }

    // approved -> failed, keeping `message` as the comment.
    async fn mark_failed(&self, request: &ChangeRequest, message: String) -> PortdResult<()> {
        let mut failed = request.clone();
        failed.status = RequestStatus::Failed;
        failed.comment = Some(message);
        failed.updated_at = Utc::now();
        if !self
            .store
            .update_request(&failed, RequestStatus::Approved)
            .await?
        {
            warn!(id = %request.id, "Request changed while applying");
        }
        Ok(())
    }

    // pending -> `next`, or StateConflict with nothing written.
    async fn decide(
        &self,
        id: Uuid,
        approver: &str,
        comment: Option<String>,
        next: RequestStatus,
    ) -> PortdResult<ChangeRequest> {
        let mut request = self.get(id).await?;
        if request.status != RequestStatus::Pending {
            return Err(PortdError::state_conflict(id, request.status));
        }

        let current = request.status;
        request.status = next;
        request.approver = Some(approver.to_string());
        request.comment = comment;
        request.updated_at = Utc::now();

        if !self.store.update_request(&request, current).await? {
            let status = self
                .store
                .get_request(id)
                .await?
                .map(|r| r.status.to_string())
                .unwrap_or_else(|| "missing".to_string());
            return Err(PortdError::state_conflict(id, status));
        }
        info!(id = %id, status = %next, approver, "Change request decided");
        Ok(request)
    }

    async fn apply(&self, request: &ChangeRequest) -> PortdResult<()> {
        let target = self.inventory.get(&request.device)?;
        match request.kind {
            RequestKind::Delete => {
                self.client
                    .delete_interface_config(target, &request.interface)
                    .await?
            }
            RequestKind::Config => {
                let config = request.config.as_ref().ok_or_else(|| {
                    PortdError::InvalidRequest("config request without a payload".to_string())
                })?;
                self.client
                    .apply_interface_config(target, &request.interface, config)
                    .await?
            }
        }
        Ok(())
    }

    // Failures here are audited, never returned.
    async fn refresh_after_apply(&self, request: &ChangeRequest, approver: &str) {
        self.cache.invalidate(&request.device).await;
        let problem = match self.cache.refresh(&request.device).await {
            Ok(refreshed) if refreshed.is_degraded() => Some(refreshed.warnings.join("; ")),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        if let Some(problem) = problem {
            warn!(device = %request.device, error = %problem, "Cache refresh after apply failed");
            if let Err(e) = self
                .auditor
                .record(
                    request
                        .audit(approver, AuditAction::CacheRefreshFailed)
                        .with_comment(Some(problem)),
                )
                .await
            {
                warn!(
                    device = %request.device,
                    error = %e,
                    "Failed to audit cache refresh failure"
                );
            }
        }
    }
}
