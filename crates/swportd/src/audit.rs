//! Append-only audit trail.

use crate::error::PortdResult;
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Approve,
    Reject,
    ApplySuccess,
    ApplyFailed,
    CacheRefreshFailed,
    Commit,
    CommitFailed,
    Rollback,
    RollbackFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::ApplySuccess => "apply_success",
            AuditAction::ApplyFailed => "apply_failed",
            AuditAction::CacheRefreshFailed => "cache_refresh_failed",
            AuditAction::Commit => "commit",
            AuditAction::CommitFailed => "commit_failed",
            AuditAction::Rollback => "rollback",
            AuditAction::RollbackFailed => "rollback_failed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record. Timestamped when built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: AuditAction,
    pub device: String,
    pub interface: Option<String>,
    pub request_id: Option<Uuid>,
    pub comment: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor: impl Into<String>, action: AuditAction, device: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.into(),
            action,
            device: device.into(),
            interface: None,
            request_id: None,
            comment: None,
            payload: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_request(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Sets the free-text comment; `None` leaves it unset.
    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Writes audit entries to the store and mirrors them to the log.
#[derive(Clone)]
pub struct Auditor {
    store: Arc<dyn Store>,
}

impl Auditor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: AuditEntry) -> PortdResult<()> {
        info!(
            action = %entry.action,
            actor = %entry.actor,
            device = %entry.device,
            interface = entry.interface.as_deref().unwrap_or("-"),
            "audit"
        );
        self.store.append_audit(entry).await
    }
}
