//! Persistence seam for change requests, audit entries, interface snapshots
//! and desired state.
//!
//! The daemon only needs keyed get, compare-and-swap update and ordered
//! filtered listing. `MemoryStore` keeps everything in process memory.

use crate::audit::{AuditAction, AuditEntry};
use crate::error::PortdResult;
use crate::workflow::{ChangeRequest, RequestStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use swport_types::{DesiredConfig, InterfaceRecord};
use uuid::Uuid;

/// Filter for change-request listings. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub device: Option<String>,
    pub status: Option<RequestStatus>,
    pub limit: Option<usize>,
}

/// Filter for audit listings. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub device: Option<String>,
    pub action: Option<AuditAction>,
    pub request_id: Option<Uuid>,
    pub limit: Option<usize>,
}

/// Last reconciled interface list of a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub interfaces: Vec<InterfaceRecord>,
    pub refreshed_at: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_request(&self, request: &ChangeRequest) -> PortdResult<()>;

    async fn get_request(&self, id: Uuid) -> PortdResult<Option<ChangeRequest>>;

    /// Replaces the stored request only if its status is still `expected`.
    ///
    /// Returns false when the stored status differs or the request is gone.
    async fn update_request(
        &self,
        request: &ChangeRequest,
        expected: RequestStatus,
    ) -> PortdResult<bool>;

    /// Newest first.
    async fn list_requests(&self, filter: &RequestFilter) -> PortdResult<Vec<ChangeRequest>>;

    async fn append_audit(&self, entry: AuditEntry) -> PortdResult<()>;

    /// Newest first.
    async fn list_audit(&self, filter: &AuditFilter) -> PortdResult<Vec<AuditEntry>>;

    async fn save_snapshot(
        &self,
        device: &str,
        interfaces: &[InterfaceRecord],
        refreshed_at: DateTime<Utc>,
    ) -> PortdResult<()>;

    async fn snapshot(&self, device: &str) -> PortdResult<Option<Snapshot>>;

    async fn upsert_desired(
        &self,
        device: &str,
        interface: &str,
        config: &DesiredConfig,
    ) -> PortdResult<()>;

    async fn desired(&self, device: &str, interface: &str) -> PortdResult<Option<DesiredConfig>>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    // insertion order is creation order
    requests: RwLock<Vec<ChangeRequest>>,
    audit: RwLock<Vec<AuditEntry>>,
    snapshots: RwLock<HashMap<String, Snapshot>>,
    desired: RwLock<HashMap<(String, String), DesiredConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn take_limit<T>(items: impl Iterator<Item = T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(n) => items.take(n).collect(),
        None => items.collect(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_request(&self, request: &ChangeRequest) -> PortdResult<()> {
        self.requests.write().push(request.clone());
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> PortdResult<Option<ChangeRequest>> {
        Ok(self.requests.read().iter().find(|r| r.id == id).cloned())
    }

    async fn update_request(
        &self,
        request: &ChangeRequest,
        expected: RequestStatus,
    ) -> PortdResult<bool> {
        let mut requests = self.requests.write();
        match requests.iter_mut().find(|r| r.id == request.id) {
            Some(stored) if stored.status == expected => {
                *stored = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_requests(&self, filter: &RequestFilter) -> PortdResult<Vec<ChangeRequest>> {
        let requests = self.requests.read();
        let matching = requests
            .iter()
            .rev()
            .filter(|r| filter.device.as_deref().map_or(true, |d| r.device == d))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned();
        Ok(take_limit(matching, filter.limit))
    }

    async fn append_audit(&self, entry: AuditEntry) -> PortdResult<()> {
        self.audit.write().push(entry);
        Ok(())
    }

    async fn list_audit(&self, filter: &AuditFilter) -> PortdResult<Vec<AuditEntry>> {
        let audit = self.audit.read();
        let matching = audit
            .iter()
            .rev()
            .filter(|e| filter.device.as_deref().map_or(true, |d| e.device == d))
            .filter(|e| filter.action.map_or(true, |a| e.action == a))
            .filter(|e| filter.request_id.map_or(true, |id| e.request_id == Some(id)))
            .cloned();
        Ok(take_limit(matching, filter.limit))
    }

    async fn save_snapshot(
        &self,
        device: &str,
        interfaces: &[InterfaceRecord],
        refreshed_at: DateTime<Utc>,
    ) -> PortdResult<()> {
        self.snapshots.write().insert(
            device.to_string(),
            Snapshot {
                interfaces: interfaces.to_vec(),
                refreshed_at,
            },
        );
        Ok(())
    }

    async fn snapshot(&self, device: &str) -> PortdResult<Option<Snapshot>> {
        Ok(self.snapshots.read().get(device).cloned())
    }

    async fn upsert_desired(
        &self,
        device: &str,
        interface: &str,
        config: &DesiredConfig,
    ) -> PortdResult<()> {
        self.desired
            .write()
            .insert((device.to_string(), interface.to_string()), config.clone());
        Ok(())
    }

    async fn desired(&self, device: &str, interface: &str) -> PortdResult<Option<DesiredConfig>> {
        Ok(self
            .desired
            .read()
            .get(&(device.to_string(), interface.to_string()))
            .cloned())
    }
}
