//! Change workflow against the mock device.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{harness, DEVICE};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use swport_netconf::mock::MockDevice;
use swport_netconf::{CommitOptions, Credentials, DeviceTarget, NetconfClient};
use swport_test::{ConfigFixture, InterfaceFixture};
use swport_types::{DesiredConfig, InterfaceRecord};
use swportd::store::Snapshot;
use swportd::{
    AuditAction, AuditEntry, AuditFilter, CacheTtls, ChangeRequest, Inventory, MemoryStore,
    PortdError, PortdResult, RequestFilter, RequestStatus, Services, Store,
};
use uuid::Uuid;

async fn actions(h: &common::Harness, request_id: Uuid) -> Vec<AuditAction> {
    let mut entries = h
        .services
        .store
        .list_audit(&AuditFilter {
            request_id: Some(request_id),
            ..Default::default()
        })
        .await
        .unwrap();
    entries.reverse();
    entries.into_iter().map(|e| e.action).collect()
}

#[tokio::test]
async fn test_approve_applies_and_audits() {
    let h = harness(MockDevice::new());
    let workflow = &h.services.workflow;

    let request = workflow
        .submit(DEVICE, "ge-0/0/5", DesiredConfig::access(10u32), "bob")
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(h.device.connects(), 0);

    let approved = workflow
        .approve(request.id, "alice", Some("go".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.approver.as_deref(), Some("alice"));

    let stored = workflow.get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Approved);
    assert_eq!(stored.comment.as_deref(), Some("go"));

    assert_eq!(
        actions(&h, request.id).await,
        vec![AuditAction::Approve, AuditAction::ApplySuccess]
    );
    assert_eq!(h.device.commits(), 1);
    assert!(!h.device.is_locked());

    let edits = h.device.edits();
    assert_eq!(edits.len(), 1);
    assert!(edits[0].contains("<name>ge-0/0/5</name>"));
    assert!(edits[0].contains("<members>10</members>"));
}

#[tokio::test]
async fn test_apply_failure_marks_request_failed() {
    let h = harness(MockDevice::new());
    h.device.fail_rpc("commit", "timeout");
    let workflow = &h.services.workflow;

    let request = workflow
        .submit(DEVICE, "ge-0/0/5", DesiredConfig::access(10u32), "bob")
        .await
        .unwrap();
    let err = workflow.approve(request.id, "alice", None).await.unwrap_err();
    assert!(matches!(err, PortdError::Protocol(_)));
    assert_eq!(err.to_string(), "timeout");

    let stored = workflow.get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Failed);
    assert_eq!(stored.comment.as_deref(), Some("timeout"));

    assert_eq!(
        actions(&h, request.id).await,
        vec![AuditAction::Approve, AuditAction::ApplyFailed]
    );
    let failed = h
        .services
        .store
        .list_audit(&AuditFilter {
            action: Some(AuditAction::ApplyFailed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failed[0].comment.as_deref(), Some("timeout"));

    assert_eq!(h.device.discards(), 1);
    assert!(!h.device.is_locked());
    assert!(!h.device.is_dirty());
}

#[tokio::test]
async fn test_decided_request_is_terminal() {
    let h = harness(MockDevice::new());
    let workflow = &h.services.workflow;

    let request = workflow
        .submit(DEVICE, "ge-0/0/5", DesiredConfig::access(10u32), "bob")
        .await
        .unwrap();
    workflow.approve(request.id, "alice", None).await.unwrap();
    let audit_before = actions(&h, request.id).await.len();

    let err = workflow.approve(request.id, "carol", None).await.unwrap_err();
    assert!(matches!(err, PortdError::StateConflict { .. }));
    let err = workflow.reject(request.id, "carol", None).await.unwrap_err();
    assert!(matches!(err, PortdError::StateConflict { .. }));

    assert_eq!(actions(&h, request.id).await.len(), audit_before);
    assert_eq!(h.device.commits(), 1);
}

#[tokio::test]
async fn test_reject_never_touches_device() {
    let h = harness(MockDevice::new());
    let workflow = &h.services.workflow;

    let request = workflow
        .submit(DEVICE, "ge-0/0/6", DesiredConfig::trunk([10u32, 20u32]), "bob")
        .await
        .unwrap();
    let rejected = workflow
        .reject(request.id, "alice", Some("wrong port".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(actions(&h, request.id).await, vec![AuditAction::Reject]);
    assert_eq!(h.device.connects(), 0);

    let err = workflow.approve(request.id, "alice", None).await.unwrap_err();
    assert!(matches!(err, PortdError::StateConflict { .. }));
}

#[tokio::test]
async fn test_unknown_request() {
    let h = harness(MockDevice::new());
    let err = h
        .services
        .workflow
        .approve(Uuid::new_v4(), "alice", None)
        .await
        .unwrap_err();
    assert!(matches!(err, PortdError::NotFound { kind: "request", .. }));
}

#[tokio::test]
async fn test_invalid_config_fails_before_device() {
    let h = harness(MockDevice::new());
    let workflow = &h.services.workflow;

    let mut config = DesiredConfig::access(10u32);
    config.vc_port = true;
    let request = workflow.submit(DEVICE, "ge-0/0/5", config, "bob").await.unwrap();

    let err = workflow.approve(request.id, "alice", None).await.unwrap_err();
    assert!(matches!(err, PortdError::Validation(_)));
    assert_eq!(h.device.connects(), 0);
    assert_eq!(
        workflow.get(request.id).await.unwrap().status,
        RequestStatus::Failed
    );
}

#[tokio::test]
async fn test_delete_request_removes_stanza() {
    let config = ConfigFixture::new()
        .interface(InterfaceFixture::new("ge-0/0/7").access("10"))
        .build();
    let h = harness(MockDevice::new().with_configuration(config));
    let workflow = &h.services.workflow;

    let request = workflow.submit_delete(DEVICE, "ge-0/0/7", "bob").await.unwrap();
    workflow.approve(request.id, "alice", None).await.unwrap();

    let edits = h.device.edits();
    assert_eq!(edits.len(), 1);
    assert!(edits[0].contains("operation=\"delete\""));
    assert!(edits[0].contains("ge-0/0/7"));
}

#[tokio::test]
async fn test_apply_invalidates_and_refreshes_cache() {
    let h = harness(MockDevice::new());
    let cache = &h.services.cache;
    cache.get_interfaces(DEVICE).await.unwrap();
    assert!(cache.get_interfaces(DEVICE).await.unwrap().is_empty());

    h.device.set_configuration(
        ConfigFixture::new()
            .interface(InterfaceFixture::new("ge-0/0/5").access("10"))
            .build(),
    );
    let request = h
        .services
        .workflow
        .submit(DEVICE, "ge-0/0/5", DesiredConfig::access(10u32), "bob")
        .await
        .unwrap();
    h.services
        .workflow
        .approve(request.id, "alice", None)
        .await
        .unwrap();

    let fetches = h.device.rpc_count("get-config");
    let records = cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "ge-0/0/5");
    // served from the refresh done after apply
    assert_eq!(h.device.rpc_count("get-config"), fetches);
}

#[tokio::test]
async fn test_degraded_refresh_is_audited_not_failed() {
    let h = harness(MockDevice::new());
    h.device
        .fail_rpc("get-interface-information", "interface query failed");
    let workflow = &h.services.workflow;

    let request = workflow
        .submit(DEVICE, "ge-0/0/5", DesiredConfig::access(10u32), "bob")
        .await
        .unwrap();
    let approved = workflow.approve(request.id, "alice", None).await.unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(
        actions(&h, request.id).await,
        vec![
            AuditAction::Approve,
            AuditAction::ApplySuccess,
            AuditAction::CacheRefreshFailed
        ]
    );
}

#[tokio::test]
async fn test_list_requests_by_status() {
    let h = harness(MockDevice::new());
    let workflow = &h.services.workflow;
    let first = workflow
        .submit(DEVICE, "ge-0/0/1", DesiredConfig::access(10u32), "bob")
        .await
        .unwrap();
    workflow
        .submit(DEVICE, "ge-0/0/2", DesiredConfig::access(10u32), "bob")
        .await
        .unwrap();
    workflow.reject(first.id, "alice", None).await.unwrap();

    let pending = workflow
        .list(&RequestFilter {
            status: Some(RequestStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].interface, "ge-0/0/2");
}

/// Store whose audit log rejects every write.
struct ReadOnlyAudit(MemoryStore);

#[async_trait]
impl Store for ReadOnlyAudit {
    async fn insert_request(&self, request: &ChangeRequest) -> PortdResult<()> {
        self.0.insert_request(request).await
    }

    async fn get_request(&self, id: Uuid) -> PortdResult<Option<ChangeRequest>> {
        self.0.get_request(id).await
    }

    async fn update_request(
        &self,
        request: &ChangeRequest,
        expected: RequestStatus,
    ) -> PortdResult<bool> {
        self.0.update_request(request, expected).await
    }

    async fn list_requests(&self, filter: &RequestFilter) -> PortdResult<Vec<ChangeRequest>> {
        self.0.list_requests(filter).await
    }

    async fn append_audit(&self, _entry: AuditEntry) -> PortdResult<()> {
        Err(PortdError::store("append_audit", "audit log is read-only"))
    }

    async fn list_audit(&self, filter: &AuditFilter) -> PortdResult<Vec<AuditEntry>> {
        self.0.list_audit(filter).await
    }

    async fn save_snapshot(
        &self,
        device: &str,
        interfaces: &[InterfaceRecord],
        refreshed_at: DateTime<Utc>,
    ) -> PortdResult<()> {
        self.0.save_snapshot(device, interfaces, refreshed_at).await
    }

    async fn snapshot(&self, device: &str) -> PortdResult<Option<Snapshot>> {
        self.0.snapshot(device).await
    }

    async fn upsert_desired(
        &self,
        device: &str,
        interface: &str,
        config: &DesiredConfig,
    ) -> PortdResult<()> {
        self.0.upsert_desired(device, interface, config).await
    }

    async fn desired(&self, device: &str, interface: &str) -> PortdResult<Option<DesiredConfig>> {
        self.0.desired(device, interface).await
    }
}

#[tokio::test]
async fn test_unaudited_approval_is_marked_failed() {
    let device = MockDevice::new();
    let mut inventory = Inventory::new();
    inventory.insert(DeviceTarget::new(
        DEVICE,
        "192.0.2.10",
        "netconf_automation",
        Credentials::Password("secret".to_string()),
    ));
    let services = Services::new(
        inventory,
        Arc::new(ReadOnlyAudit(MemoryStore::new())),
        NetconfClient::new(Arc::new(device.clone()), CommitOptions::default()),
        CacheTtls::default(),
    );

    let request = services
        .workflow
        .submit(DEVICE, "ge-0/0/5", DesiredConfig::access(10u32), "bob")
        .await
        .unwrap();
    let err = services
        .workflow
        .approve(request.id, "alice", None)
        .await
        .unwrap_err();
    assert!(matches!(err, PortdError::Store { .. }));
    assert_eq!(device.connects(), 0);

    let stored = services.workflow.get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Failed);
    assert_eq!(stored.approver.as_deref(), Some("alice"));
    assert_eq!(stored.comment, Some(err.to_string()));
}
