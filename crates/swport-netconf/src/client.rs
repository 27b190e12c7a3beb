//! Async facade over blocking sessions.
//!
//! Each call opens its own session on the blocking pool, runs, and closes
//! it. Dropping the returned future does not abort the worker, so a locked
//! candidate is always unlocked by the session itself.

use std::collections::HashMap;
use std::sync::Arc;
use swport_types::{
    DesiredConfig, InterfaceChange, InterfaceName, InterfaceRecord, ValidationError, VlanEntry,
};
use tracing::{instrument, warn};

use crate::codec::{self, CommitEntry, FabricPort, OperStatus};
use crate::error::{NetconfError, NetconfResult};
use crate::session::{CommitOptions, CommitReport, RollbackReport, Session};
use crate::ssh::SshConnector;
use crate::transport::{Connector, DeviceTarget};
use crate::xml::XmlElement;

/// A value produced despite non-fatal failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partial<T> {
    pub value: T,
    /// One entry per degraded source.
    pub warnings: Vec<String>,
}

impl<T> Partial<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Live interface status plus the optional PoE enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationalView {
    pub status: HashMap<String, OperStatus>,
    pub poe: HashMap<String, bool>,
}

/// Shared NETCONF client. Cheap to clone.
#[derive(Clone)]
pub struct NetconfClient {
    connector: Arc<dyn Connector>,
    options: CommitOptions,
}

impl NetconfClient {
    pub fn new(connector: Arc<dyn Connector>, options: CommitOptions) -> Self {
        Self { connector, options }
    }

    /// Client over SSH.
    pub fn ssh(options: CommitOptions) -> Self {
        Self::new(Arc::new(SshConnector::new()), options)
    }

    pub fn commit_options(&self) -> CommitOptions {
        self.options
    }

    async fn run<T, F>(
        &self,
        target: &DeviceTarget,
        operation: &'static str,
        f: F,
    ) -> NetconfResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> NetconfResult<T> + Send + 'static,
    {
        let connector = Arc::clone(&self.connector);
        let target = target.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = Session::open(connector.as_ref(), &target)?;
            f(&mut session)
        })
        .await
        .map_err(|e| NetconfError::Internal(format!("{} worker failed: {}", operation, e)))?
    }

    /// Filtered running configuration (interfaces, VLANs, PoE, virtual-chassis).
    pub async fn get_configuration(&self, target: &DeviceTarget) -> NetconfResult<XmlElement> {
        self.run(target, "get-config", |s| {
            s.get_config(Some(&codec::configuration_filter()))
        })
        .await
    }

    /// Declared interface records.
    pub async fn get_declared(&self, target: &DeviceTarget) -> NetconfResult<Vec<InterfaceRecord>> {
        let tree = self.get_configuration(target).await?;
        Ok(codec::parse_configuration(&tree))
    }

    /// Interface status; a failed PoE query degrades to a warning.
    #[instrument(skip(self, target), fields(device = %target.name))]
    pub async fn get_operational(
        &self,
        target: &DeviceTarget,
    ) -> NetconfResult<Partial<OperationalView>> {
        self.run(target, "get-interface-information", |s| {
            let status = codec::parse_operational(&s.get_interface_information()?);
            let mut view = Partial::complete(OperationalView {
                status,
                poe: HashMap::new(),
            });
            match s.get_poe_information() {
                Ok(tree) => view.value.poe = codec::parse_poe(&tree),
                Err(e) => {
                    warn!(device = %s.device(), error = %e, "PoE query failed");
                    view.warnings.push(format!("PoE query failed: {}", e));
                }
            }
            Ok(view)
        })
        .await
    }

    /// Stack-fabric ports from the virtual-chassis port view.
    pub async fn get_fabric_ports(&self, target: &DeviceTarget) -> NetconfResult<Vec<FabricPort>> {
        self.run(target, "command", |s| {
            Ok(codec::parse_fabric_ports(
                &s.command("show virtual-chassis vc-port")?,
            ))
        })
        .await
    }

    /// VLAN catalogue.
    pub async fn get_vlans(&self, target: &DeviceTarget) -> NetconfResult<Vec<VlanEntry>> {
        let tree = self.get_configuration(target).await?;
        Ok(codec::parse_vlans(&tree))
    }

    /// Applies several interface edits in one transaction.
    ///
    /// Returns `Err` only when nothing reached the device (validation or
    /// connect failure); later failures come back as a failed report.
    #[instrument(
        skip(self, target, changes),
        fields(device = %target.name, changes = changes.len())
    )]
    pub async fn commit_bulk(
        &self,
        target: &DeviceTarget,
        changes: Vec<InterfaceChange>,
    ) -> NetconfResult<CommitReport> {
        for change in &changes {
            change.config.validate_for(&change.interface)?;
        }
        let options = self.options;
        self.run(target, "commit", move |s| s.commit_bulk(&changes, options))
            .await
    }

    /// Rolls back to checkpoint `index` (0 = current, higher = older).
    #[instrument(skip(self, target), fields(device = %target.name))]
    pub async fn rollback(
        &self,
        target: &DeviceTarget,
        index: u32,
    ) -> NetconfResult<RollbackReport> {
        let options = self.options;
        self.run(target, "rollback", move |s| Ok(s.rollback(index, options)))
            .await
    }

    /// Validates, then merges and commits one interface's desired config.
    #[instrument(skip(self, target, desired), fields(device = %target.name))]
    pub async fn apply_interface_config(
        &self,
        target: &DeviceTarget,
        interface: &str,
        desired: &DesiredConfig,
    ) -> NetconfResult<()> {
        desired.validate_for(interface)?;
        let options = self.options;
        let interface = interface.to_string();
        let desired = desired.clone();
        self.run(target, "commit", move |s| {
            s.apply_interface_config(&interface, &desired, options)
        })
        .await
    }

    /// Removes one interface's configuration stanza.
    #[instrument(skip(self, target), fields(device = %target.name))]
    pub async fn delete_interface_config(
        &self,
        target: &DeviceTarget,
        interface: &str,
    ) -> NetconfResult<()> {
        InterfaceName::parse(interface)
            .map_err(|_| ValidationError::InvalidInterface(interface.to_string()))?;
        let options = self.options;
        let interface = interface.to_string();
        self.run(target, "commit", move |s| {
            s.delete_interface_config(&interface, options)
        })
        .await
    }

    /// Raw commit-history text.
    pub async fn get_rollback_list(&self, target: &DeviceTarget) -> NetconfResult<String> {
        self.run(target, "command", |s| s.rollback_list()).await
    }

    /// Commit history, parsed.
    pub async fn get_commit_history(
        &self,
        target: &DeviceTarget,
    ) -> NetconfResult<Vec<CommitEntry>> {
        let text = self.get_rollback_list(target).await?;
        Ok(codec::parse_commit_history(&text))
    }

    /// Plain-text diff between checkpoint `index` and the active configuration.
    pub async fn get_rollback_diff(
        &self,
        target: &DeviceTarget,
        index: u32,
    ) -> NetconfResult<String> {
        self.run(target, "command", move |s| s.rollback_diff(index))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDevice;
    use crate::transport::Credentials;
    use pretty_assertions::assert_eq;
    use swport_types::VlanRef;

    const CONFIG: &str = "<configuration><interfaces>\
        <interface><name>ge-0/0/1</name><unit><name>0</name><family><ethernet-switching>\
        <port-mode>trunk</port-mode><vlan><members>10</members><members>20</members></vlan>\
        </ethernet-switching></family></unit></interface>\
        </interfaces><vlans><vlan><name>USERS</name><vlan-id>10</vlan-id></vlan></vlans></configuration>";

    fn target() -> DeviceTarget {
        DeviceTarget::new("sw1", "192.0.2.10", "netconf", Credentials::Password("pw".to_string()))
    }

    fn client(device: &MockDevice) -> NetconfClient {
        NetconfClient::new(Arc::new(device.clone()), CommitOptions::default())
    }

    #[tokio::test]
    async fn test_get_declared_parses_configuration() {
        let device = MockDevice::new().with_configuration(CONFIG);
        let records = client(&device).get_declared(&target()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].trunk_vlans, Some(vec![VlanRef::Id(10), VlanRef::Id(20)]));
        assert_eq!(device.connects(), 1);
    }

    #[tokio::test]
    async fn test_filter_rejection_falls_back_to_unfiltered() {
        let device = MockDevice::new().with_configuration(CONFIG);
        device.reject_filters();
        let vlans = client(&device).get_vlans(&target()).await.unwrap();
        assert_eq!(vlans.len(), 1);
        assert_eq!(device.rpc_count("get-config"), 2);
    }

    #[tokio::test]
    async fn test_poe_failure_is_a_warning() {
        let device = MockDevice::new().with_operational(
            "<interface-information><physical-interface><name>ge-0/0/1</name>\
             <admin-status>up</admin-status><oper-status>up</oper-status>\
             </physical-interface></interface-information>",
        );
        device.fail_rpc("get-poe-interface-information", "not supported");

        let view = client(&device).get_operational(&target()).await.unwrap();
        assert!(view.is_degraded());
        assert!(view.value.poe.is_empty());
        assert!(view.value.status["ge-0/0/1"].oper_up);
    }

    #[tokio::test]
    async fn test_commit_bulk_success() {
        let device = MockDevice::new()
            .with_configuration(CONFIG)
            .with_candidate_diff("[edit interfaces ge-0/0/5]\n+   description desk;");
        let changes = vec![
            InterfaceChange::new("ge-0/0/5", DesiredConfig::access(10u32)),
            InterfaceChange::new("ge-0/0/6", DesiredConfig::trunk([10u32, 20])),
        ];

        let report = client(&device).commit_bulk(&target(), changes).await.unwrap();
        assert!(report.ok);
        assert!(report.pre.as_deref().unwrap_or_default().starts_with("<configuration>"));
        assert!(report.post.is_some());
        assert_eq!(
            report.diff.as_deref(),
            Some("[edit interfaces ge-0/0/5]\n+   description desk;")
        );
        assert_eq!(device.edits().len(), 2);
        assert_eq!(device.commits(), 1);
        assert!(!device.is_locked());
        assert!(!device.is_dirty());
    }

    #[tokio::test]
    async fn test_commit_bulk_failure_discards_and_unlocks() {
        let device = MockDevice::new().with_configuration(CONFIG);
        device.fail_rpc("commit", "commit failed: (statements constraint check failed)");

        let report = client(&device)
            .commit_bulk(
                &target(),
                vec![InterfaceChange::new("ge-0/0/5", DesiredConfig::access(10u32))],
            )
            .await
            .unwrap();

        assert!(!report.ok);
        assert_eq!(
            report.error.as_deref(),
            Some("commit failed: (statements constraint check failed)")
        );
        assert_eq!(device.discards(), 1);
        assert!(!device.is_locked());
        assert!(!device.is_dirty());

        // A later transaction can take the lock.
        device.clear_failure("commit");
        let mut session = Session::open(&device, &target()).unwrap();
        assert!(session.lock().is_ok());
        assert!(session.unlock().is_ok());
    }

    #[tokio::test]
    async fn test_commit_bulk_lock_held_elsewhere() {
        let device = MockDevice::new().with_configuration(CONFIG);
        let mut other = Session::open(&device, &target()).unwrap();
        other.lock().unwrap();

        let report = client(&device)
            .commit_bulk(
                &target(),
                vec![InterfaceChange::new("ge-0/0/5", DesiredConfig::access(10u32))],
            )
            .await
            .unwrap();
        assert!(!report.ok);
        assert_eq!(device.discards(), 0, "no discard without holding the lock");
        assert!(device.is_locked(), "foreign lock untouched");
        other.unlock().unwrap();
    }

    #[tokio::test]
    async fn test_validation_fails_before_connect() {
        let device = MockDevice::new();
        let mut fabric = DesiredConfig::access(10u32);
        fabric.vc_port = true;

        let err = client(&device)
            .apply_interface_config(&target(), "xe-0/2/0", &fabric)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = client(&device)
            .commit_bulk(
                &target(),
                vec![InterfaceChange::new("ge-0/0/1", DesiredConfig::access(0u32))],
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(device.connects(), 0);
    }

    #[tokio::test]
    async fn test_apply_interface_config_rpc_sequence() {
        let device = MockDevice::new();
        client(&device)
            .apply_interface_config(&target(), "ge-0/0/5", &DesiredConfig::access(10u32))
            .await
            .unwrap();
        assert_eq!(
            device.rpc_log(),
            vec!["lock", "edit-config", "commit", "unlock", "close-session"]
        );
    }

    #[tokio::test]
    async fn test_apply_error_message_is_verbatim() {
        let device = MockDevice::new();
        device.fail_rpc("commit", "timeout");
        let err = client(&device)
            .apply_interface_config(&target(), "ge-0/0/5", &DesiredConfig::access(10u32))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "timeout");
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_commit_confirmed_sequence() {
        let device = MockDevice::new();
        let client = NetconfClient::new(
            Arc::new(device.clone()),
            CommitOptions {
                confirm_minutes: Some(5),
                ..Default::default()
            },
        );
        client
            .apply_interface_config(&target(), "ge-0/0/5", &DesiredConfig::access(10u32))
            .await
            .unwrap();
        assert_eq!(
            device.rpc_log(),
            vec!["lock", "edit-config", "commit", "get-config", "commit", "unlock", "close-session"]
        );
    }

    #[tokio::test]
    async fn test_delete_interface_config() {
        let device = MockDevice::new();
        client(&device)
            .delete_interface_config(&target(), "ge-0/0/9")
            .await
            .unwrap();
        assert_eq!(device.edits().len(), 1);
        assert!(device.edits()[0].contains("operation=\"delete\""));

        let err = client(&device)
            .delete_interface_config(&target(), "vme")
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_rollback_and_history() {
        let device = MockDevice::new()
            .with_candidate_diff("[edit vlans]\n-  VOICE { vlan-id 20; }")
            .with_commit_history("0   2024-05-02 10:12:03 UTC by admin via netconf\n")
            .with_rollback_diff(2, "\"[edit]\n+ vlans { }\"");
        let client = client(&device);

        let report = client.rollback(&target(), 1).await.unwrap();
        assert!(report.ok);
        assert_eq!(report.diff.as_deref(), Some("[edit vlans]\n-  VOICE { vlan-id 20; }"));
        assert!(!device.is_locked());

        let history = client.get_commit_history(&target()).await.unwrap();
        assert_eq!(history[0].user, "admin");

        let diff = client.get_rollback_diff(&target(), 2).await.unwrap();
        assert_eq!(diff, "[edit]\n+ vlans { }");
    }

    #[tokio::test]
    async fn test_rollback_failure_discards() {
        let device = MockDevice::new();
        device.fail_rpc("load-configuration", "rollback file not found");
        let report = client(&device).rollback(&target(), 49).await.unwrap();
        assert!(!report.ok);
        assert_eq!(report.error.as_deref(), Some("rollback file not found"));
        assert_eq!(device.discards(), 1);
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let device = MockDevice::new();
        device.refuse_connections("Connection refused");
        let err = client(&device).get_fabric_ports(&target()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to connect to 192.0.2.10: Connection refused");
    }
}
