//! Scoped NETCONF session and the candidate-datastore transactions.
//!
//! A [`Session`] owns its channel and closes it on drop, so every exit path
//! (return, `?`, panic unwinding) tears the session down. Every method
//! blocks; async callers go through [`crate::NetconfClient`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use swport_types::{DesiredConfig, InterfaceChange, InterfaceName, ValidationError};
use tracing::{debug, info, warn};

use crate::codec::{self, build_delete_payload, build_edit_payload, unwrap_quotes};
use crate::error::{NetconfError, NetconfResult};
use crate::transport::{Connector, DeviceTarget, RpcChannel};
use crate::xml::XmlElement;

/// Default timeout while a commit is in flight; commits on a stack are slow.
pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(120);

/// How commits are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    /// Session timeout while the transaction runs.
    pub timeout: Duration,
    /// When set, commit with `confirmed` first and confirm after reading back.
    pub confirm_minutes: Option<u32>,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMIT_TIMEOUT,
            confirm_minutes: None,
        }
    }
}

/// Result of a bulk commit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitReport {
    pub ok: bool,
    /// Running configuration before the edit.
    pub pre: Option<String>,
    /// Running configuration after the commit.
    pub post: Option<String>,
    /// Candidate-vs-running diff that was committed.
    pub diff: Option<String>,
    pub error: Option<String>,
}

impl CommitReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Result of a rollback.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RollbackReport {
    pub ok: bool,
    pub diff: Option<String>,
    pub error: Option<String>,
}

impl RollbackReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            diff: None,
            error: Some(error.into()),
        }
    }
}

/// An open session to one device.
pub struct Session {
    device: String,
    channel: Box<dyn RpcChannel>,
    timeout: Duration,
    closed: bool,
}

impl Session {
    /// Opens a session through `connector`.
    pub fn open(connector: &dyn Connector, target: &DeviceTarget) -> NetconfResult<Self> {
        let channel = connector.connect(target)?;
        Ok(Self {
            device: target.name.clone(),
            channel,
            timeout: target.timeout,
            closed: false,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.channel.set_timeout(timeout);
    }

    /// Sends one RPC and maps error-severity `rpc-error`s to [`NetconfError::Rpc`].
    pub fn rpc(&mut self, body: &XmlElement) -> NetconfResult<XmlElement> {
        let operation = body.name().to_string();
        debug!(device = %self.device, rpc = %operation, "Sending RPC");
        let reply = self.channel.rpc(&body.to_xml())?;
        let tree = XmlElement::parse(&reply)?;
        match codec::rpc_error_message(&tree) {
            Some(message) => Err(NetconfError::rpc(operation, message)),
            None => Ok(tree),
        }
    }

    /// Reads the running configuration.
    ///
    /// With a filter, a device that rejects the subtree filter is asked
    /// again without one.
    pub fn get_config(&mut self, filter: Option<&XmlElement>) -> NetconfResult<XmlElement> {
        let unfiltered = XmlElement::new("get-config").with_child(
            XmlElement::new("source").with_child(XmlElement::new("running")),
        );
        let Some(filter) = filter else {
            return self.rpc(&unfiltered);
        };

        let filtered = unfiltered.clone().with_child(
            XmlElement::new("filter")
                .with_attr("type", "subtree")
                .with_child(filter.clone()),
        );
        match self.rpc(&filtered) {
            Err(NetconfError::Rpc { message, .. }) => {
                warn!(
                    device = %self.device,
                    error = %message,
                    "Subtree filter rejected, retrying unfiltered"
                );
                self.rpc(&unfiltered)
            }
            other => other,
        }
    }

    /// Terse interface status.
    pub fn get_interface_information(&mut self) -> NetconfResult<XmlElement> {
        self.rpc(&XmlElement::new("get-interface-information").with_child(XmlElement::new("terse")))
    }

    pub fn get_poe_information(&mut self) -> NetconfResult<XmlElement> {
        self.rpc(&XmlElement::new("get-poe-interface-information"))
    }

    /// Runs a CLI command and returns its structured reply.
    pub fn command(&mut self, command: &str) -> NetconfResult<XmlElement> {
        self.rpc(&XmlElement::new("command").with_text(command))
    }

    /// Runs a CLI command in text format and returns the output text.
    pub fn command_text(&mut self, command: &str) -> NetconfResult<String> {
        let reply = self.rpc(
            &XmlElement::new("command")
                .with_attr("format", "text")
                .with_text(command),
        )?;
        Ok(output_text(&reply))
    }

    pub fn lock(&mut self) -> NetconfResult<()> {
        self.rpc(&XmlElement::new("lock").with_child(candidate_target()))
            .map(|_| ())
    }

    pub fn unlock(&mut self) -> NetconfResult<()> {
        self.rpc(&XmlElement::new("unlock").with_child(candidate_target()))
            .map(|_| ())
    }

    pub fn discard_changes(&mut self) -> NetconfResult<()> {
        self.rpc(&XmlElement::new("discard-changes")).map(|_| ())
    }

    /// Merges a `<config>` payload into the candidate.
    pub fn edit_config(&mut self, payload: &XmlElement) -> NetconfResult<()> {
        self.rpc(
            &XmlElement::new("edit-config")
                .with_child(candidate_target())
                .with_child(XmlElement::new("default-operation").with_text("merge"))
                .with_child(payload.clone()),
        )
        .map(|_| ())
    }

    /// Issues a commit, optionally `confirmed` with an automatic revert timer.
    pub fn commit(&mut self, confirm_minutes: Option<u32>) -> NetconfResult<()> {
        let mut commit = XmlElement::new("commit");
        if let Some(minutes) = confirm_minutes {
            commit.push(XmlElement::new("confirmed"));
            commit.push(XmlElement::new("confirm-timeout").with_text(minutes.to_string()));
        }
        self.rpc(&commit).map(|_| ())
    }

    /// Commits the candidate. With commit-confirm, the running config is
    /// read back after the confirmed commit before confirming it.
    pub fn commit_changes(&mut self, confirm_minutes: Option<u32>) -> NetconfResult<()> {
        match confirm_minutes {
            Some(minutes) => {
                self.commit(Some(minutes))?;
                self.get_config(None)?;
                self.commit(None)
            }
            None => self.commit(None),
        }
    }

    /// Text diff of the candidate against the active configuration.
    pub fn candidate_diff(&mut self) -> NetconfResult<String> {
        let reply = self.rpc(
            &XmlElement::new("get-configuration")
                .with_attr("compare", "rollback")
                .with_attr("rollback", "0")
                .with_attr("format", "text"),
        )?;
        Ok(output_text(&reply))
    }

    /// Loads rollback checkpoint `index` into the candidate.
    pub fn load_rollback(&mut self, index: u32) -> NetconfResult<()> {
        self.rpc(&XmlElement::new("load-configuration").with_attr("rollback", index.to_string()))
            .map(|_| ())
    }

    /// Runs `f` inside a locked candidate.
    ///
    /// On failure the candidate is discarded. The lock is released on every
    /// path once acquired. Secondary failures are logged, the original error
    /// is returned.
    pub fn with_candidate<T>(
        &mut self,
        f: impl FnOnce(&mut Session) -> NetconfResult<T>,
    ) -> NetconfResult<T> {
        self.lock()?;
        let result = f(self);
        if let Err(e) = &result {
            debug!(device = %self.device, error = %e, "Discarding candidate changes");
            if let Err(discard) = self.discard_changes() {
                warn!(device = %self.device, error = %discard, "Discard after failure also failed");
            }
        }
        if let Err(e) = self.unlock() {
            warn!(device = %self.device, error = %e, "Failed to release candidate lock");
        }
        result
    }

    /// Runs `f` with the session timeout raised to at least `timeout`.
    fn with_extended_timeout<T>(
        &mut self,
        timeout: Duration,
        f: impl FnOnce(&mut Session) -> T,
    ) -> T {
        let previous = self.timeout;
        self.set_timeout(previous.max(timeout));
        let result = f(self);
        self.set_timeout(previous);
        result
    }

    /// Validates, then merges one interface's desired config and commits.
    pub fn apply_interface_config(
        &mut self,
        interface: &str,
        desired: &DesiredConfig,
        options: CommitOptions,
    ) -> NetconfResult<()> {
        desired.validate_for(interface)?;
        let payload = build_edit_payload(interface, desired)?;

        self.with_extended_timeout(options.timeout, |session| {
            session.with_candidate(|s| {
                s.edit_config(&payload)?;
                s.commit_changes(options.confirm_minutes)
            })
        })?;
        info!(device = %self.device, interface = %interface, "Interface configuration committed");
        Ok(())
    }

    /// Removes an interface stanza and commits.
    pub fn delete_interface_config(
        &mut self,
        interface: &str,
        options: CommitOptions,
    ) -> NetconfResult<()> {
        InterfaceName::parse(interface)
            .map_err(|_| ValidationError::InvalidInterface(interface.to_string()))?;
        let payload = build_delete_payload(interface);

        self.with_extended_timeout(options.timeout, |session| {
            session.with_candidate(|s| {
                s.edit_config(&payload)?;
                s.commit_changes(options.confirm_minutes)
            })
        })?;
        info!(device = %self.device, interface = %interface, "Interface configuration deleted");
        Ok(())
    }

    /// Applies several interface edits in one locked transaction.
    ///
    /// Validation errors are returned before any RPC. Once the session is
    /// in use every failure is reported as a failed [`CommitReport`] and the
    /// candidate is left unlocked and clean.
    pub fn commit_bulk(
        &mut self,
        changes: &[InterfaceChange],
        options: CommitOptions,
    ) -> NetconfResult<CommitReport> {
        let payloads = changes
            .iter()
            .map(|change| {
                change.config.validate_for(&change.interface)?;
                build_edit_payload(&change.interface, &change.config)
            })
            .collect::<NetconfResult<Vec<_>>>()?;

        let outcome = self.with_extended_timeout(options.timeout, |session| {
            session.with_candidate(|s| {
                let pre = configuration_text(&s.get_config(None)?);
                for payload in &payloads {
                    s.edit_config(payload)?;
                }
                let diff = s.candidate_diff()?;
                s.commit_changes(options.confirm_minutes)?;
                let post = configuration_text(&s.get_config(None)?);
                Ok((pre, diff, post))
            })
        });

        Ok(match outcome {
            Ok((pre, diff, post)) => {
                info!(device = %self.device, changes = changes.len(), "Bulk commit succeeded");
                CommitReport {
                    ok: true,
                    pre: Some(pre),
                    post: Some(post),
                    diff: Some(diff),
                    error: None,
                }
            }
            Err(e) => {
                warn!(device = %self.device, error = %e, "Bulk commit failed");
                CommitReport::failed(e.to_string())
            }
        })
    }

    /// Loads rollback checkpoint `index`, diffs it and commits.
    pub fn rollback(&mut self, index: u32, options: CommitOptions) -> RollbackReport {
        let outcome = self.with_extended_timeout(options.timeout, |session| {
            session.with_candidate(|s| {
                s.load_rollback(index)?;
                let diff = s.candidate_diff()?;
                s.commit_changes(options.confirm_minutes)?;
                Ok(diff)
            })
        });

        match outcome {
            Ok(diff) => {
                info!(device = %self.device, index, "Rollback committed");
                RollbackReport {
                    ok: true,
                    diff: Some(diff),
                    error: None,
                }
            }
            Err(e) => {
                warn!(device = %self.device, index, error = %e, "Rollback failed");
                RollbackReport::failed(e.to_string())
            }
        }
    }

    /// Raw `show system commit` text.
    pub fn rollback_list(&mut self) -> NetconfResult<String> {
        self.command_text("show system commit")
    }

    /// Diff between checkpoint `index` and the active configuration.
    pub fn rollback_diff(&mut self, index: u32) -> NetconfResult<String> {
        let text = self.command_text(&format!("show system rollback {} compare 0", index))?;
        Ok(unwrap_quotes(&text).to_string())
    }

    /// Closes the session, reporting close-session failures.
    pub fn close(mut self) -> NetconfResult<()> {
        self.closed = true;
        self.channel.close()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.channel.close() {
            debug!(device = %self.device, error = %e, "close-session failed");
        }
    }
}

fn candidate_target() -> XmlElement {
    XmlElement::new("target").with_child(XmlElement::new("candidate"))
}

/// Text payload of a text-format reply.
fn output_text(reply: &XmlElement) -> String {
    ["output", "configuration-output", "configuration-information"]
        .iter()
        .find_map(|name| reply.descendants(name).into_iter().next())
        .map(|e| e.text().to_string())
        .unwrap_or_else(|| reply.text().to_string())
}

/// The `configuration` subtree of a get-config reply, serialized.
fn configuration_text(reply: &XmlElement) -> String {
    reply
        .descendants("configuration")
        .into_iter()
        .next()
        .unwrap_or(reply)
        .to_xml()
}
