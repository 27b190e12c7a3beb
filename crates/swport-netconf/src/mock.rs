//! In-process NETCONF device for tests.
//!
//! Answers RPCs from canned XML, tracks the candidate lock and dirty state,
//! and lets tests inject `rpc-error`s and latency per RPC. A session that
//! closes without unlocking keeps the lock, so tests catch missing unlocks.

use parking_lot::Mutex;
use quick_xml::escape::escape;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{NetconfError, NetconfResult};
use crate::transport::{Connector, DeviceTarget, RpcChannel};
use crate::xml::XmlElement;

#[derive(Default)]
struct MockState {
    configuration: String,
    operational: String,
    poe: Option<String>,
    fabric: String,
    commit_history: String,
    rollback_diffs: HashMap<u32, String>,
    candidate_diff: String,
    reject_filters: bool,
    refuse_connect: Option<String>,
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,

    locked_by: Option<u64>,
    dirty: bool,
    next_session: u64,
    connects: usize,
    log: Vec<String>,
    edits: Vec<String>,
    commits: usize,
    discards: usize,
}

/// A simulated device. Clones share state.
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// A device with an empty configuration and no interfaces.
    pub fn new() -> Self {
        let device = Self::default();
        {
            let mut state = device.state.lock();
            state.configuration = "<configuration/>".to_string();
            state.operational = "<interface-information/>".to_string();
            state.poe = Some("<poe-interface-information/>".to_string());
            state.fabric = "<virtual-chassis-port-information/>".to_string();
        }
        device
    }

    /// Sets the `<configuration>` document returned by get-config.
    pub fn with_configuration(self, xml: impl Into<String>) -> Self {
        self.set_configuration(xml);
        self
    }

    /// Sets the interface-information document.
    pub fn with_operational(self, xml: impl Into<String>) -> Self {
        self.state.lock().operational = xml.into();
        self
    }

    /// Sets the PoE document.
    pub fn with_poe(self, xml: impl Into<String>) -> Self {
        self.state.lock().poe = Some(xml.into());
        self
    }

    /// Sets the virtual-chassis port document.
    pub fn with_fabric(self, xml: impl Into<String>) -> Self {
        self.state.lock().fabric = xml.into();
        self
    }

    pub fn with_commit_history(self, text: impl Into<String>) -> Self {
        self.state.lock().commit_history = text.into();
        self
    }

    pub fn with_rollback_diff(self, index: u32, text: impl Into<String>) -> Self {
        self.state.lock().rollback_diffs.insert(index, text.into());
        self
    }

    pub fn with_candidate_diff(self, text: impl Into<String>) -> Self {
        self.state.lock().candidate_diff = text.into();
        self
    }

    pub fn set_configuration(&self, xml: impl Into<String>) {
        self.state.lock().configuration = xml.into();
    }

    /// Answers every `rpc` with an error-severity rpc-error carrying `message`.
    pub fn fail_rpc(&self, rpc: &str, message: &str) {
        self.state
            .lock()
            .failures
            .insert(rpc.to_string(), message.to_string());
    }

    pub fn clear_failure(&self, rpc: &str) {
        self.state.lock().failures.remove(rpc);
    }

    /// Sleeps for `delay` before answering `rpc`.
    pub fn set_delay(&self, rpc: &str, delay: Duration) {
        self.state.lock().delays.insert(rpc.to_string(), delay);
    }

    /// Rejects get-config requests that carry a subtree filter.
    pub fn reject_filters(&self) {
        self.state.lock().reject_filters = true;
    }

    /// Fails every connection attempt with `message`.
    pub fn refuse_connections(&self, message: &str) {
        self.state.lock().refuse_connect = Some(message.to_string());
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// RPC names in arrival order. Commands are logged as `command:<text>`.
    pub fn rpc_log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn rpc_count(&self, rpc: &str) -> usize {
        self.state.lock().log.iter().filter(|r| *r == rpc).count()
    }

    /// Payloads of every edit-config, serialized.
    pub fn edits(&self) -> Vec<String> {
        self.state.lock().edits.clone()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    pub fn discards(&self) -> usize {
        self.state.lock().discards
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locked_by.is_some()
    }

    /// True when the candidate holds uncommitted edits.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    fn handle(&self, session: u64, body: &str) -> NetconfResult<String> {
        let request = XmlElement::parse(body)?;
        let name = request.name().to_string();

        let delay = {
            let mut state = self.state.lock();
            let entry = if name == "command" {
                format!("command:{}", request.text())
            } else {
                name.clone()
            };
            state.log.push(entry);
            state.delays.get(&name).copied()
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut state = self.state.lock();
        if let Some(message) = state.failures.get(&name) {
            return Ok(rpc_error(message));
        }

        let reply = match name.as_str() {
            "get-config" => {
                if state.reject_filters && request.child("filter").is_some() {
                    return Ok(rpc_error("syntax error, expecting <source>"));
                }
                format!("<data>{}</data>", state.configuration)
            }
            "get-interface-information" => state.operational.clone(),
            "get-poe-interface-information" => match &state.poe {
                Some(xml) => xml.clone(),
                None => return Ok(rpc_error("PoE is not supported on this platform")),
            },
            "command" => {
                let command = request.text();
                if command == "show virtual-chassis vc-port" {
                    state.fabric.clone()
                } else if command == "show system commit" {
                    output(&state.commit_history)
                } else if let Some(index) = command
                    .strip_prefix("show system rollback ")
                    .and_then(|rest| rest.strip_suffix(" compare 0"))
                    .and_then(|n| n.parse::<u32>().ok())
                {
                    match state.rollback_diffs.get(&index) {
                        Some(diff) => output(diff),
                        None => return Ok(rpc_error("rollback file not found")),
                    }
                } else {
                    return Ok(rpc_error(&format!("syntax error: {}", command)));
                }
            }
            "lock" => {
                if state.locked_by.is_some() {
                    return Ok(rpc_error("configuration database locked by another user"));
                }
                state.locked_by = Some(session);
                "<ok/>".to_string()
            }
            "unlock" => {
                if state.locked_by != Some(session) {
                    return Ok(rpc_error("configuration database not locked"));
                }
                state.locked_by = None;
                "<ok/>".to_string()
            }
            "edit-config" => {
                if state.locked_by != Some(session) {
                    return Ok(rpc_error("configuration database modified"));
                }
                if let Some(config) = request.child("config") {
                    state.edits.push(config.to_xml());
                }
                state.dirty = true;
                "<ok/>".to_string()
            }
            "load-configuration" => {
                if state.locked_by != Some(session) {
                    return Ok(rpc_error("configuration database modified"));
                }
                state.dirty = true;
                "<load-configuration-results><ok/></load-configuration-results>".to_string()
            }
            "get-configuration" => format!(
                "<configuration-output>{}</configuration-output>",
                escape(state.candidate_diff.as_str())
            ),
            "commit" => {
                state.commits += 1;
                state.dirty = false;
                "<ok/>".to_string()
            }
            "discard-changes" => {
                state.discards += 1;
                state.dirty = false;
                "<ok/>".to_string()
            }
            "close-session" => "<ok/>".to_string(),
            other => return Ok(rpc_error(&format!("unknown rpc {}", other))),
        };
        Ok(format!("<rpc-reply>{}</rpc-reply>", reply))
    }
}

fn rpc_error(message: &str) -> String {
    format!(
        "<rpc-reply><rpc-error><error-type>application</error-type>\
         <error-severity>error</error-severity><error-message>{}</error-message>\
         </rpc-error></rpc-reply>",
        escape(message)
    )
}

fn output(text: &str) -> String {
    format!("<output>{}</output>", escape(text))
}

impl Connector for MockDevice {
    fn connect(&self, target: &DeviceTarget) -> NetconfResult<Box<dyn RpcChannel>> {
        let mut state = self.state.lock();
        if let Some(message) = &state.refuse_connect {
            return Err(NetconfError::connect(&target.host, message.clone()));
        }
        state.connects += 1;
        state.next_session += 1;
        Ok(Box::new(MockChannel {
            device: self.clone(),
            session: state.next_session,
        }))
    }
}

struct MockChannel {
    device: MockDevice,
    session: u64,
}

impl RpcChannel for MockChannel {
    fn rpc(&mut self, body: &str) -> NetconfResult<String> {
        self.device.handle(self.session, body)
    }

    fn set_timeout(&mut self, _timeout: Duration) {}

    fn close(&mut self) -> NetconfResult<()> {
        self.device.handle(self.session, "<close-session/>").map(|_| ())
    }
}
