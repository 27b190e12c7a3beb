//! Transport seam between sessions and the wire.
//!
//! A [`Connector`] opens a blocking [`RpcChannel`] to one device. The SSH
//! implementation lives in [`crate::ssh`]; tests use the in-process mock.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::NetconfResult;

/// Default NETCONF-over-SSH port.
pub const DEFAULT_PORT: u16 = 830;

/// Default per-RPC timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How to authenticate to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    Password(String),
    KeyFile(PathBuf),
}

/// Everything needed to open a session to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    /// Inventory name, used for logging.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credentials: Credentials,
    pub timeout: Duration,
}

impl DeviceTarget {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            credentials,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port` for socket connects and error messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A blocking request/reply channel to one device.
///
/// `rpc` takes the inner RPC body (e.g. `<lock>...</lock>`) and returns the
/// full `rpc-reply` document text. Framing and message ids are the
/// channel's concern.
pub trait RpcChannel: Send {
    fn rpc(&mut self, body: &str) -> NetconfResult<String>;

    /// Changes the read/write timeout for subsequent RPCs.
    fn set_timeout(&mut self, timeout: Duration);

    /// Sends close-session and tears down the transport.
    fn close(&mut self) -> NetconfResult<()>;
}

/// Opens channels to devices.
pub trait Connector: Send + Sync {
    fn connect(&self, target: &DeviceTarget) -> NetconfResult<Box<dyn RpcChannel>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults() {
        let target = DeviceTarget::new(
            "sw1",
            "10.0.0.1",
            "netconf",
            Credentials::Password("secret".to_string()),
        );
        assert_eq!(target.port, DEFAULT_PORT);
        assert_eq!(target.timeout, DEFAULT_TIMEOUT);
        assert_eq!(target.address(), "10.0.0.1:830");

        let target = target.with_port(2222).with_timeout(Duration::from_secs(5));
        assert_eq!(target.address(), "10.0.0.1:2222");
        assert_eq!(target.timeout, Duration::from_secs(5));
    }
}
