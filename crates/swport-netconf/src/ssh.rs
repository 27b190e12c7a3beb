//! NETCONF 1.0 over SSH.
//!
//! Messages are framed with the `]]>]]>` end-of-message marker. Only the
//! base:1.0 capability is advertised, so the device never switches to
//! chunked framing.

use ssh2::Channel;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{NetconfError, NetconfResult};
use crate::transport::{Connector, Credentials, DeviceTarget, RpcChannel};

/// End-of-message marker for base:1.0 framing.
pub const DELIMITER: &[u8] = b"]]>]]>";

const BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

const CLIENT_HELLO: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities>"#,
    r#"<capability>urn:ietf:params:netconf:base:1.0</capability>"#,
    r#"</capabilities></hello>"#
);

/// Opens NETCONF sessions over SSH with host-key checking disabled,
/// matching how the management network is provisioned.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

impl SshConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for SshConnector {
    fn connect(&self, target: &DeviceTarget) -> NetconfResult<Box<dyn RpcChannel>> {
        let fail = |message: String| NetconfError::connect(&target.host, message);

        let addr = target
            .address()
            .to_socket_addrs()
            .map_err(|e| fail(e.to_string()))?
            .next()
            .ok_or_else(|| fail("no address resolved".to_string()))?;
        let tcp =
            TcpStream::connect_timeout(&addr, target.timeout).map_err(|e| fail(e.to_string()))?;

        let mut session = ssh2::Session::new().map_err(|e| fail(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout_millis(target.timeout));
        session.handshake().map_err(|e| fail(e.to_string()))?;

        match &target.credentials {
            Credentials::Password(password) => {
                session.userauth_password(&target.username, password)
            }
            Credentials::KeyFile(path) => {
                session.userauth_pubkey_file(&target.username, None, path, None)
            }
        }
        .map_err(|e| fail(e.to_string()))?;
        if !session.authenticated() {
            return Err(fail("authentication failed".to_string()));
        }

        let mut channel = session.channel_session().map_err(|e| fail(e.to_string()))?;
        channel.subsystem("netconf").map_err(|e| fail(e.to_string()))?;

        let mut conn = SshChannel {
            session,
            channel,
            buffer: Vec::new(),
            message_id: 0,
        };
        let server_hello = conn.read_message("hello")?;
        debug!(device = %target.name, bytes = server_hello.len(), "Received server hello");
        conn.write_message(CLIENT_HELLO.as_bytes(), "hello")?;

        info!(device = %target.name, host = %target.host, "NETCONF session established");
        Ok(Box::new(conn))
    }
}

struct SshChannel {
    session: ssh2::Session,
    channel: Channel,
    buffer: Vec<u8>,
    message_id: u64,
}

impl SshChannel {
    fn write_message(&mut self, message: &[u8], operation: &str) -> NetconfResult<()> {
        self.channel
            .write_all(message)
            .and_then(|_| self.channel.write_all(DELIMITER))
            .and_then(|_| self.channel.flush())
            .map_err(|e| io_error(e, operation))
    }

    fn read_message(&mut self, operation: &str) -> NetconfResult<String> {
        let mut chunk = [0u8; 8192];
        loop {
            if let Some(pos) = find_delimiter(&self.buffer) {
                let message: Vec<u8> = self.buffer.drain(..pos).collect();
                self.buffer.drain(..DELIMITER.len());
                return String::from_utf8(message).map_err(|e| NetconfError::Xml(e.to_string()));
            }
            let n = self.channel.read(&mut chunk).map_err(|e| io_error(e, operation))?;
            if n == 0 {
                return Err(NetconfError::Transport(format!(
                    "connection closed during {}",
                    operation
                )));
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

impl RpcChannel for SshChannel {
    fn rpc(&mut self, body: &str) -> NetconfResult<String> {
        self.message_id += 1;
        let message = format!(
            r#"<rpc message-id="{}" xmlns="{}">{}</rpc>"#,
            self.message_id, BASE_NS, body
        );
        let operation = rpc_name(body);
        self.write_message(message.as_bytes(), operation)?;
        self.read_message(operation)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(timeout_millis(timeout));
    }

    fn close(&mut self) -> NetconfResult<()> {
        let result = self.rpc("<close-session/>").map(|_| ());
        let _ = self.channel.send_eof();
        let _ = self.channel.wait_close();
        let _ = self.session.disconnect(None, "close-session", None);
        result
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(DELIMITER.len())
        .position(|window| window == DELIMITER)
}

/// First element name of an RPC body, for error labels.
fn rpc_name(body: &str) -> &str {
    body.trim_start()
        .trim_start_matches('<')
        .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .next()
        .unwrap_or("rpc")
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

fn io_error(e: io::Error, operation: &str) -> NetconfError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => NetconfError::timeout(operation),
        _ => NetconfError::Io(e),
    }
}
