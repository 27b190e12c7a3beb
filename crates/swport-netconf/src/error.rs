//! Error types for NETCONF operations.
//!
//! Operations are never retried here. Every failure is reported to the
//! caller, which decides whether to degrade, retry or abort.

use std::io;
use swport_types::ValidationError;
use thiserror::Error;

/// Result type alias for NETCONF operations.
pub type NetconfResult<T> = Result<T, NetconfError>;

/// Errors that can occur while talking to a device.
#[derive(Debug, Error)]
pub enum NetconfError {
    /// Could not reach or authenticate to the device.
    #[error("Failed to connect to {host}: {message}")]
    Connect {
        /// Device host or address.
        host: String,
        /// Underlying failure.
        message: String,
    },

    /// Transport failed after the session was established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The device did not answer within the session timeout.
    #[error("timeout during {operation}")]
    Timeout {
        /// The RPC or phase that timed out.
        operation: String,
    },

    /// The device answered with an `rpc-error`.
    ///
    /// Displays the device message verbatim.
    #[error("{message}")]
    Rpc {
        /// The RPC that failed (e.g., "commit", "lock").
        operation: String,
        /// The device's error-message text.
        message: String,
    },

    /// The reply could not be parsed.
    #[error("Malformed XML: {0}")]
    Xml(String),

    /// The desired configuration was rejected before any device call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// IO error on the underlying socket.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (worker panic, unexpected state).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NetconfError {
    /// Creates an rpc-error.
    pub fn rpc(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rpc {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a connect error.
    pub fn connect(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Returns true if the failure happened before anything reached the device.
    pub fn is_validation(&self) -> bool {
        matches!(self, NetconfError::Validation(_))
    }

    /// Returns true if the device itself refused the request.
    pub fn is_device_error(&self) -> bool {
        matches!(self, NetconfError::Rpc { .. })
    }
}

impl From<quick_xml::Error> for NetconfError {
    fn from(e: quick_xml::Error) -> Self {
        NetconfError::Xml(e.to_string())
    }
}

impl From<ssh2::Error> for NetconfError {
    fn from(e: ssh2::Error) -> Self {
        // LIBSSH2_ERROR_TIMEOUT
        if matches!(e.code(), ssh2::ErrorCode::Session(-9)) {
            NetconfError::timeout("ssh")
        } else {
            NetconfError::Transport(e.to_string())
        }
    }
}
