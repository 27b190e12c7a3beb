//! Error types for swportd.

use std::io;
use swport_netconf::NetconfError;
use swport_types::ValidationError;
use thiserror::Error;

/// Result type alias for daemon operations.
pub type PortdResult<T> = Result<T, PortdError>;

/// Errors surfaced to callers of the daemon library.
#[derive(Debug, Error)]
pub enum PortdError {
    /// Unknown device, change request or interface.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// What was looked up ("device", "request", "interface").
        kind: &'static str,
        /// The missing key.
        name: String,
    },

    /// Desired state rejected before any device call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A change request that cannot be applied as stored.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Session, RPC or timeout failure.
    ///
    /// Carries the device's message verbatim.
    #[error("{0}")]
    Protocol(String),

    /// The request is not in the state the transition requires.
    #[error("request {id} is {status}, expected pending")]
    StateConflict {
        /// Request id.
        id: String,
        /// Current status.
        status: String,
    },

    /// The persistent store failed.
    #[error("Store operation failed: {operation}: {message}")]
    Store {
        /// The operation that failed (e.g., "insert_request").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Settings or inventory problem.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PortdError {
    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a store error.
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a state-conflict error.
    pub fn state_conflict(id: impl ToString, status: impl ToString) -> Self {
        Self::StateConflict {
            id: id.to_string(),
            status: status.to_string(),
        }
    }

    /// Returns true if a later attempt might succeed.
    ///
    /// Nothing in this crate retries on its own; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PortdError::Protocol(_) | PortdError::Store { .. })
    }
}

impl From<NetconfError> for PortdError {
    fn from(e: NetconfError) -> Self {
        match e {
            NetconfError::Validation(v) => PortdError::Validation(v),
            other => PortdError::Protocol(other.to_string()),
        }
    }
}
