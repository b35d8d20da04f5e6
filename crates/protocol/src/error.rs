//! Protocol error taxonomy
//!
//! A closed, exhaustively matched enum rather than an exception hierarchy.
//! Causes derive serde so a failure produced on the master arrives at the
//! slave intact.

use fleetlink_common::DeviceId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure cause of a device/store operation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    /// Create a backend error with the given cause message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Typed failures visible to transaction callers
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum TransactionError {
    /// A transaction is already open for the device (any owner)
    #[error("Transaction already open for device {device}")]
    InUse { device: DeviceId },

    /// Caller is not the recorded owner of the open transaction
    #[error("Caller does not own the open transaction")]
    NotOwner,

    /// No open transaction, stale handle, or operation not valid in the
    /// handle's current state
    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    /// Batch lock request overlapped devices already reserved; nothing was
    /// locked as a side effect
    #[error("Devices already reserved: {devices:?}")]
    LockConflict { devices: Vec<DeviceId> },

    /// The real device/store operation failed; the original cause is
    /// preserved
    #[error("Backend operation failed: {cause}")]
    Backend { cause: BackendError },

    /// The local or remote endpoint ceased to be master while the call was
    /// in flight
    #[error("Mastership lost for device {device}")]
    MastershipLost { device: DeviceId },

    /// Malformed request or reply on the wire
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

impl TransactionError {
    /// Wrap a backend failure, preserving its cause
    pub fn backend(cause: impl Into<BackendError>) -> Self {
        Self::Backend {
            cause: cause.into(),
        }
    }

    /// Invalid-state failure with a reason
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }
}
