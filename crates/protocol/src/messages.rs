//! Request and reply messages for the slave/master boundary

use crate::TransactionError;
use fleetlink_common::{Datastore, EditStrategy, HandleId, Path, Payload, RpcError};
use serde::{Deserialize, Serialize};

/// Operation requests sent from a slave proxy to the master endpoint
///
/// Edit variants carry their merge semantics explicitly so the coordinator
/// decides behavior from the tag, never from payload content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionRequest {
    /// Acquire a read transaction handle
    NewReadTransaction,
    /// Acquire a read-write transaction handle
    NewWriteTransaction,
    /// Read operational state
    Get { path: Path },
    /// Read configuration, optionally restricted to selected fields
    GetConfig {
        path: Path,
        fields: Option<Vec<Path>>,
    },
    /// Membership check without transferring data
    Exists { store: Datastore, path: Path },
    Put {
        store: Datastore,
        path: Path,
        payload: Payload,
    },
    Merge {
        store: Datastore,
        path: Path,
        payload: Payload,
        default_strategy: Option<EditStrategy>,
    },
    Create {
        store: Datastore,
        path: Path,
        payload: Payload,
        default_strategy: Option<EditStrategy>,
    },
    Replace {
        store: Datastore,
        path: Path,
        payload: Payload,
        default_strategy: Option<EditStrategy>,
    },
    Delete { store: Datastore, path: Path },
    Remove { store: Datastore, path: Path },
    /// Take the device-side lock on the target datastore
    Lock,
    Unlock,
    /// Submit the open transaction to the backend
    Commit,
    /// Discard the open transaction
    Cancel,
    InvokeRpc {
        schema_path: Path,
        input: Option<Payload>,
    },
}

impl TransactionRequest {
    /// Short tag for headers and logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewReadTransaction => "new_read_transaction",
            Self::NewWriteTransaction => "new_write_transaction",
            Self::Get { .. } => "get",
            Self::GetConfig { .. } => "get_config",
            Self::Exists { .. } => "exists",
            Self::Put { .. } => "put",
            Self::Merge { .. } => "merge",
            Self::Create { .. } => "create",
            Self::Replace { .. } => "replace",
            Self::Delete { .. } => "delete",
            Self::Remove { .. } => "remove",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Commit => "commit",
            Self::Cancel => "cancel",
            Self::InvokeRpc { .. } => "invoke_rpc",
        }
    }

    /// Whether this request mutates device data
    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            Self::Put { .. }
                | Self::Merge { .. }
                | Self::Create { .. }
                | Self::Replace { .. }
                | Self::Delete { .. }
                | Self::Remove { .. }
        )
    }

    /// Whether this request needs a write-mode handle
    pub fn requires_write(&self) -> bool {
        self.is_edit() || matches!(self, Self::Lock | Self::Unlock | Self::Commit)
    }
}

/// Replies from the master endpoint
///
/// Either a value reply or a typed failure; an empty read or empty RPC
/// result is an explicit variant, not an absent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionReply {
    NewReadTransaction { handle: HandleId },
    NewWriteTransaction { handle: HandleId },
    /// Read result carrying data
    Data { payload: Payload },
    /// Read completed but the target holds no data
    EmptyRead,
    Exists { present: bool },
    /// Acknowledgement for edits, lock/unlock and successful submit
    Ok,
    /// Result of a cancel request
    Cancelled { cancelled: bool },
    Rpc {
        output: Option<Payload>,
        errors: Vec<RpcError>,
    },
    /// RPC completed with neither output nor errors
    EmptyResult,
    Failure { cause: TransactionError },
}

impl TransactionReply {
    /// Wrap a failure cause
    pub fn failure(cause: TransactionError) -> Self {
        Self::Failure { cause }
    }

    /// Whether this reply carries a failure cause
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Split into the success reply or the failure cause
    pub fn into_result(self) -> Result<TransactionReply, TransactionError> {
        match self {
            Self::Failure { cause } => Err(cause),
            other => Ok(other),
        }
    }
}
