//! Backend seams the coordinator drives
//!
//! The real device session (protocol framing, schema binding) lives behind
//! these traits. The coordinator only needs to allocate one transaction at
//! a time and forward validated operations into it.

use async_trait::async_trait;
use fleetlink_common::{AccessMode, Datastore, EditStrategy, Path, Payload, RpcError};
use fleetlink_protocol::BackendError;

/// One edit forwarded into a backend transaction
///
/// The strategy is part of the request shape; the backend never derives it
/// from payload content.
#[derive(Debug, Clone)]
pub enum EditRequest {
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
    Delete {
        store: Datastore,
        path: Path,
    },
    Remove {
        store: Datastore,
        path: Path,
    },
}

impl EditRequest {
    /// Short tag for logging and test assertions
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Merge { .. } => "merge",
            Self::Create { .. } => "create",
            Self::Replace { .. } => "replace",
            Self::Delete { .. } => "delete",
            Self::Remove { .. } => "remove",
        }
    }

    /// Path the edit targets
    pub fn path(&self) -> &Path {
        match self {
            Self::Put { path, .. }
            | Self::Merge { path, .. }
            | Self::Create { path, .. }
            | Self::Replace { path, .. }
            | Self::Delete { path, .. }
            | Self::Remove { path, .. } => path,
        }
    }
}

/// Result of invoking a device RPC
#[derive(Debug, Clone, Default)]
pub struct RpcOutcome {
    pub output: Option<Payload>,
    pub errors: Vec<RpcError>,
}

impl RpcOutcome {
    /// Whether the RPC produced neither output nor errors
    pub fn is_empty(&self) -> bool {
        self.output.is_none() && self.errors.is_empty()
    }
}

/// One in-flight transaction against the real device/store
///
/// Exclusively owned by its handle while open. `commit` and `cancel`
/// consume the transaction, so the backend cannot be invoked a second time
/// for the same handle.
#[async_trait]
pub trait BackendTransaction: Send {
    /// Read data under `path`, optionally restricted to selected fields
    async fn read(
        &mut self,
        store: Datastore,
        path: &Path,
        fields: Option<&[Path]>,
    ) -> Result<Option<Payload>, BackendError>;

    /// Check for data under `path` without transferring it
    async fn exists(&mut self, store: Datastore, path: &Path) -> Result<bool, BackendError>;

    /// Apply one edit to the transaction's working set
    async fn edit(&mut self, edit: EditRequest) -> Result<(), BackendError>;

    /// Take the device-side datastore lock
    async fn lock(&mut self) -> Result<(), BackendError>;

    /// Release the device-side datastore lock
    async fn unlock(&mut self) -> Result<(), BackendError>;

    /// Invoke an RPC on the device
    async fn invoke_rpc(
        &mut self,
        schema_path: &Path,
        input: Option<&Payload>,
    ) -> Result<RpcOutcome, BackendError>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<(), BackendError>;

    /// Discard the transaction; returns whether anything was cancelled
    async fn cancel(self: Box<Self>) -> bool;
}

/// Factory for backend transactions against one device
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Allocate a new backend transaction
    async fn new_transaction(
        &self,
        access: AccessMode,
    ) -> Result<Box<dyn BackendTransaction>, BackendError>;
}
