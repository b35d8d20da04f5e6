//! Remote transaction with a local surface

use crate::Result;
use crate::link::MasterLink;
use fleetlink_common::{
    AccessMode, Datastore, DeviceId, EditStrategy, HandleId, Path, Payload, RpcError, SessionToken,
};
use fleetlink_protocol::{RequestEnvelope, TransactionError, TransactionReply, TransactionRequest};

/// Result of a remote RPC invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub output: Option<Payload>,
    pub errors: Vec<RpcError>,
}

/// One transaction held against a remote master
///
/// Mirrors a local read-write transaction: every method builds the matching
/// protocol request and resolves when the master's reply arrives. Requests
/// issued on one transaction are delivered to the master in call order;
/// nothing is guaranteed across different transactions or devices.
#[derive(Debug)]
pub struct SlaveTransaction {
    device: DeviceId,
    owner: SessionToken,
    handle: HandleId,
    access: AccessMode,
    link: MasterLink,
}

impl SlaveTransaction {
    pub(crate) fn new(
        device: DeviceId,
        owner: SessionToken,
        handle: HandleId,
        access: AccessMode,
        link: MasterLink,
    ) -> Self {
        Self {
            device,
            owner,
            handle,
            access,
            link,
        }
    }

    /// Handle reference on the master
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Access mode granted at open
    pub fn access(&self) -> AccessMode {
        self.access
    }

    async fn send(&self, request: TransactionRequest) -> Result<TransactionReply> {
        let envelope = RequestEnvelope::new(
            self.device.clone(),
            self.owner,
            Some(self.handle),
            request,
        );
        self.link.request(envelope).await
    }

    fn unexpected(op: &str, reply: &TransactionReply) -> TransactionError {
        TransactionError::Protocol(format!("unexpected reply to {}: {:?}", op, reply))
    }

    /// Read operational state under `path`
    pub async fn get(&self, path: Path) -> Result<Option<Payload>> {
        match self.send(TransactionRequest::Get { path }).await? {
            TransactionReply::Data { payload } => Ok(Some(payload)),
            TransactionReply::EmptyRead => Ok(None),
            other => Err(Self::unexpected("get", &other)),
        }
    }

    /// Read configuration under `path`, optionally restricted to fields
    pub async fn get_config(
        &self,
        path: Path,
        fields: Option<Vec<Path>>,
    ) -> Result<Option<Payload>> {
        match self
            .send(TransactionRequest::GetConfig { path, fields })
            .await?
        {
            TransactionReply::Data { payload } => Ok(Some(payload)),
            TransactionReply::EmptyRead => Ok(None),
            other => Err(Self::unexpected("get_config", &other)),
        }
    }

    /// Check for data under `path` without transferring it
    pub async fn exists(&self, store: Datastore, path: Path) -> Result<bool> {
        match self.send(TransactionRequest::Exists { store, path }).await? {
            TransactionReply::Exists { present } => Ok(present),
            other => Err(Self::unexpected("exists", &other)),
        }
    }

    async fn expect_ack(&self, op: &str, request: TransactionRequest) -> Result<()> {
        match self.send(request).await? {
            TransactionReply::Ok => Ok(()),
            other => Err(Self::unexpected(op, &other)),
        }
    }

    pub async fn put(&self, store: Datastore, path: Path, payload: Payload) -> Result<()> {
        self.expect_ack(
            "put",
            TransactionRequest::Put {
                store,
                path,
                payload,
            },
        )
        .await
    }

    pub async fn merge(
        &self,
        store: Datastore,
        path: Path,
        payload: Payload,
        default_strategy: Option<EditStrategy>,
    ) -> Result<()> {
        self.expect_ack(
            "merge",
            TransactionRequest::Merge {
                store,
                path,
                payload,
                default_strategy,
            },
        )
        .await
    }

    pub async fn create(
        &self,
        store: Datastore,
        path: Path,
        payload: Payload,
        default_strategy: Option<EditStrategy>,
    ) -> Result<()> {
        self.expect_ack(
            "create",
            TransactionRequest::Create {
                store,
                path,
                payload,
                default_strategy,
            },
        )
        .await
    }

    pub async fn replace(
        &self,
        store: Datastore,
        path: Path,
        payload: Payload,
        default_strategy: Option<EditStrategy>,
    ) -> Result<()> {
        self.expect_ack(
            "replace",
            TransactionRequest::Replace {
                store,
                path,
                payload,
                default_strategy,
            },
        )
        .await
    }

    pub async fn delete(&self, store: Datastore, path: Path) -> Result<()> {
        self.expect_ack("delete", TransactionRequest::Delete { store, path })
            .await
    }

    pub async fn remove(&self, store: Datastore, path: Path) -> Result<()> {
        self.expect_ack("remove", TransactionRequest::Remove { store, path })
            .await
    }

    /// Take the device-side datastore lock
    pub async fn lock(&self) -> Result<()> {
        self.expect_ack("lock", TransactionRequest::Lock).await
    }

    /// Release the device-side datastore lock
    pub async fn unlock(&self) -> Result<()> {
        self.expect_ack("unlock", TransactionRequest::Unlock).await
    }

    /// Invoke an RPC on the device
    pub async fn invoke_rpc(
        &self,
        schema_path: Path,
        input: Option<Payload>,
    ) -> Result<RpcResponse> {
        match self
            .send(TransactionRequest::InvokeRpc { schema_path, input })
            .await?
        {
            TransactionReply::Rpc { output, errors } => Ok(RpcResponse { output, errors }),
            TransactionReply::EmptyResult => Ok(RpcResponse {
                output: None,
                errors: Vec::new(),
            }),
            other => Err(Self::unexpected("invoke_rpc", &other)),
        }
    }

    /// Submit the transaction; resolves when the master's backend finished
    pub async fn commit(self) -> Result<()> {
        match self.send(TransactionRequest::Commit).await? {
            TransactionReply::Ok => Ok(()),
            other => Err(Self::unexpected("commit", &other)),
        }
    }

    /// Discard the transaction
    pub async fn cancel(self) -> Result<bool> {
        match self.send(TransactionRequest::Cancel).await? {
            TransactionReply::Cancelled { cancelled } => Ok(cancelled),
            other => Err(Self::unexpected("cancel", &other)),
        }
    }
}
