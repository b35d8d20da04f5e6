//! Client-facing proxy for one remote device

use crate::link::MasterLink;
use crate::transaction::SlaveTransaction;
use crate::Result;
use fleetlink_common::{AccessMode, DeviceId, SessionToken};
use fleetlink_fabric::FabricClient;
use fleetlink_protocol::{RequestEnvelope, TransactionError, TransactionReply, TransactionRequest};
use tokio::sync::watch;

/// Proxy through which a non-owning member drives a device
pub struct SlaveProxy {
    device: DeviceId,
    owner: SessionToken,
    link: MasterLink,
}

impl SlaveProxy {
    /// Connect a proxy over the fabric
    ///
    /// `subject` addresses the device's master endpoint; `mastership` is the
    /// liveness signal that fails calls fast when the master goes away.
    pub fn connect(
        device: DeviceId,
        owner: SessionToken,
        client: FabricClient,
        subject: String,
        mastership: watch::Receiver<bool>,
    ) -> Self {
        let link = MasterLink::spawn(device.clone(), client, subject, mastership);
        Self {
            device,
            owner,
            link,
        }
    }

    /// Device this proxy fronts
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    async fn acquire(&self, request: TransactionRequest) -> Result<TransactionReply> {
        let envelope = RequestEnvelope::new(self.device.clone(), self.owner, None, request);
        self.link.request(envelope).await
    }

    /// Acquire a read transaction on the master
    pub async fn new_read_transaction(&self) -> Result<SlaveTransaction> {
        match self.acquire(TransactionRequest::NewReadTransaction).await? {
            TransactionReply::NewReadTransaction { handle } => Ok(SlaveTransaction::new(
                self.device.clone(),
                self.owner,
                handle,
                AccessMode::Read,
                self.link.clone(),
            )),
            other => Err(TransactionError::Protocol(format!(
                "unexpected reply to new_read_transaction: {:?}",
                other
            ))),
        }
    }

    /// Acquire a read-write transaction on the master
    pub async fn new_write_transaction(&self) -> Result<SlaveTransaction> {
        match self.acquire(TransactionRequest::NewWriteTransaction).await? {
            TransactionReply::NewWriteTransaction { handle } => Ok(SlaveTransaction::new(
                self.device.clone(),
                self.owner,
                handle,
                AccessMode::Write,
                self.link.clone(),
            )),
            other => Err(TransactionError::Protocol(format!(
                "unexpected reply to new_write_transaction: {:?}",
                other
            ))),
        }
    }
}
