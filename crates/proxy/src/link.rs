//! Forwarding link to a device's master endpoint
//!
//! One link task per device serializes outgoing requests: each request is
//! sent and its reply awaited before the next one goes out, which is what
//! gives callers per-handle FIFO delivery. The link watches mastership
//! liveness and fails queued and in-flight requests immediately when it is
//! lost; it never retries and never re-resolves a new master.

use crate::Result;
use fleetlink_common::DeviceId;
use fleetlink_fabric::FabricClient;
use fleetlink_protocol::{RequestEnvelope, TransactionError, TransactionReply, decode_reply};
use tokio::sync::{mpsc, oneshot, watch};

struct LinkCommand {
    envelope: RequestEnvelope,
    reply: oneshot::Sender<Result<TransactionReply>>,
}

/// Handle onto the forwarding task for one device
#[derive(Debug, Clone)]
pub struct MasterLink {
    device: DeviceId,
    tx: mpsc::UnboundedSender<LinkCommand>,
}

impl MasterLink {
    /// Spawn the forwarding task
    ///
    /// `subject` addresses the master endpoint on the fabric; `mastership`
    /// flips to `false` when the master is gone.
    pub fn spawn(
        device: DeviceId,
        client: FabricClient,
        subject: String,
        mastership: watch::Receiver<bool>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_link(device.clone(), client, subject, mastership, rx));
        Self { device, tx }
    }

    /// Device this link forwards for
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    fn lost(&self) -> TransactionError {
        TransactionError::MastershipLost {
            device: self.device.clone(),
        }
    }

    /// Enqueue a request; resolves with the master's reply
    pub(crate) async fn request(&self, envelope: RequestEnvelope) -> Result<TransactionReply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LinkCommand { envelope, reply })
            .map_err(|_| self.lost())?;
        rx.await.map_err(|_| self.lost())?
    }
}

async fn run_link(
    device: DeviceId,
    client: FabricClient,
    subject: String,
    mut mastership: watch::Receiver<bool>,
    mut rx: mpsc::UnboundedReceiver<LinkCommand>,
) {
    while let Some(command) = rx.recv().await {
        let lost = || {
            Err(TransactionError::MastershipLost {
                device: device.clone(),
            })
        };

        if !*mastership.borrow() {
            tracing::debug!(device = %device, "failing request, master endpoint is gone");
            let _ = command.reply.send(lost());
            continue;
        }

        let message = command.envelope.into_message();
        let result = tokio::select! {
            res = client.request(&subject, message) => match res {
                Ok(reply) => match decode_reply(&reply) {
                    Ok(reply) => reply.into_result(),
                    Err(e) => Err(TransactionError::Protocol(e.to_string())),
                },
                // The master's handler disappeared mid-request
                Err(_) => lost(),
            },
            _ = wait_lost(&mut mastership) => lost(),
        };

        let _ = command.reply.send(result);
    }
}

/// Resolves once mastership is gone, including when the watch source drops
async fn wait_lost(mastership: &mut watch::Receiver<bool>) {
    let _ = mastership.wait_for(|up| !*up).await;
}
