//! The mastership resolver control loop

use crate::listener::SessionListener;
use fleetlink_common::{AccessMode, DeviceId};
use fleetlink_coordinator::{CoordinatorClient, DeviceBackend, DeviceCoordinator};
use fleetlink_fabric::{FabricClient, HandlerRequests};
use fleetlink_protocol::{
    RequestEnvelope, TransactionError, TransactionReply, TransactionRequest, encode_reply,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// One item on the external ownership feed for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipChange {
    /// This member now owns the device entity
    BecameOwner,
    /// Ownership moved elsewhere
    LostOwnership,
}

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Prefix of device request subjects on the fabric
    pub subject_prefix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            subject_prefix: "device".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Request subject for a device under this configuration
    pub fn subject_for(&self, device: &DeviceId) -> String {
        format!("{}.{}.txn", self.subject_prefix, device)
    }
}

type Listeners = Arc<Mutex<Vec<Arc<dyn SessionListener>>>>;

/// Control-plane switch between hosting a device's coordinator and not
///
/// Owns the background loop consuming the ownership feed; dropping the
/// resolver stops it.
pub struct MastershipResolver {
    device: DeviceId,
    subject: String,
    is_master: watch::Receiver<bool>,
    listeners: Listeners,
    task: JoinHandle<()>,
}

impl MastershipResolver {
    /// Spawn the resolver loop for a device
    pub fn spawn(
        device: DeviceId,
        backend: Arc<dyn DeviceBackend>,
        client: FabricClient,
        feed: mpsc::UnboundedReceiver<OwnershipChange>,
        config: ResolverConfig,
    ) -> Self {
        let subject = config.subject_for(&device);
        let (is_master_tx, is_master_rx) = watch::channel(false);
        let listeners: Listeners = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn(run_resolver(
            device.clone(),
            backend,
            client,
            subject.clone(),
            feed,
            is_master_tx,
            listeners.clone(),
        ));

        Self {
            device,
            subject,
            is_master: is_master_rx,
            listeners,
            task,
        }
    }

    /// Device this resolver tracks
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Request subject the master endpoint serves
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Whether this member currently hosts the device's coordinator
    pub fn is_master(&self) -> bool {
        *self.is_master.borrow()
    }

    /// Watch of the mastership signal, for wiring into proxies
    pub fn mastership_watch(&self) -> watch::Receiver<bool> {
        self.is_master.clone()
    }

    /// Register a downstream session listener
    pub fn register_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.lock().push(listener);
    }
}

impl Drop for MastershipResolver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Hosting {
    serve: JoinHandle<()>,
}

async fn run_resolver(
    device: DeviceId,
    backend: Arc<dyn DeviceBackend>,
    client: FabricClient,
    subject: String,
    mut feed: mpsc::UnboundedReceiver<OwnershipChange>,
    is_master: watch::Sender<bool>,
    listeners: Listeners,
) {
    let mut hosting: Option<Hosting> = None;

    while let Some(change) = feed.recv().await {
        match change {
            OwnershipChange::BecameOwner => {
                if hosting.is_some() {
                    continue;
                }
                let coordinator = DeviceCoordinator::spawn(device.clone(), backend.clone());
                let requests = client.register_handler(&subject);
                let serve = tokio::spawn(serve_requests(requests, coordinator));
                let _ = is_master.send(true);
                tracing::info!(device = %device, "became master");
                hosting = Some(Hosting { serve });
            }
            OwnershipChange::LostOwnership => {
                if let Some(hosting) = hosting.take() {
                    tracing::info!(device = %device, "lost mastership");
                    stop_hosting(&client, &subject, &is_master, hosting);
                    for listener in listeners.lock().iter() {
                        listener.session_down(&device);
                    }
                }
            }
        }
    }

    // Feed closed: the ownership subscription is gone for good
    if let Some(hosting) = hosting.take() {
        stop_hosting(&client, &subject, &is_master, hosting);
    }
    tracing::info!(device = %device, "ownership subscription terminated");
    for listener in listeners.lock().iter() {
        listener.session_terminated(&device);
    }
}

/// Tear down the serving side: deregister the subject, flip the mastership
/// signal, and stop the serve loop (dropping its coordinator, which cancels
/// any open backend transaction)
fn stop_hosting(
    client: &FabricClient,
    subject: &str,
    is_master: &watch::Sender<bool>,
    hosting: Hosting,
) {
    client.deregister_handler(subject);
    let _ = is_master.send(false);
    hosting.serve.abort();
}

/// Serve incoming request envelopes against the device's coordinator
///
/// Requests are served one at a time in arrival order, preserving the
/// per-handle FIFO the proxies rely on.
async fn serve_requests(mut requests: HandlerRequests, coordinator: CoordinatorClient) {
    while let Some((message, reply_tx)) = requests.recv().await {
        let envelope = match RequestEnvelope::from_message(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "rejecting malformed request");
                let reply =
                    TransactionReply::failure(TransactionError::Protocol(e.to_string()));
                let _ = reply_tx.send(encode_reply("", &reply));
                continue;
            }
        };

        let request_id = envelope.request_id.clone();
        let reply = dispatch(&coordinator, envelope).await;
        let _ = reply_tx.send(encode_reply(&request_id, &reply));
    }
}

/// Translate one envelope into coordinator calls
async fn dispatch(coordinator: &CoordinatorClient, envelope: RequestEnvelope) -> TransactionReply {
    let RequestEnvelope {
        owner,
        handle,
        request,
        ..
    } = envelope;

    let result = match request {
        TransactionRequest::NewReadTransaction => coordinator
            .open_transaction(owner, AccessMode::Read)
            .await
            .map(|handle| TransactionReply::NewReadTransaction { handle }),
        TransactionRequest::NewWriteTransaction => coordinator
            .open_transaction(owner, AccessMode::Write)
            .await
            .map(|handle| TransactionReply::NewWriteTransaction { handle }),
        TransactionRequest::Commit => match handle {
            Some(handle) => coordinator
                .submit(owner, handle)
                .await
                .map(|()| TransactionReply::Ok),
            None => Err(TransactionError::Protocol(
                "commit without a transaction handle".to_string(),
            )),
        },
        TransactionRequest::Cancel => match handle {
            Some(handle) => coordinator
                .cancel(owner, handle)
                .await
                .map(|cancelled| TransactionReply::Cancelled { cancelled }),
            None => Err(TransactionError::Protocol(
                "cancel without a transaction handle".to_string(),
            )),
        },
        operation => match handle {
            Some(handle) => coordinator.execute(owner, handle, operation).await,
            None => Err(TransactionError::Protocol(
                "operation without a transaction handle".to_string(),
            )),
        },
    };

    match result {
        Ok(reply) => reply,
        Err(cause) => TransactionReply::failure(cause),
    }
}
