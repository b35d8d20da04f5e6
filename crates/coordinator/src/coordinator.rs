//! Per-device master transaction coordinator
//!
//! One coordinator task exists per mastered device. It drains a single
//! mailbox and processes one command at a time, so handle state transitions
//! need no locking: the mailbox order is the transition order. Backend
//! commit and cancel run in spawned tasks and report back through the same
//! mailbox, keeping the coordinator responsive while the device works.

use crate::Result;
use crate::backend::{BackendTransaction, DeviceBackend, EditRequest};
use crate::handle::{HandleState, TransactionHandle};
use fleetlink_common::{AccessMode, Datastore, DeviceId, HandleId, SessionToken};
use fleetlink_protocol::{BackendError, TransactionError, TransactionReply, TransactionRequest};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Commands processed by the coordinator mailbox
enum Command {
    Open {
        owner: SessionToken,
        access: AccessMode,
        reply: oneshot::Sender<Result<HandleId>>,
    },
    Execute {
        owner: SessionToken,
        handle: HandleId,
        request: TransactionRequest,
        reply: oneshot::Sender<Result<TransactionReply>>,
    },
    Submit {
        owner: SessionToken,
        handle: HandleId,
        reply: oneshot::Sender<Result<()>>,
    },
    Cancel {
        owner: SessionToken,
        handle: HandleId,
        reply: oneshot::Sender<Result<bool>>,
    },
    SubmitFinished {
        handle: HandleId,
        result: std::result::Result<(), BackendError>,
    },
    CancelFinished {
        handle: HandleId,
    },
}

/// Cloneable mailbox handle onto a device's coordinator
///
/// Every method resolves once the coordinator processed the command; if the
/// coordinator is gone (mastership moved away), calls fail immediately with
/// [`TransactionError::MastershipLost`] instead of hanging.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    device: DeviceId,
    tx: mpsc::UnboundedSender<Command>,
}

impl CoordinatorClient {
    /// Device this client coordinates
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    fn gone(&self) -> TransactionError {
        TransactionError::MastershipLost {
            device: self.device.clone(),
        }
    }

    /// Open a new transaction for `owner`
    ///
    /// Fails with [`TransactionError::InUse`] while any handle is live for
    /// the device, including one opened by the same owner.
    pub async fn open_transaction(
        &self,
        owner: SessionToken,
        access: AccessMode,
    ) -> Result<HandleId> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Open {
                owner,
                access,
                reply,
            })
            .map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())?
    }

    /// Execute a read, edit, lock or RPC operation on an open handle
    pub async fn execute(
        &self,
        owner: SessionToken,
        handle: HandleId,
        request: TransactionRequest,
    ) -> Result<TransactionReply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Execute {
                owner,
                handle,
                request,
                reply,
            })
            .map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())?
    }

    /// Submit the open handle to the backend
    ///
    /// Resolves when the backend finished committing. One-shot per handle.
    pub async fn submit(&self, owner: SessionToken, handle: HandleId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Submit {
                owner,
                handle,
                reply,
            })
            .map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())?
    }

    /// Cancel the open handle; returns the backend's cancellation result
    pub async fn cancel(&self, owner: SessionToken, handle: HandleId) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Cancel {
                owner,
                handle,
                reply,
            })
            .map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())?
    }
}

/// Per-device coordinator actor
pub struct DeviceCoordinator {
    device: DeviceId,
    backend: Arc<dyn DeviceBackend>,
    current: Option<TransactionHandle>,
    /// Weak sender for completion messages; weak so the mailbox closes once
    /// every client is gone
    self_tx: mpsc::WeakUnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl DeviceCoordinator {
    /// Spawn the coordinator task for a device and return its client
    pub fn spawn(device: DeviceId, backend: Arc<dyn DeviceBackend>) -> CoordinatorClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = DeviceCoordinator {
            device: device.clone(),
            backend,
            current: None,
            self_tx: tx.downgrade(),
            rx,
        };
        tokio::spawn(actor.run());
        CoordinatorClient { device, tx }
    }

    async fn run(mut self) {
        tracing::debug!(device = %self.device, "coordinator started");

        while let Some(command) = self.rx.recv().await {
            self.handle_command(command).await;
        }

        // Mailbox closed: mastership moved away or the endpoint shut down.
        // An open backend transaction would otherwise leak on the device.
        if let Some(mut handle) = self.current.take()
            && handle.state == HandleState::Open
            && let Some(backend) = handle.backend.take()
        {
            tracing::debug!(device = %self.device, "cancelling open transaction on shutdown");
            let _ = backend.cancel().await;
        }

        tracing::debug!(device = %self.device, "coordinator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Open {
                owner,
                access,
                reply,
            } => {
                let _ = reply.send(self.open(owner, access).await);
            }
            Command::Execute {
                owner,
                handle,
                request,
                reply,
            } => {
                let _ = reply.send(self.execute(owner, handle, request).await);
            }
            Command::Submit {
                owner,
                handle,
                reply,
            } => self.submit(owner, handle, reply),
            Command::Cancel {
                owner,
                handle,
                reply,
            } => self.cancel(owner, handle, reply),
            Command::SubmitFinished { handle, result } => {
                if let Some(current) = self.current.as_mut()
                    && current.id == handle
                    && current.state == HandleState::Submitting
                {
                    current.state = match result {
                        Ok(()) => HandleState::Submitted,
                        Err(cause) => {
                            tracing::debug!(device = %self.device, %cause, "backend submit failed");
                            HandleState::Failed
                        }
                    };
                }
            }
            Command::CancelFinished { handle } => {
                if let Some(current) = self.current.as_mut()
                    && current.id == handle
                    && current.state == HandleState::Cancelling
                {
                    current.state = HandleState::Cancelled;
                }
            }
        }
    }

    async fn open(&mut self, owner: SessionToken, access: AccessMode) -> Result<HandleId> {
        if self.current.as_ref().is_some_and(|h| h.state.is_live()) {
            return Err(TransactionError::InUse {
                device: self.device.clone(),
            });
        }

        let backend = self
            .backend
            .new_transaction(access)
            .await
            .map_err(TransactionError::backend)?;

        let handle = TransactionHandle::new(owner, access, backend);
        let id = handle.id;
        self.current = Some(handle);

        tracing::debug!(device = %self.device, handle = %id, "transaction opened");
        Ok(id)
    }

    /// Validate that `handle` names the live open handle owned by `owner`
    fn validated_handle(&mut self, owner: SessionToken, handle: HandleId) -> Result<&mut TransactionHandle> {
        let Some(current) = self.current.as_mut() else {
            return Err(TransactionError::invalid_state("no open transaction"));
        };
        if current.id != handle {
            return Err(TransactionError::invalid_state("unknown transaction handle"));
        }
        if current.owner != owner {
            return Err(TransactionError::NotOwner);
        }
        match current.state {
            HandleState::Open => Ok(current),
            HandleState::Submitting | HandleState::Cancelling => Err(
                TransactionError::invalid_state("submit or cancel already in progress"),
            ),
            _ => Err(TransactionError::invalid_state(
                "transaction already completed",
            )),
        }
    }

    async fn execute(
        &mut self,
        owner: SessionToken,
        handle: HandleId,
        request: TransactionRequest,
    ) -> Result<TransactionReply> {
        if matches!(
            request,
            TransactionRequest::NewReadTransaction
                | TransactionRequest::NewWriteTransaction
                | TransactionRequest::Commit
                | TransactionRequest::Cancel
        ) {
            return Err(TransactionError::invalid_state(
                "lifecycle requests are not data operations",
            ));
        }

        let current = self.validated_handle(owner, handle)?;

        if request.requires_write() && !current.access.is_write() {
            return Err(TransactionError::invalid_state(
                "write operation on a read-only transaction",
            ));
        }

        let Some(backend) = current.backend.as_mut() else {
            return Err(TransactionError::invalid_state("backend transaction gone"));
        };

        run_on_backend(backend, request).await
    }

    fn submit(&mut self, owner: SessionToken, handle: HandleId, reply: oneshot::Sender<Result<()>>) {
        let current = match self.validated_handle(owner, handle) {
            Ok(current) => current,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let Some(backend) = current.backend.take() else {
            let _ = reply.send(Err(TransactionError::invalid_state(
                "backend transaction gone",
            )));
            return;
        };
        current.state = HandleState::Submitting;
        let handle_id = current.id;

        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let result = backend.commit().await;

            // State settles before the caller can issue a follow-up: the
            // completion enters the mailbox ahead of anything sent after
            // the reply resolves.
            if let Some(tx) = self_tx.upgrade() {
                let _ = tx.send(Command::SubmitFinished {
                    handle: handle_id,
                    result: result.clone(),
                });
            }
            let _ = reply.send(result.map_err(TransactionError::backend));
        });
    }

    fn cancel(&mut self, owner: SessionToken, handle: HandleId, reply: oneshot::Sender<Result<bool>>) {
        let current = match self.validated_handle(owner, handle) {
            Ok(current) => current,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let Some(backend) = current.backend.take() else {
            let _ = reply.send(Err(TransactionError::invalid_state(
                "backend transaction gone",
            )));
            return;
        };
        current.state = HandleState::Cancelling;
        let handle_id = current.id;

        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let cancelled = backend.cancel().await;

            if let Some(tx) = self_tx.upgrade() {
                let _ = tx.send(Command::CancelFinished { handle: handle_id });
            }
            let _ = reply.send(Ok(cancelled));
        });
    }
}

/// Forward a validated data operation into the backend transaction
async fn run_on_backend(
    backend: &mut Box<dyn BackendTransaction>,
    request: TransactionRequest,
) -> Result<TransactionReply> {
    let reply = match request {
        TransactionRequest::Get { path } => {
            match backend
                .read(Datastore::Operational, &path, None)
                .await
                .map_err(TransactionError::backend)?
            {
                Some(payload) => TransactionReply::Data { payload },
                None => TransactionReply::EmptyRead,
            }
        }
        TransactionRequest::GetConfig { path, fields } => {
            match backend
                .read(Datastore::Configuration, &path, fields.as_deref())
                .await
                .map_err(TransactionError::backend)?
            {
                Some(payload) => TransactionReply::Data { payload },
                None => TransactionReply::EmptyRead,
            }
        }
        TransactionRequest::Exists { store, path } => {
            let present = backend
                .exists(store, &path)
                .await
                .map_err(TransactionError::backend)?;
            TransactionReply::Exists { present }
        }
        TransactionRequest::Put {
            store,
            path,
            payload,
        } => {
            backend
                .edit(EditRequest::Put {
                    store,
                    path,
                    payload,
                })
                .await
                .map_err(TransactionError::backend)?;
            TransactionReply::Ok
        }
        TransactionRequest::Merge {
            store,
            path,
            payload,
            default_strategy,
        } => {
            backend
                .edit(EditRequest::Merge {
                    store,
                    path,
                    payload,
                    default_strategy,
                })
                .await
                .map_err(TransactionError::backend)?;
            TransactionReply::Ok
        }
        TransactionRequest::Create {
            store,
            path,
            payload,
            default_strategy,
        } => {
            backend
                .edit(EditRequest::Create {
                    store,
                    path,
                    payload,
                    default_strategy,
                })
                .await
                .map_err(TransactionError::backend)?;
            TransactionReply::Ok
        }
        TransactionRequest::Replace {
            store,
            path,
            payload,
            default_strategy,
        } => {
            backend
                .edit(EditRequest::Replace {
                    store,
                    path,
                    payload,
                    default_strategy,
                })
                .await
                .map_err(TransactionError::backend)?;
            TransactionReply::Ok
        }
        TransactionRequest::Delete { store, path } => {
            backend
                .edit(EditRequest::Delete { store, path })
                .await
                .map_err(TransactionError::backend)?;
            TransactionReply::Ok
        }
        TransactionRequest::Remove { store, path } => {
            backend
                .edit(EditRequest::Remove { store, path })
                .await
                .map_err(TransactionError::backend)?;
            TransactionReply::Ok
        }
        TransactionRequest::Lock => {
            backend.lock().await.map_err(TransactionError::backend)?;
            TransactionReply::Ok
        }
        TransactionRequest::Unlock => {
            backend.unlock().await.map_err(TransactionError::backend)?;
            TransactionReply::Ok
        }
        TransactionRequest::InvokeRpc { schema_path, input } => {
            let outcome = backend
                .invoke_rpc(&schema_path, input.as_ref())
                .await
                .map_err(TransactionError::backend)?;
            if outcome.is_empty() {
                TransactionReply::EmptyResult
            } else {
                TransactionReply::Rpc {
                    output: outcome.output,
                    errors: outcome.errors,
                }
            }
        }
        // Rejected before reaching this function
        TransactionRequest::NewReadTransaction
        | TransactionRequest::NewWriteTransaction
        | TransactionRequest::Commit
        | TransactionRequest::Cancel => {
            return Err(TransactionError::invalid_state(
                "lifecycle requests are not data operations",
            ));
        }
    };

    Ok(reply)
}
