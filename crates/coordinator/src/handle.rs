//! Transaction handle state machine

use crate::backend::BackendTransaction;
use fleetlink_common::{AccessMode, HandleId, SessionToken};

/// Lifecycle state of a transaction handle
///
/// `Submitting` and `Cancelling` cover the window between handing the
/// backend transaction to its completion task and hearing back; requests
/// arriving in that window are rejected the same way as after a terminal
/// state, which is what makes submit and cancel one-shot without blocking
/// the coordinator's mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Accepting operations
    Open,
    /// Backend commit in flight
    Submitting,
    /// Backend cancel in flight
    Cancelling,
    /// Terminal: backend committed
    Submitted,
    /// Terminal: cancelled
    Cancelled,
    /// Terminal: backend commit failed
    Failed,
}

impl HandleState {
    /// Whether the handle still blocks a new transaction on the device
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Open | Self::Submitting | Self::Cancelling)
    }

    /// Whether the handle reached a terminal state
    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }
}

/// One in-flight backend transaction and its recorded owner
pub struct TransactionHandle {
    /// Handle reference handed to the owning session
    pub id: HandleId,
    /// Session that opened the transaction
    pub owner: SessionToken,
    /// Access mode granted at open
    pub access: AccessMode,
    /// Current lifecycle state
    pub state: HandleState,
    /// The backend transaction; taken when submit or cancel hands it to the
    /// completion task
    pub backend: Option<Box<dyn BackendTransaction>>,
}

impl TransactionHandle {
    /// Bind a fresh handle around a newly allocated backend transaction
    pub fn new(
        owner: SessionToken,
        access: AccessMode,
        backend: Box<dyn BackendTransaction>,
    ) -> Self {
        Self {
            id: HandleId::new(),
            owner,
            access,
            state: HandleState::Open,
            backend: Some(backend),
        }
    }
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("access", &self.access)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
