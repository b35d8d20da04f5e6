//! Multi-device batch transactions
//!
//! A batch reserves its whole device set in the lock registry before any
//! per-device transaction opens, so two batches touching overlapping
//! devices cannot interleave. The reservation is released when the batch
//! reaches a terminal state, including every early-exit path.

use crate::Result;
use crate::coordinator::CoordinatorClient;
use fleetlink_common::{AccessMode, DeviceId, HandleId, SessionToken};
use fleetlink_locks::DeviceLockRegistry;
use fleetlink_protocol::{TransactionError, TransactionReply, TransactionRequest};
use std::sync::Arc;

/// Registry reservation tied to the batch lifetime
#[derive(Debug)]
struct Reservation {
    registry: Arc<DeviceLockRegistry>,
    devices: Vec<DeviceId>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.registry.release_devices(&self.devices);
    }
}

#[derive(Debug)]
struct BatchParticipant {
    device: DeviceId,
    client: CoordinatorClient,
    handle: HandleId,
}

/// One owner's write transaction spanning several devices
#[derive(Debug)]
pub struct BatchTransaction {
    owner: SessionToken,
    participants: Vec<BatchParticipant>,
    _reservation: Reservation,
}

impl BatchTransaction {
    /// Reserve the device set and open a write transaction on every device
    ///
    /// Fails with [`TransactionError::LockConflict`] if the set overlaps an
    /// existing reservation, reserving nothing. If any per-device open
    /// fails, the handles opened so far are cancelled and the reservation
    /// released before the error is returned.
    pub async fn open(
        owner: SessionToken,
        clients: Vec<CoordinatorClient>,
        registry: Arc<DeviceLockRegistry>,
    ) -> Result<Self> {
        let devices: Vec<DeviceId> = clients.iter().map(|c| c.device().clone()).collect();

        registry
            .lock_devices(&devices)
            .map_err(|conflict| TransactionError::LockConflict {
                devices: conflict.devices,
            })?;
        let reservation = Reservation { registry, devices };

        let mut participants = Vec::with_capacity(clients.len());
        for client in clients {
            match client.open_transaction(owner, AccessMode::Write).await {
                Ok(handle) => participants.push(BatchParticipant {
                    device: client.device().clone(),
                    client,
                    handle,
                }),
                Err(e) => {
                    for opened in &participants {
                        let _ = opened.client.cancel(owner, opened.handle).await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            owner,
            participants,
            _reservation: reservation,
        })
    }

    /// Devices participating in this batch
    pub fn devices(&self) -> impl Iterator<Item = &DeviceId> {
        self.participants.iter().map(|p| &p.device)
    }

    /// Execute a data operation on one participating device
    pub async fn execute(
        &self,
        device: &DeviceId,
        request: TransactionRequest,
    ) -> Result<TransactionReply> {
        let participant = self
            .participants
            .iter()
            .find(|p| &p.device == device)
            .ok_or_else(|| TransactionError::invalid_state("device is not part of this batch"))?;

        participant
            .client
            .execute(self.owner, participant.handle, request)
            .await
    }

    /// Submit every participating device's transaction
    ///
    /// Devices are submitted in order; after the first failure the
    /// remaining, still-open transactions are cancelled and the failure
    /// returned.
    pub async fn submit(self) -> Result<()> {
        let mut first_failure = None;

        for participant in &self.participants {
            match first_failure {
                None => {
                    if let Err(e) = participant
                        .client
                        .submit(self.owner, participant.handle)
                        .await
                    {
                        first_failure = Some(e);
                    }
                }
                Some(_) => {
                    let _ = participant
                        .client
                        .cancel(self.owner, participant.handle)
                        .await;
                }
            }
        }

        match first_failure {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Cancel every participating device's transaction
    ///
    /// Returns `true` only if every backend reported a cancellation.
    pub async fn cancel(self) -> Result<bool> {
        let mut all_cancelled = true;
        let mut first_failure = None;

        for participant in &self.participants {
            match participant
                .client
                .cancel(self.owner, participant.handle)
                .await
            {
                Ok(cancelled) => all_cancelled &= cancelled,
                Err(e) => {
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        match first_failure {
            None => Ok(all_cancelled),
            Some(e) => Err(e),
        }
    }
}
