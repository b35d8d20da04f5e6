//! Master-side transaction coordination
//!
//! The cluster member owning a device runs one [`DeviceCoordinator`] for
//! it: a single-mailbox actor enforcing that at most one backend
//! transaction is open per device, that only the recorded owner can drive
//! it, and that submit and cancel reach the backend exactly once. Batches
//! spanning several devices reserve the whole set in the
//! [`fleetlink_locks::DeviceLockRegistry`] first.

use fleetlink_protocol::TransactionError;

mod backend;
mod batch;
mod coordinator;
mod handle;
pub mod testing;

pub use backend::{BackendTransaction, DeviceBackend, EditRequest, RpcOutcome};
pub use batch::BatchTransaction;
pub use coordinator::{CoordinatorClient, DeviceCoordinator};
pub use handle::{HandleState, TransactionHandle};

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, TransactionError>;
