//! Slave-side transaction proxy
//!
//! A cluster member that does not own a device still exposes the full
//! transaction surface for it. Every call is translated into a protocol
//! request, forwarded to the resolved master over the fabric, and completed
//! from the reply — callers cannot tell it apart from a local transaction,
//! except that mastership loss fails their futures fast instead of hanging.

use fleetlink_protocol::TransactionError;

mod link;
mod proxy;
mod transaction;

pub use link::MasterLink;
pub use proxy::SlaveProxy;
pub use transaction::{RpcResponse, SlaveTransaction};

/// Result type for proxy operations
pub type Result<T> = std::result::Result<T, TransactionError>;
