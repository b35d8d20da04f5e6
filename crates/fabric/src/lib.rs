//! In-process cluster fabric for fleetlink
//!
//! Provides the transport seam the transaction proxy rides on: subject-
//! addressed request/reply with explicit handler lifecycle, plus pub/sub
//! for control-plane events. Messages carry opaque serialized bodies and
//! string headers, matching the production fabric's wire shape.

use thiserror::Error;

mod client;
mod fabric;
mod message;

pub use client::{FabricClient, SubscriptionStream};
pub use fabric::{ClusterFabric, HandlerRequests};
pub use message::Message;

/// Fabric errors
#[derive(Debug, Clone, Error)]
pub enum FabricError {
    #[error("No handler for subject: {0}")]
    HandlerGone(String),

    #[error("Channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, FabricError>;
