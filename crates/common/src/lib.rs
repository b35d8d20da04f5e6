//! Common types for fleetlink
//!
//! This crate defines:
//! - Device and session identity (`DeviceId`, `SessionToken`, `HandleId`)
//! - Datastore selection and edit semantics (`Datastore`, `EditStrategy`)
//! - Opaque data handles crossing the cluster boundary (`Path`, `Payload`)
//! - RPC result errors (`RpcError`)

mod datastore;
mod device;
mod edit;
mod path;
mod payload;
mod rpc;
mod token;

pub use datastore::Datastore;
pub use device::DeviceId;
pub use edit::{AccessMode, EditStrategy};
pub use path::Path;
pub use payload::Payload;
pub use rpc::{RpcError, RpcErrorSeverity};
pub use token::{HandleId, SessionToken};
