//! Message protocol between slave proxies and the master endpoint
//!
//! Every request is self-contained (store, path and payload travel with the
//! message, never ambient state) and safe to serialize and replay. Every
//! reply is either a value reply or a typed failure cause — transport-level
//! exceptions never cross the cluster boundary bare.

mod envelope;
mod error;
mod messages;

pub use envelope::{ParseError, RequestEnvelope, decode_reply, encode_reply, headers};
pub use error::{BackendError, TransactionError};
pub use messages::{TransactionReply, TransactionRequest};
