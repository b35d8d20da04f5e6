//! Wire encoding of requests and replies
//!
//! Routing metadata (device, owner, handle, request id) travels in message
//! headers; the operation itself is the serialized body. Header names are
//! stable and shared by both sides of the boundary.

use crate::{TransactionError, TransactionReply, TransactionRequest};
use fleetlink_common::{DeviceId, HandleId, SessionToken};
use fleetlink_fabric::Message;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Header names used on the slave/master boundary
pub mod headers {
    pub const DEVICE: &str = "device";
    pub const OWNER: &str = "owner";
    pub const HANDLE: &str = "handle";
    pub const REQUEST_ID: &str = "request_id";
    pub const OP: &str = "op";
    pub const STATUS: &str = "status";
}

/// Errors that can occur when parsing messages
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid header {header}: {value}")]
    InvalidHeader {
        header: &'static str,
        value: String,
    },

    #[error("Invalid message body: {0}")]
    Body(String),
}

/// One request as it travels over the fabric
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// Target device
    pub device: DeviceId,
    /// Session issuing the request
    pub owner: SessionToken,
    /// Transaction handle, absent only for handle acquisition
    pub handle: Option<HandleId>,
    /// Correlates the reply with this request
    pub request_id: String,
    /// The operation itself
    pub request: TransactionRequest,
}

impl RequestEnvelope {
    /// Create an envelope with a fresh request id
    pub fn new(
        device: DeviceId,
        owner: SessionToken,
        handle: Option<HandleId>,
        request: TransactionRequest,
    ) -> Self {
        Self {
            device,
            owner,
            handle,
            request_id: Uuid::new_v4().to_string(),
            request,
        }
    }

    /// Convert to a raw message for sending
    pub fn into_message(self) -> Message {
        let mut hdrs = HashMap::new();
        hdrs.insert(headers::DEVICE.to_string(), self.device.to_string());
        hdrs.insert(headers::OWNER.to_string(), self.owner.to_string());
        hdrs.insert(headers::REQUEST_ID.to_string(), self.request_id);
        hdrs.insert(headers::OP.to_string(), self.request.kind().to_string());

        if let Some(handle) = self.handle {
            hdrs.insert(headers::HANDLE.to_string(), handle.to_string());
        }

        let body = serde_json::to_vec(&self.request).unwrap();
        Message::new(body, hdrs)
    }

    /// Parse an envelope from a raw message
    pub fn from_message(msg: Message) -> Result<Self, ParseError> {
        let device = msg
            .get_header(headers::DEVICE)
            .ok_or(ParseError::MissingHeader(headers::DEVICE))?;
        let device = DeviceId::from(device);

        let owner_str = msg
            .get_header(headers::OWNER)
            .ok_or(ParseError::MissingHeader(headers::OWNER))?;
        let owner = SessionToken::parse(owner_str).map_err(|_| ParseError::InvalidHeader {
            header: headers::OWNER,
            value: owner_str.to_string(),
        })?;

        let handle = match msg.get_header(headers::HANDLE) {
            Some(s) => Some(HandleId::parse(s).map_err(|_| ParseError::InvalidHeader {
                header: headers::HANDLE,
                value: s.to_string(),
            })?),
            None => None,
        };

        let request_id = msg
            .get_header(headers::REQUEST_ID)
            .ok_or(ParseError::MissingHeader(headers::REQUEST_ID))?
            .to_string();

        let request: TransactionRequest =
            serde_json::from_slice(&msg.body).map_err(|e| ParseError::Body(e.to_string()))?;

        Ok(Self {
            device,
            owner,
            handle,
            request_id,
            request,
        })
    }
}

/// Encode a reply for sending back over the fabric
pub fn encode_reply(request_id: &str, reply: &TransactionReply) -> Message {
    let mut hdrs = HashMap::new();
    hdrs.insert(headers::REQUEST_ID.to_string(), request_id.to_string());
    hdrs.insert(
        headers::STATUS.to_string(),
        if reply.is_failure() { "error" } else { "ok" }.to_string(),
    );

    let body = serde_json::to_vec(reply).unwrap();
    Message::new(body, hdrs)
}

/// Decode a reply received over the fabric
pub fn decode_reply(msg: &Message) -> Result<TransactionReply, ParseError> {
    serde_json::from_slice(&msg.body).map_err(|e| ParseError::Body(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlink_common::{Datastore, Path, Payload};
    use serde_json::json;

    #[test]
    fn test_request_envelope_roundtrip() {
        let owner = SessionToken::new();
        let handle = HandleId::new();
        let envelope = RequestEnvelope::new(
            DeviceId::new("edge-1"),
            owner,
            Some(handle),
            TransactionRequest::Put {
                store: Datastore::Configuration,
                path: Path::from("/a"),
                payload: Payload::new(json!({"x": 1})),
            },
        );
        let request_id = envelope.request_id.clone();

        let decoded = RequestEnvelope::from_message(envelope.into_message()).unwrap();
        assert_eq!(decoded.device, DeviceId::new("edge-1"));
        assert_eq!(decoded.owner, owner);
        assert_eq!(decoded.handle, Some(handle));
        assert_eq!(decoded.request_id, request_id);
        assert!(matches!(decoded.request, TransactionRequest::Put { .. }));
    }

    #[test]
    fn test_handle_header_is_optional() {
        let envelope = RequestEnvelope::new(
            DeviceId::new("edge-2"),
            SessionToken::new(),
            None,
            TransactionRequest::NewWriteTransaction,
        );

        let msg = envelope.into_message();
        assert_eq!(msg.get_header(headers::HANDLE), None);
        assert_eq!(msg.get_header(headers::OP), Some("new_write_transaction"));

        let decoded = RequestEnvelope::from_message(msg).unwrap();
        assert_eq!(decoded.handle, None);
    }

    #[test]
    fn test_missing_owner_header_is_rejected() {
        let mut msg = RequestEnvelope::new(
            DeviceId::new("edge-3"),
            SessionToken::new(),
            None,
            TransactionRequest::NewReadTransaction,
        )
        .into_message();
        msg.headers.remove(headers::OWNER);

        let err = RequestEnvelope::from_message(msg).unwrap_err();
        assert!(matches!(err, ParseError::MissingHeader(headers::OWNER)));
    }

    #[test]
    fn test_reply_codec_preserves_failure_cause() {
        let reply = TransactionReply::failure(TransactionError::InUse {
            device: DeviceId::new("edge-4"),
        });

        let msg = encode_reply("req-1", &reply);
        assert_eq!(msg.get_header(headers::STATUS), Some("error"));
        assert_eq!(msg.get_header(headers::REQUEST_ID), Some("req-1"));

        let decoded = decode_reply(&msg).unwrap();
        assert_eq!(decoded, reply);
    }
}
