//! Opaque structured-data payloads

use serde::{Deserialize, Serialize};

/// Structured data crossing the slave/master boundary
///
/// The schema/codec layer owns the actual shape; here a payload is an
/// immutable value that serializes stably and moves across the wire without
/// interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload(serde_json::Value);

impl Payload {
    /// Wrap a structured value
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the structured value
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Unwrap into the structured value
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
