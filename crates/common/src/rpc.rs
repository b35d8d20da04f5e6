//! RPC invocation result errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an error reported by a device RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcErrorSeverity {
    Warning,
    Error,
}

/// One error entry from a device RPC result
///
/// RPCs can succeed partially; the reply carries the full error list rather
/// than collapsing it into a single failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub severity: RpcErrorSeverity,
    pub tag: String,
    pub message: String,
}

impl RpcError {
    /// Create an error-severity entry
    pub fn error(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: RpcErrorSeverity::Error,
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Create a warning-severity entry
    pub fn warning(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: RpcErrorSeverity::Warning,
            tag: tag.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag, self.message)
    }
}
