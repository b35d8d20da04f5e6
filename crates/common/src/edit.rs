//! Edit semantics and transaction access modes

use serde::{Deserialize, Serialize};

/// How an edit applies to nodes not explicitly named in the payload
///
/// Carried on the wire with every edit request so the coordinator never has
/// to inspect payload content to decide behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditStrategy {
    /// Merge the payload into existing data
    Merge,
    /// Replace the targeted subtree wholesale
    Replace,
    /// Create; fails if the target already exists
    Create,
    /// Delete; fails if the target is absent
    Delete,
    /// Remove; succeeds whether or not the target exists
    Remove,
}

impl EditStrategy {
    /// Parse from string header value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "merge" => Some(Self::Merge),
            "replace" => Some(Self::Replace),
            "create" => Some(Self::Create),
            "delete" => Some(Self::Delete),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }

    /// Convert to string header value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Remove => "remove",
        }
    }
}

/// Access mode recorded on a transaction handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// Reads only; edit and lock operations are rejected
    Read,
    /// Full read-write access
    Write,
}

impl AccessMode {
    /// Whether this mode permits edits, locking and submit
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write)
    }
}
