//! Data-tree paths

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path into a device's data tree
///
/// Opaque to this subsystem: the schema layer assigns meaning to the
/// segments. Paths are plain values, cheap to clone and safe to replay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(String);

impl Path {
    /// Create a path from its string form
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Root path
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
