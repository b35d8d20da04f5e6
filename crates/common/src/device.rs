//! Device identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a managed remote device
///
/// Device identifiers are the key for mastership: exactly one cluster member
/// owns a device at a time, and all routing (request subjects, lock
/// reservations, ownership events) is keyed by this value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_inner() {
        let id = DeviceId::new("node-7");
        assert_eq!(id.to_string(), "node-7");
        assert_eq!(id.as_str(), "node-7");
    }

    #[test]
    fn test_usable_as_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(DeviceId::new("a"), 1);
        assert_eq!(map.get(&DeviceId::from("a")), Some(&1));
    }
}
