//! Datastore selection for device operations

use serde::{Deserialize, Serialize};

/// Which logical store on the device an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datastore {
    /// Intended configuration (writable)
    Configuration,
    /// Live operational state (read-only)
    Operational,
}

impl Datastore {
    /// Parse from string header value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "configuration" => Some(Self::Configuration),
            "operational" => Some(Self::Operational),
            _ => None,
        }
    }

    /// Convert to string header value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Operational => "operational",
        }
    }
}
