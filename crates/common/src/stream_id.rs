//! Stream identifiers
//!
//! A stream is a logical sub-sequence of the shared log, named by a 128-bit
//! UUID. Streams are never declared up front: any identifier can be appended
//! to or read from.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a stream multiplexed into the shared log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Generate a fresh random stream ID
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a stable stream ID from a human readable name
    ///
    /// The same name always maps to the same stream, so independent clients
    /// can agree on a stream without coordinating.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid stream ID: {}", e))
    }

    /// Short form used in log lines
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
