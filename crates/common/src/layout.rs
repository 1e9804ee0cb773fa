//! Cluster layout as seen by clients
//!
//! Only the part of the layout the client core needs: the epoch and the
//! replication mode of each log segment.

use crate::Address;
use serde::{Deserialize, Serialize};

/// How a log segment is replicated; selects the stream reading strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicationMode {
    ChainReplication,
    QuorumReplication,
    /// Entries are also kept in per-stream order by the log units
    Replex,
}

/// A contiguous range of the log starting at `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Address,
    pub replication_mode: ReplicationMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub epoch: u64,
    /// Segments ordered by start address
    pub segments: Vec<Segment>,
}

impl Layout {
    /// A single segment covering the whole log
    pub fn new(replication_mode: ReplicationMode) -> Self {
        Self {
            epoch: 0,
            segments: vec![Segment {
                start: Address::new(0),
                replication_mode,
            }],
        }
    }

    /// Replication mode of the active (last) segment
    pub fn replication_mode(&self) -> ReplicationMode {
        self.segments
            .last()
            .map(|segment| segment.replication_mode)
            .unwrap_or(ReplicationMode::ChainReplication)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(ReplicationMode::ChainReplication)
    }
}
