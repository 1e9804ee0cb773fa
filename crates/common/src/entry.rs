//! Log entries
//!
//! Every address in the log ends up holding exactly one [`LogData`]: either a
//! hole written to keep the total order gap-free, or a data entry claimed
//! through a token. Entries are immutable once written.

use crate::{Address, Backpointers, StreamAddresses, StreamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What an entry carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Opaque application bytes
    Data(Vec<u8>),
    /// The stream's history up to this entry is the source stream's history
    /// truncated at `timestamp`
    StreamCopy { source: StreamId, timestamp: Address },
}

/// A claimed entry and the token metadata it was written with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub streams: BTreeSet<StreamId>,
    pub backpointers: Backpointers,
    pub stream_addresses: StreamAddresses,
    pub payload: Payload,
}

/// Contents of one log address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogData {
    Hole,
    Data(DataEntry),
}

/// A durable record at a global address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub data: LogData,
}

impl LogEntry {
    pub fn new(address: Address, data: LogData) -> Self {
        Self { address, data }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self.data, LogData::Hole)
    }

    /// Whether the entry was written to `stream`
    pub fn belongs_to(&self, stream: StreamId) -> bool {
        match &self.data {
            LogData::Data(entry) => entry.streams.contains(&stream),
            LogData::Hole => false,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.data {
            LogData::Data(entry) => Some(&entry.payload),
            LogData::Hole => None,
        }
    }

    /// Application bytes, if this is an ordinary data entry
    pub fn data_bytes(&self) -> Option<&[u8]> {
        match self.payload() {
            Some(Payload::Data(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Previous entry of `stream` as recorded by the token that created this one
    pub fn backpointer(&self, stream: StreamId) -> Option<Address> {
        match &self.data {
            LogData::Data(entry) => entry.backpointers.get(&stream).copied().flatten(),
            LogData::Hole => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn data_entry(stream: StreamId, backpointer: Option<Address>) -> LogData {
        LogData::Data(DataEntry {
            streams: BTreeSet::from([stream]),
            backpointers: HashMap::from([(stream, backpointer)]),
            stream_addresses: HashMap::new(),
            payload: Payload::Data(b"payload".to_vec()),
        })
    }

    #[test]
    fn test_membership_and_backpointers() {
        let a = StreamId::from_name("a");
        let b = StreamId::from_name("b");
        let entry = LogEntry::new(Address::new(5), data_entry(a, Some(Address::new(2))));

        assert!(entry.belongs_to(a));
        assert!(!entry.belongs_to(b));
        assert_eq!(entry.backpointer(a), Some(Address::new(2)));
        assert_eq!(entry.backpointer(b), None);
        assert_eq!(entry.data_bytes(), Some(&b"payload"[..]));
    }

    #[test]
    fn test_holes_belong_to_nothing() {
        let hole = LogEntry::new(Address::new(1), LogData::Hole);
        assert!(hole.is_hole());
        assert!(!hole.belongs_to(StreamId::from_name("a")));
        assert!(hole.payload().is_none());
    }

    #[test]
    fn test_copy_marker_has_no_data_bytes() {
        let a = StreamId::from_name("a");
        let entry = LogEntry::new(
            Address::new(3),
            LogData::Data(DataEntry {
                streams: BTreeSet::from([a]),
                backpointers: HashMap::from([(a, None)]),
                stream_addresses: HashMap::new(),
                payload: Payload::StreamCopy {
                    source: StreamId::from_name("b"),
                    timestamp: Address::new(2),
                },
            }),
        );
        assert!(entry.data_bytes().is_none());

        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(serde_json::from_str::<LogEntry>(&json).unwrap(), entry);
    }
}
