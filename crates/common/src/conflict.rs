//! Conflict resolution info for optimistic transactions
//!
//! A transaction reads at a snapshot address and accumulates the parts of
//! each stream it read and wrote. The sequencer compares those footprints
//! against the writes it issued after the snapshot and vetoes the commit
//! token when they overlap.

use crate::{Address, StreamId, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// The part of a stream touched by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Footprint {
    /// The whole stream (e.g. a full scan or a clear)
    Stream,
    /// A set of opaque conflict keys within the stream
    Keys(BTreeSet<Vec<u8>>),
}

impl Footprint {
    /// Footprint of a single key
    pub fn key(key: impl Into<Vec<u8>>) -> Self {
        Footprint::Keys(BTreeSet::from([key.into()]))
    }

    pub fn is_whole_stream(&self) -> bool {
        matches!(self, Footprint::Stream)
    }

    /// Widen this footprint to also cover `other`
    pub fn merge(&mut self, other: Footprint) {
        match (self, other) {
            (Footprint::Stream, _) => {}
            (this, Footprint::Stream) => *this = Footprint::Stream,
            (Footprint::Keys(mine), Footprint::Keys(theirs)) => mine.extend(theirs),
        }
    }
}

/// Why the sequencer refused a transaction's token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortCause {
    /// A conflicting write was issued after the snapshot
    Conflict,
    /// The sequencer failed over after the snapshot was taken
    NewSequencer,
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortCause::Conflict => write!(f, "conflict"),
            AbortCause::NewSequencer => write!(f, "new sequencer"),
        }
    }
}

/// Metadata the sequencer uses to detect conflicting transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub transaction_id: TransactionId,
    /// Address as of which the transaction's reads are valid
    pub snapshot: Option<Address>,
    pub read_set: HashMap<StreamId, Footprint>,
    pub write_set: HashMap<StreamId, Footprint>,
}

impl ConflictInfo {
    pub fn new(transaction_id: TransactionId, snapshot: Option<Address>) -> Self {
        Self {
            transaction_id,
            snapshot,
            read_set: HashMap::new(),
            write_set: HashMap::new(),
        }
    }

    pub fn record_read(&mut self, stream: StreamId, footprint: Footprint) {
        merge_into(&mut self.read_set, stream, footprint);
    }

    pub fn record_write(&mut self, stream: StreamId, footprint: Footprint) {
        merge_into(&mut self.write_set, stream, footprint);
    }

    /// Same footprints, checked from a later snapshot
    pub fn with_snapshot(&self, snapshot: Option<Address>) -> Self {
        Self {
            snapshot,
            ..self.clone()
        }
    }

    /// All read and write footprints
    pub fn footprints(&self) -> impl Iterator<Item = (&StreamId, &Footprint)> {
        self.read_set.iter().chain(self.write_set.iter())
    }

    /// Streams written by the transaction, in a deterministic order
    pub fn written_streams(&self) -> BTreeSet<StreamId> {
        self.write_set.keys().copied().collect()
    }
}

fn merge_into(set: &mut HashMap<StreamId, Footprint>, stream: StreamId, footprint: Footprint) {
    match set.get_mut(&stream) {
        Some(existing) => existing.merge(footprint),
        None => {
            set.insert(stream, footprint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprint_merge() {
        let mut fp = Footprint::key(b"a".to_vec());
        fp.merge(Footprint::key(b"b".to_vec()));
        assert_eq!(
            fp,
            Footprint::Keys(BTreeSet::from([b"a".to_vec(), b"b".to_vec()]))
        );

        fp.merge(Footprint::Stream);
        assert!(fp.is_whole_stream());

        fp.merge(Footprint::key(b"c".to_vec()));
        assert!(fp.is_whole_stream());
    }

    #[test]
    fn test_record_merges_per_stream() {
        let s = StreamId::from_name("s");
        let mut info = ConflictInfo::new(TransactionId::new(), None);
        info.record_read(s, Footprint::key(b"a".to_vec()));
        info.record_read(s, Footprint::key(b"b".to_vec()));
        info.record_write(s, Footprint::Stream);

        assert_eq!(info.read_set.len(), 1);
        assert!(info.write_set[&s].is_whole_stream());
        assert_eq!(info.footprints().count(), 2);
        assert_eq!(info.written_streams(), BTreeSet::from([s]));
    }

    #[test]
    fn test_with_snapshot_keeps_footprints() {
        let s = StreamId::from_name("s");
        let mut info = ConflictInfo::new(TransactionId::new(), Some(Address::new(3)));
        info.record_write(s, Footprint::key(b"k".to_vec()));

        let advanced = info.with_snapshot(Some(Address::new(7)));
        assert_eq!(advanced.snapshot, Some(Address::new(7)));
        assert_eq!(advanced.write_set, info.write_set);
        assert_eq!(advanced.transaction_id, info.transaction_id);
        assert_eq!(info.snapshot, Some(Address::new(3)));
    }
}
