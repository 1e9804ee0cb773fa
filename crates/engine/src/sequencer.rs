//! In-memory sequencer
//!
//! Hands out addresses from a single counter, tracks the last address issued
//! to every stream (backpointers) and keeps enough write history to answer
//! conflict checks for optimistic transactions.

use async_trait::async_trait;
use parking_lot::Mutex;
use sharedlog_common::{
    Address, ConflictInfo, Footprint, SequencerService, ServiceError, ServiceResult, StreamId,
    StreamTails, TokenResponse,
};
use std::collections::{BTreeSet, HashMap};

/// Sequencer state, serialized behind one lock
#[derive(Default)]
struct SequencerState {
    epoch: u64,

    /// Next address to hand out
    next_address: u64,

    /// Last address issued before the current epoch began; the conflict
    /// history below knows nothing at or before it
    history_floor: Option<Address>,

    /// Last address issued to each stream
    stream_tails: HashMap<StreamId, Address>,

    /// Legacy stream-local counters
    stream_offsets: HashMap<StreamId, u64>,

    /// Last address issued to each stream by a write with a whole-stream or
    /// unknown footprint
    wide_tails: HashMap<StreamId, Address>,

    /// Last address issued per key by transactional writes
    key_tails: HashMap<StreamId, HashMap<Vec<u8>, Address>>,
}

impl SequencerState {
    fn last_issued(&self) -> Option<Address> {
        self.next_address.checked_sub(1).map(Address::new)
    }

    /// Greatest address issued after the snapshot that overlaps the
    /// transaction's footprints
    fn conflicting_address(&self, conflict: &ConflictInfo) -> Option<Address> {
        conflict
            .footprints()
            .filter_map(|(stream, footprint)| {
                self.footprint_conflict(*stream, footprint, conflict.snapshot)
            })
            .max()
    }

    fn footprint_conflict(
        &self,
        stream: StreamId,
        footprint: &Footprint,
        snapshot: Option<Address>,
    ) -> Option<Address> {
        let after_snapshot = |address: Option<&Address>| {
            address.copied().filter(|address| Some(*address) > snapshot)
        };

        let wide = after_snapshot(self.wide_tails.get(&stream));
        let narrow = match footprint {
            Footprint::Stream => after_snapshot(self.stream_tails.get(&stream)),
            Footprint::Keys(keys) => {
                let tails = self.key_tails.get(&stream);
                keys.iter()
                    .filter_map(|key| after_snapshot(tails.and_then(|tails| tails.get(key))))
                    .max()
            }
        };

        wide.max(narrow)
    }

    fn issue(
        &mut self,
        streams: &BTreeSet<StreamId>,
        count: u64,
        conflict: Option<&ConflictInfo>,
    ) -> TokenResponse {
        let first = Address::new(self.next_address);
        let last = first.offset(count - 1);
        self.next_address += count;

        let mut backpointers = HashMap::with_capacity(streams.len());
        let mut stream_addresses = HashMap::with_capacity(streams.len());
        for stream in streams {
            backpointers.insert(*stream, self.stream_tails.insert(*stream, last));

            let offset = self.stream_offsets.entry(*stream).or_insert(0);
            stream_addresses.insert(*stream, *offset);
            *offset += count;

            // Writes without a declared key footprint conflict with everything
            let declared = conflict.and_then(|conflict| conflict.write_set.get(stream));
            match declared {
                Some(Footprint::Keys(keys)) => {
                    let tails = self.key_tails.entry(*stream).or_default();
                    for key in keys {
                        tails.insert(key.clone(), last);
                    }
                }
                Some(Footprint::Stream) | None => {
                    self.wide_tails.insert(*stream, last);
                }
            }
        }

        TokenResponse::normal(first, self.epoch, backpointers, stream_addresses)
    }
}

/// Sequencer that keeps all state in memory
pub struct MockSequencer {
    state: Mutex<SequencerState>,
}

impl MockSequencer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SequencerState::default()),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Last address handed out
    pub fn tail(&self) -> Option<Address> {
        self.state.lock().last_issued()
    }

    /// Simulate a new sequencer taking over
    ///
    /// Tails survive (a real replacement rebuilds them from the log) but the
    /// conflict history does not, so transactions whose snapshot predates the
    /// takeover are refused with a new-sequencer abort.
    pub fn fail_over(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.history_floor = state.last_issued();
        state.wide_tails.clear();
        state.key_tails.clear();
        tracing::info!(
            epoch = state.epoch,
            floor = ?state.history_floor,
            "sequencer failed over"
        );
    }

    /// Issue (or refuse) a token
    pub fn issue(
        &self,
        streams: &BTreeSet<StreamId>,
        count: u64,
        conflict: Option<&ConflictInfo>,
    ) -> ServiceResult<TokenResponse> {
        if count == 0 {
            return Err(ServiceError::InvalidRequest(
                "token count must be positive".to_string(),
            ));
        }

        let mut state = self.state.lock();
        if let Some(conflict) = conflict {
            if conflict.snapshot < state.history_floor {
                tracing::debug!(
                    txn = %conflict.transaction_id,
                    snapshot = ?conflict.snapshot,
                    "refusing token: snapshot predates sequencer epoch {}",
                    state.epoch
                );
                return Ok(TokenResponse::new_sequencer(state.epoch));
            }

            if let Some(conflicting) = state.conflicting_address(conflict) {
                tracing::debug!(
                    txn = %conflict.transaction_id,
                    snapshot = ?conflict.snapshot,
                    %conflicting,
                    "refusing token: conflicting write"
                );
                return Ok(TokenResponse::conflict(conflicting, state.epoch));
            }
        }

        Ok(state.issue(streams, count, conflict))
    }

    pub fn tails(&self, streams: &BTreeSet<StreamId>) -> StreamTails {
        let state = self.state.lock();
        StreamTails {
            epoch: state.epoch,
            global: state.last_issued(),
            streams: streams
                .iter()
                .map(|stream| (*stream, state.stream_tails.get(stream).copied()))
                .collect(),
        }
    }
}

impl Default for MockSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SequencerService for MockSequencer {
    async fn next_token(
        &self,
        streams: &BTreeSet<StreamId>,
        count: u64,
        conflict: Option<&ConflictInfo>,
    ) -> ServiceResult<TokenResponse> {
        self.issue(streams, count, conflict)
    }

    async fn query(&self, streams: &BTreeSet<StreamId>) -> ServiceResult<StreamTails> {
        Ok(self.tails(streams))
    }
}
