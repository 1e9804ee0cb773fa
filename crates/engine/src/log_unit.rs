//! Write-once in-memory log unit
//!
//! Stores one [`LogData`] per address and keeps a per-stream index of the
//! addresses holding entries of each stream, which is what stream-index
//! (Replex) readers query.

use async_trait::async_trait;
use parking_lot::Mutex;
use sharedlog_common::{
    Address, DataEntry, LogData, LogEntry, LogUnitService, ServiceError, ServiceResult, StreamId,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

#[derive(Default)]
struct LogUnitState {
    entries: BTreeMap<Address, LogData>,
    stream_index: HashMap<StreamId, BTreeSet<Address>>,
}

impl LogUnitState {
    fn claim(&mut self, address: Address, data: LogData) -> ServiceResult<()> {
        if self.entries.contains_key(&address) {
            return Err(ServiceError::Overwrite(address));
        }

        if let LogData::Data(entry) = &data {
            for stream in &entry.streams {
                self.stream_index.entry(*stream).or_default().insert(address);
            }
        }
        self.entries.insert(address, data);
        Ok(())
    }
}

fn range_after(after: Option<Address>, up_to: Address) -> (Bound<Address>, Bound<Address>) {
    let lower = match after {
        Some(after) => Bound::Excluded(after),
        None => Bound::Unbounded,
    };
    (lower, Bound::Included(up_to))
}

/// Log unit backed by an ordered map
pub struct MockLogUnit {
    state: Mutex<LogUnitState>,
}

impl MockLogUnit {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogUnitState::default()),
        }
    }

    /// Snapshot of the data at `address`
    pub fn get(&self, address: Address) -> Option<LogData> {
        self.state.lock().entries.get(&address).cloned()
    }

    /// Number of written addresses, holes included
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of holes
    pub fn holes(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|data| matches!(data, LogData::Hole))
            .count()
    }
}

impl Default for MockLogUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogUnitService for MockLogUnit {
    async fn write(&self, address: Address, entry: DataEntry) -> ServiceResult<()> {
        let result = self.state.lock().claim(address, LogData::Data(entry));
        if result.is_err() {
            tracing::trace!(%address, "write rejected: address already taken");
        }
        result
    }

    async fn fill_hole(&self, address: Address) -> ServiceResult<()> {
        let result = self.state.lock().claim(address, LogData::Hole);
        if result.is_ok() {
            tracing::debug!(%address, "hole filled");
        }
        result
    }

    async fn read(&self, address: Address) -> ServiceResult<Option<LogEntry>> {
        Ok(self
            .state
            .lock()
            .entries
            .get(&address)
            .map(|data| LogEntry::new(address, data.clone())))
    }

    async fn stream_addresses(
        &self,
        stream: StreamId,
        after: Option<Address>,
        up_to: Address,
    ) -> ServiceResult<Vec<Address>> {
        if after >= Some(up_to) {
            return Ok(Vec::new());
        }
        let state = self.state.lock();
        Ok(state
            .stream_index
            .get(&stream)
            .map(|index| index.range(range_after(after, up_to)).copied().collect())
            .unwrap_or_default())
    }

    async fn unwritten(
        &self,
        after: Option<Address>,
        up_to: Address,
    ) -> ServiceResult<Vec<Address>> {
        let state = self.state.lock();
        let first = Address::first_after(after);
        Ok((first.value()..=up_to.value())
            .map(Address::new)
            .filter(|address| !state.entries.contains_key(address))
            .collect())
    }
}
