//! Shared helpers for runtime integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sharedlog_common::{
    Address, ConflictInfo, DataEntry, LogEntry, LogUnitService, SequencerService, ServiceResult,
    StreamId, StreamTails, TokenResponse,
};
use sharedlog_engine::{MockEngine, MockLogUnit, MockSequencer};
use sharedlog_runtime::{LogRuntime, RuntimeConfig};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Readers give up on unwritten addresses quickly in tests
pub fn test_config() -> RuntimeConfig {
    RuntimeConfig::new()
        .with_hole_fill_retries(3)
        .with_hole_fill_wait(Duration::from_millis(2))
}

pub fn runtime(engine: &MockEngine) -> LogRuntime {
    LogRuntime::with_config(
        engine.sequencer.clone(),
        engine.log_unit.clone(),
        engine.layout.clone(),
        test_config(),
    )
}

pub fn streams(names: &[&str]) -> BTreeSet<StreamId> {
    names.iter().map(|name| StreamId::from_name(name)).collect()
}

/// Log unit where a racing reader hole-fills the first `races` written
/// addresses just before the writer gets there
pub struct RacingLogUnit {
    inner: Arc<MockLogUnit>,
    races: AtomicUsize,
}

impl RacingLogUnit {
    pub fn new(inner: Arc<MockLogUnit>, races: usize) -> Self {
        Self {
            inner,
            races: AtomicUsize::new(races),
        }
    }

    fn take_race(&self) -> bool {
        self.races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LogUnitService for RacingLogUnit {
    async fn write(&self, address: Address, entry: DataEntry) -> ServiceResult<()> {
        if self.take_race() {
            self.inner.fill_hole(address).await?;
        }
        self.inner.write(address, entry).await
    }

    async fn fill_hole(&self, address: Address) -> ServiceResult<()> {
        self.inner.fill_hole(address).await
    }

    async fn read(&self, address: Address) -> ServiceResult<Option<LogEntry>> {
        self.inner.read(address).await
    }

    async fn stream_addresses(
        &self,
        stream: StreamId,
        after: Option<Address>,
        up_to: Address,
    ) -> ServiceResult<Vec<Address>> {
        self.inner.stream_addresses(stream, after, up_to).await
    }

    async fn unwritten(
        &self,
        after: Option<Address>,
        up_to: Address,
    ) -> ServiceResult<Vec<Address>> {
        self.inner.unwritten(after, up_to).await
    }
}

/// Sequencer that records the snapshot of every conflict-checked request
pub struct RecordingSequencer {
    inner: Arc<MockSequencer>,
    snapshots: Mutex<Vec<Option<Address>>>,
}

impl RecordingSequencer {
    pub fn new(inner: Arc<MockSequencer>) -> Self {
        Self {
            inner,
            snapshots: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshots(&self) -> Vec<Option<Address>> {
        self.snapshots.lock().clone()
    }
}

#[async_trait]
impl SequencerService for RecordingSequencer {
    async fn next_token(
        &self,
        streams: &BTreeSet<StreamId>,
        count: u64,
        conflict: Option<&ConflictInfo>,
    ) -> ServiceResult<TokenResponse> {
        if let Some(conflict) = conflict {
            self.snapshots.lock().push(conflict.snapshot);
        }
        self.inner.next_token(streams, count, conflict).await
    }

    async fn query(&self, streams: &BTreeSet<StreamId>) -> ServiceResult<StreamTails> {
        self.inner.query(streams).await
    }
}

/// Runtime whose writes lose `races` races and whose sequencer records
/// conflict snapshots
pub fn racing_runtime(engine: &MockEngine, races: usize) -> (LogRuntime, Arc<RecordingSequencer>) {
    let sequencer = Arc::new(RecordingSequencer::new(engine.sequencer.clone()));
    let log_unit = Arc::new(RacingLogUnit::new(engine.log_unit.clone(), races));
    let runtime = LogRuntime::with_config(
        sequencer.clone(),
        log_unit,
        engine.layout.clone(),
        test_config(),
    );
    (runtime, sequencer)
}
