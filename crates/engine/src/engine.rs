//! Bundle of in-memory services
//!
//! Clients hold the services as trait objects; tests keep the concrete
//! handles to inspect the log or to simulate a sequencer fail-over.

use crate::{MockLayout, MockLogUnit, MockSequencer};
use sharedlog_common::{Layout, ReplicationMode};
use std::sync::Arc;

/// Sequencer, log unit and layout service sharing one process
#[derive(Clone)]
pub struct MockEngine {
    pub sequencer: Arc<MockSequencer>,
    pub log_unit: Arc<MockLogUnit>,
    pub layout: Arc<MockLayout>,
}

impl MockEngine {
    /// Engine with a chain-replicated layout
    pub fn new() -> Self {
        Self::with_replication_mode(ReplicationMode::ChainReplication)
    }

    pub fn with_replication_mode(mode: ReplicationMode) -> Self {
        Self {
            sequencer: Arc::new(MockSequencer::new()),
            log_unit: Arc::new(MockLogUnit::new()),
            layout: Arc::new(MockLayout::new(Layout::new(mode))),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}
