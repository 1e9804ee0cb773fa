//! Runtime handle
//!
//! Holds the service handles and configuration shared by every view. Cloning
//! is cheap; all clones talk to the same services.

use crate::{AddressSpaceView, MultiStreamView, Result, RuntimeConfig, SequencerView};
use sharedlog_common::{Layout, LayoutService, LogUnitService, SequencerService};
use std::sync::Arc;

struct RuntimeInner {
    sequencer: Arc<dyn SequencerService>,
    log_unit: Arc<dyn LogUnitService>,
    layout: Arc<dyn LayoutService>,
    config: RuntimeConfig,
}

/// Entry point of the client core
#[derive(Clone)]
pub struct LogRuntime {
    inner: Arc<RuntimeInner>,
}

impl LogRuntime {
    pub fn new(
        sequencer: Arc<dyn SequencerService>,
        log_unit: Arc<dyn LogUnitService>,
        layout: Arc<dyn LayoutService>,
    ) -> Self {
        Self::with_config(sequencer, log_unit, layout, RuntimeConfig::default())
    }

    pub fn with_config(
        sequencer: Arc<dyn SequencerService>,
        log_unit: Arc<dyn LogUnitService>,
        layout: Arc<dyn LayoutService>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                sequencer,
                log_unit,
                layout,
                config,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Sequencer client
    pub fn sequencer(&self) -> SequencerView {
        SequencerView::new(self.clone())
    }

    /// Address-space reads and writes
    pub fn address_space(&self) -> AddressSpaceView {
        AddressSpaceView::new(self.clone())
    }

    /// Appends, stream copies and stream views
    pub fn streams(&self) -> MultiStreamView {
        MultiStreamView::new(self.clone())
    }

    pub async fn layout(&self) -> Result<Layout> {
        Ok(self.inner.layout.layout().await?)
    }

    pub(crate) fn sequencer_service(&self) -> &dyn SequencerService {
        self.inner.sequencer.as_ref()
    }

    pub(crate) fn log_unit_service(&self) -> &dyn LogUnitService {
        self.inner.log_unit.as_ref()
    }
}
