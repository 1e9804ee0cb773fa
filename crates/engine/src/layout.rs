//! Layout service holding a single mutable layout

use async_trait::async_trait;
use parking_lot::Mutex;
use sharedlog_common::{Layout, LayoutService, ReplicationMode, ServiceResult};

pub struct MockLayout {
    layout: Mutex<Layout>,
}

impl MockLayout {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout: Mutex::new(layout),
        }
    }

    pub fn current(&self) -> Layout {
        self.layout.lock().clone()
    }

    /// Switch the active segment's replication mode in place
    pub fn set_replication_mode(&self, mode: ReplicationMode) {
        let mut layout = self.layout.lock();
        if let Some(segment) = layout.segments.last_mut() {
            segment.replication_mode = mode;
        }
        layout.epoch += 1;
        tracing::info!(?mode, epoch = layout.epoch, "replication mode switched");
    }
}

impl Default for MockLayout {
    fn default() -> Self {
        Self::new(Layout::default())
    }
}

#[async_trait]
impl LayoutService for MockLayout {
    async fn layout(&self) -> ServiceResult<Layout> {
        Ok(self.current())
    }
}
