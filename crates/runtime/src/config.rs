//! Runtime configuration

use std::time::Duration;

/// Configuration for a [`LogRuntime`](crate::LogRuntime)
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Extra reads of an unwritten address before a reader hole-fills it
    pub hole_fill_retries: u32,

    /// Wait between those reads
    pub hole_fill_wait: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            hole_fill_retries: 10,
            hole_fill_wait: Duration::from_millis(5),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of re-reads before hole filling
    pub fn with_hole_fill_retries(mut self, retries: u32) -> Self {
        self.hole_fill_retries = retries;
        self
    }

    /// Set the wait between re-reads
    pub fn with_hole_fill_wait(mut self, wait: Duration) -> Self {
        self.hole_fill_wait = wait;
        self
    }
}
