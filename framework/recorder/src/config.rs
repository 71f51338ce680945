use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where run records are written and how eagerly the writer flushes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Each run gets its own directory under here, named by the run id.
    pub results_dir: PathBuf,
    /// Flush the write buffer after this many events.
    pub flush_every_events: usize,
    /// Flush the write buffer at least this often while events are pending.
    pub flush_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            flush_every_events: 1024,
            flush_interval_ms: 1000,
        }
    }
}

impl RecorderConfig {
    pub fn with_results_dir(mut self, results_dir: impl Into<PathBuf>) -> Self {
        self.results_dir = results_dir.into();
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }
}
