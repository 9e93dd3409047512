//! Units of work handled by the processing lane.

use std::path::PathBuf;
use std::time::Instant;

/// Lifecycle of one [`FileTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Attempting,
    Retrying,
    Succeeded,
    Failed,
}

/// A file reported by the startup scan or the live watch.
#[derive(Debug, Clone)]
pub struct FileTask {
    /// Absolute path under the watch root.
    pub source: PathBuf,
    /// Path relative to the watch root; identifies the task.
    pub relative: PathBuf,
    /// Retries made so far.
    pub attempts: u32,
    pub first_seen: Instant,
    pub state: TaskState,
}

impl FileTask {
    pub fn new(source: PathBuf, relative: PathBuf) -> Self {
        Self {
            source,
            relative,
            attempts: 0,
            first_seen: Instant::now(),
            state: TaskState::Pending,
        }
    }

    /// Number of times the processor has been (or is being) called.
    pub fn evaluations(&self) -> u32 {
        self.attempts + 1
    }
}
