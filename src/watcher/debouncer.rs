//! Debouncing and duplicate suppression for file arrival events.
//!
//! A single write usually produces a burst of events (create, several
//! modifies, close). The debouncer waits until a path has been quiet for
//! the configured duration, and remembers recently emitted paths so a late
//! event for the same write is not reported twice. A path that leaves the
//! tree is forgotten, so a new file reusing its name is reported again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Debounces file events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> last event timestamp.
    pending: HashMap<PathBuf, Instant>,
    /// Recently emitted paths: path -> emission timestamp.
    emitted: HashMap<PathBuf, Instant>,
    /// How long a path must be quiet before it is ready.
    duration: Duration,
    /// How long an emitted path is suppressed.
    duplicate_window: Duration,
}

impl Debouncer {
    /// Create a debouncer with durations in milliseconds.
    pub fn new(debounce_ms: u64, duplicate_window_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            emitted: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
            duplicate_window: Duration::from_millis(duplicate_window_ms),
        }
    }

    /// Record an event for `path`, resetting its quiet timer.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    /// Forget `path` and everything beneath it: pending changes and
    /// emission history alike. Called when it is deleted or renamed away.
    pub fn forget(&mut self, path: &Path) {
        self.pending.retain(|pending, _| !pending.starts_with(path));
        self.emitted.retain(|emitted, _| !emitted.starts_with(path));
    }

    /// Take all paths that have been quiet for the debounce duration.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, last_change| {
            if now.duration_since(*last_change) >= self.duration {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        let window = self.duplicate_window;
        self.emitted
            .retain(|_, emitted_at| now.duration_since(*emitted_at) < window);

        ready.sort();
        ready
    }

    /// Mark `path` as emitted. Returns `false` if it was already emitted
    /// within the duplicate window, in which case it should be dropped.
    pub fn mark_emitted(&mut self, path: &Path) -> bool {
        let now = Instant::now();
        if let Some(previous) = self.emitted.get(path) {
            if now.duration_since(*previous) < self.duplicate_window {
                return false;
            }
        }
        self.emitted.insert(path.to_path_buf(), now);
        true
    }

    /// Check if there are any pending changes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Get the number of pending changes.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_debouncer_basic() {
        let mut debouncer = Debouncer::new(50, 1_000);

        let path = PathBuf::from("/watch/file.txt");
        debouncer.record(path.clone());

        // Immediately after, nothing should be ready
        assert!(debouncer.take_ready().is_empty());
        assert!(debouncer.has_pending());

        sleep(Duration::from_millis(60));

        let ready = debouncer.take_ready();
        assert_eq!(ready, vec![path]);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn test_debouncer_resets_on_new_event() {
        let mut debouncer = Debouncer::new(50, 1_000);

        let path = PathBuf::from("/watch/file.txt");
        debouncer.record(path.clone());
        sleep(Duration::from_millis(30));

        // A write in progress keeps pushing the deadline out
        debouncer.record(path.clone());
        sleep(Duration::from_millis(30));
        assert!(debouncer.take_ready().is_empty());

        sleep(Duration::from_millis(30));
        assert_eq!(debouncer.take_ready().len(), 1);
    }

    #[test]
    fn test_debouncer_forget_pending() {
        let mut debouncer = Debouncer::new(50, 1_000);

        let path = PathBuf::from("/watch/file.txt");
        debouncer.record(path.clone());
        assert_eq!(debouncer.pending_count(), 1);

        debouncer.forget(&path);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn test_duplicate_suppression_window() {
        let mut debouncer = Debouncer::new(0, 50);
        let path = PathBuf::from("/watch/file.txt");

        assert!(debouncer.mark_emitted(&path));
        assert!(!debouncer.mark_emitted(&path));

        sleep(Duration::from_millis(60));
        // Expired entries are pruned on the next take
        debouncer.take_ready();
        assert!(debouncer.mark_emitted(&path));
    }

    #[test]
    fn test_forget_clears_emission_history() {
        let mut debouncer = Debouncer::new(0, 10_000);
        let file = PathBuf::from("/watch/in/scan.txt");
        let sibling = PathBuf::from("/watch/other.txt");

        assert!(debouncer.mark_emitted(&file));
        assert!(debouncer.mark_emitted(&sibling));

        // Relocated out of the tree: a new file with the same name counts
        debouncer.forget(&file);
        assert!(debouncer.mark_emitted(&file));

        // Forgetting a directory covers the files that were under it
        debouncer.record(PathBuf::from("/watch/in/pending.txt"));
        debouncer.forget(Path::new("/watch/in"));
        assert!(debouncer.mark_emitted(&file));
        assert!(!debouncer.has_pending());
        assert!(!debouncer.mark_emitted(&sibling));
    }

    #[test]
    fn test_ready_paths_are_sorted() {
        let mut debouncer = Debouncer::new(0, 50);
        debouncer.record(PathBuf::from("/watch/b.txt"));
        debouncer.record(PathBuf::from("/watch/a.txt"));
        assert_eq!(
            debouncer.take_ready(),
            vec![PathBuf::from("/watch/a.txt"), PathBuf::from("/watch/b.txt")]
        );
    }
}
