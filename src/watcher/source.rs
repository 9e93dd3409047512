//! Recursive watcher that reports newly arrived files under the watch root.

use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::debouncer::Debouncer;
use super::error::WatchError;
use super::filter::FileFilter;

/// Interval at which debounced paths are checked.
const TICK: Duration = Duration::from_millis(100);

/// Live file arrival notifications.
///
/// Wraps a recursive `notify::RecommendedWatcher`. The notify callback only
/// forwards raw events into an unbounded channel, so it never blocks on
/// the processing lane; backpressure from the bounded output queue is
/// absorbed by this task instead.
pub struct EventSource {
    root: PathBuf,
    filter: FileFilter,
    debouncer: Debouncer,
    /// Raw events from notify.
    event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    /// Debounced file paths for the processing lane.
    output: mpsc::Sender<PathBuf>,
    /// The underlying file watcher (kept alive by storing it).
    _watcher: notify::RecommendedWatcher,
}

impl EventSource {
    /// Create a builder for configuring the event source.
    pub fn builder() -> EventSourceBuilder {
        EventSourceBuilder::new()
    }

    /// Run until `shutdown` is cancelled or the output queue closes.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), WatchError> {
        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        crate::log_event!("watcher", "started", "{}", self.root.display());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                Some(res) = self.event_rx.recv() => {
                    match res {
                        Ok(event) => self.handle_event(event),
                        Err(e) => tracing::error!("[watcher] file watch error: {e}"),
                    }
                }

                _ = ticker.tick() => {
                    for path in self.debouncer.take_ready() {
                        if !self.emit_ready(path, &shutdown).await {
                            crate::debug_event!("watcher", "output closed");
                            return Ok(());
                        }
                    }
                }
            }
        }

        crate::log_event!("watcher", "stopped");
        Ok(())
    }

    /// Update the debouncer from one notify event.
    fn handle_event(&mut self, event: Event) {
        match event.kind {
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                for path in event.paths {
                    self.record(path);
                }
            }

            EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
                (RenameMode::From, paths) => {
                    for path in paths {
                        self.debouncer.forget(path);
                    }
                }
                (RenameMode::Both, [from, to]) => {
                    self.debouncer.forget(from);
                    self.record(to.clone());
                }
                // To / Any / Other: existence is checked when the path is ready
                (_, paths) => {
                    for path in paths {
                        self.record(path.clone());
                    }
                }
            },

            // Relocation shows up here too, so the name can be reused
            EventKind::Remove(_) => {
                for path in &event.paths {
                    self.debouncer.forget(path);
                }
            }

            _ => {
                crate::debug_event!("watcher", "ignored event", "{:?}", event.kind);
            }
        }
    }

    fn record(&mut self, path: PathBuf) {
        if path.starts_with(&self.root) && path != self.root {
            self.debouncer.record(path);
        }
    }

    /// Emit a quiet path: a regular file directly, a directory as every
    /// file beneath it. Returns `false` once the output is gone.
    async fn emit_ready(&mut self, path: PathBuf, shutdown: &CancellationToken) -> bool {
        let Ok(meta) = std::fs::symlink_metadata(&path) else {
            // Gone already (processed, renamed away or deleted)
            return true;
        };

        let files = if meta.is_file() {
            vec![path]
        } else if meta.is_dir() {
            files_under(&path)
        } else {
            Vec::new()
        };

        for file in files {
            if !self.filter.allows(&file) {
                crate::debug_event!("watcher", "ignored", "{}", file.display());
                continue;
            }
            if !self.debouncer.mark_emitted(&file) {
                crate::debug_event!("watcher", "duplicate suppressed", "{}", file.display());
                continue;
            }

            crate::debug_event!("watcher", "arrived", "{}", file.display());
            tokio::select! {
                sent = self.output.send(file) => {
                    if sent.is_err() {
                        return false;
                    }
                }
                _ = shutdown.cancelled() => return false,
            }
        }

        true
    }
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Builder for constructing an EventSource.
pub struct EventSourceBuilder {
    root: Option<PathBuf>,
    filter: FileFilter,
    debounce_ms: u64,
    duplicate_window_ms: u64,
    queue_capacity: usize,
}

impl EventSourceBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            root: None,
            filter: FileFilter::default(),
            debounce_ms: 500,
            duplicate_window_ms: 2_000,
            queue_capacity: 1_024,
        }
    }

    /// Set the directory to watch recursively.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set the file name filter.
    pub fn filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the debounce duration in milliseconds.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the duplicate suppression window in milliseconds.
    pub fn duplicate_window_ms(mut self, ms: u64) -> Self {
        self.duplicate_window_ms = ms;
        self
    }

    /// Set the capacity of the output queue.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Establish the OS watch and build the source.
    ///
    /// The watch is active as soon as this returns, so files created while
    /// the caller runs its startup scan are queued rather than lost.
    pub fn build(self) -> Result<(EventSource, mpsc::Receiver<PathBuf>), WatchError> {
        let root = self.root.ok_or_else(|| WatchError::InitFailed {
            reason: "Watch root is required".to_string(),
        })?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (output, output_rx) = mpsc::channel(self.queue_capacity);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: root.clone(),
                reason: e.to_string(),
            })?;

        crate::debug_event!("watcher", "watching", "{}", root.display());

        let source = EventSource {
            root,
            filter: self.filter,
            debouncer: Debouncer::new(self.debounce_ms, self.duplicate_window_ms),
            event_rx,
            output,
            _watcher: watcher,
        };

        Ok((source, output_rx))
    }
}

impl Default for EventSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
