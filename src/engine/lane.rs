//! The single processing lane.
//!
//! Exactly one task is handled at a time, so moves, cleanups and log
//! writes never overlap. Retry waits happen on spawned timers that hand the
//! task back through a dedicated channel; the lane itself never sleeps.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::orchestrator::{Orchestrator, Step};
use super::stats::EngineStats;
use super::task::FileTask;
use crate::watcher::StartupScan;

pub struct Lane {
    orchestrator: Orchestrator,
    /// Relative paths with a retry in flight.
    owned: HashSet<PathBuf>,
    retry_tx: mpsc::UnboundedSender<FileTask>,
    retry_rx: mpsc::UnboundedReceiver<FileTask>,
    pending_retries: usize,
    stats: Arc<EngineStats>,
    shutdown: CancellationToken,
}

impl Lane {
    pub fn new(
        orchestrator: Orchestrator,
        stats: Arc<EngineStats>,
        shutdown: CancellationToken,
    ) -> Self {
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            owned: HashSet::new(),
            retry_tx,
            retry_rx,
            pending_retries: 0,
            stats,
            shutdown,
        }
    }

    /// Process the startup backlog: files first, then empty directories.
    pub async fn run_startup(&mut self, scan: StartupScan) {
        let StartupScan { files, empty_dirs } = scan;
        let total = files.len();

        for (index, path) in files.into_iter().enumerate() {
            if self.shutdown.is_cancelled() {
                return;
            }
            self.stats
                .set_queued(total - index - 1 + self.pending_retries);
            self.accept(path).await;
        }

        for dir in empty_dirs {
            if self.shutdown.is_cancelled() {
                return;
            }
            self.orchestrator.quarantine(&dir);
        }
    }

    /// Serve live arrivals and due retries until shutdown or until the
    /// arrival queue closes.
    pub async fn run_live(&mut self, mut arrivals: mpsc::Receiver<PathBuf>) {
        loop {
            self.stats.set_queued(arrivals.len() + self.pending_retries);

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                Some(task) = self.retry_rx.recv() => {
                    self.pending_retries -= 1;
                    self.attempt(task).await;
                }

                arrived = arrivals.recv() => match arrived {
                    Some(path) => self.accept(path).await,
                    None => {
                        tracing::warn!("[engine] event source closed, stopping");
                        break;
                    }
                },
            }
        }
    }

    /// Wait for every scheduled retry to reach a terminal state.
    pub async fn drain_retries(&mut self) {
        while self.pending_retries > 0 {
            self.stats.set_queued(self.pending_retries);

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                Some(task) = self.retry_rx.recv() => {
                    self.pending_retries -= 1;
                    self.attempt(task).await;
                }
            }
        }
    }

    /// Log anything left behind. Returns the number of abandoned retries.
    pub fn finish(&mut self) -> usize {
        let abandoned = self.pending_retries;
        if abandoned > 0 {
            crate::log_event!(
                "engine",
                "shutdown",
                "abandoned {abandoned} pending retries (files stay in the watch root)"
            );
        }
        self.stats.set_queued(0);
        abandoned
    }

    /// Start a fresh task for a reported path.
    async fn accept(&mut self, source: PathBuf) {
        let relative = match self.orchestrator.roots().relative(&source) {
            Ok(relative) => relative,
            Err(e) => {
                tracing::warn!("[engine] ignoring {}: {e}", source.display());
                return;
            }
        };

        if self.owned.contains(&relative) {
            crate::debug_event!("engine", "already in progress", "{}", relative.display());
            return;
        }

        self.attempt(FileTask::new(source, relative)).await;
    }

    async fn attempt(&mut self, mut task: FileTask) {
        if !is_regular_file(&task.source) {
            // Already relocated by an earlier report, or removed externally
            crate::debug_event!("engine", "source gone", "{}", task.relative.display());
            self.owned.remove(&task.relative);
            return;
        }

        match self.orchestrator.attempt(&mut task).await {
            Step::Retry(delay) => self.schedule_retry(task, delay),
            Step::Done => {
                self.owned.remove(&task.relative);
            }
        }
    }

    fn schedule_retry(&mut self, task: FileTask, delay: Duration) {
        self.owned.insert(task.relative.clone());
        self.pending_retries += 1;
        self.stats.record_retry();

        let retry_tx = self.retry_tx.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = retry_tx.send(task);
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
