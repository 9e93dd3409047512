//! Counters shared between the processing lane and the health reporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Live engine counters. Written by the lane, read by anyone.
#[derive(Debug, Default)]
pub struct EngineStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    retries_scheduled: AtomicU64,
    dirs_removed: AtomicU64,
    dirs_quarantined: AtomicU64,
    queued: AtomicUsize,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub succeeded: u64,
    pub failed: u64,
    pub retries_scheduled: u64,
    pub dirs_removed: u64,
    pub dirs_quarantined: u64,
    pub queued: usize,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dirs_removed(&self, count: usize) {
        self.dirs_removed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_quarantine(&self) {
        self.dirs_quarantined.fetch_add(1, Ordering::Relaxed);
    }

    /// Files waiting for the lane: queued arrivals plus scheduled retries.
    pub fn set_queued(&self, queued: usize) {
        self.queued.store(queued, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            dirs_removed: self.dirs_removed.load(Ordering::Relaxed),
            dirs_quarantined: self.dirs_quarantined.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} saved, {} failed, {} queued, {} retries, {} dirs removed, {} dirs quarantined",
            self.succeeded,
            self.failed,
            self.queued,
            self.retries_scheduled,
            self.dirs_removed,
            self.dirs_quarantined
        )
    }
}

/// Periodically logs a health line from [`EngineStats`].
///
/// Only reads counters, so it never waits on the processing lane.
pub struct HealthReporter {
    stats: Arc<EngineStats>,
    period: Duration,
}

impl HealthReporter {
    /// A zero `period` disables reporting.
    pub fn new(stats: Arc<EngineStats>, period: Duration) -> Self {
        Self { stats, period }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        if self.period.is_zero() {
            return;
        }

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    crate::log_event!("health", "ok", "{}", self.stats.snapshot());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = EngineStats::new();
        stats.record_success();
        stats.record_success();
        stats.record_failure();
        stats.record_retry();
        stats.record_dirs_removed(3);
        stats.record_quarantine();
        stats.set_queued(4);

        let snap = stats.snapshot();
        assert_eq!(
            snap,
            StatsSnapshot {
                succeeded: 2,
                failed: 1,
                retries_scheduled: 1,
                dirs_removed: 3,
                dirs_quarantined: 1,
                queued: 4,
            }
        );
        assert_eq!(
            snap.to_string(),
            "2 saved, 1 failed, 4 queued, 1 retries, 3 dirs removed, 1 dirs quarantined"
        );
    }

    #[tokio::test]
    async fn test_health_reporter_stops_on_shutdown() {
        let reporter = HealthReporter::new(Arc::new(EngineStats::new()), Duration::from_millis(10));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(reporter.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_period_disables_reporter() {
        let reporter = HealthReporter::new(Arc::new(EngineStats::new()), Duration::ZERO);
        // Returns without waiting for shutdown
        tokio::time::timeout(Duration::from_secs(1), reporter.run(CancellationToken::new()))
            .await
            .unwrap();
    }
}
