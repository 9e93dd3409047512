//! File lifecycle engine.
//!
//! Owns the pipeline from arrival detection to relocation:
//!
//! ```text
//! startup scan ─┐
//!               ├─> Lane (one task at a time) ─> Orchestrator ─> processor
//! EventSource ──┘        ^                           │
//!                        └── retry timers <──────────┤
//!                                                    └─> Relocator / ErrorLogWriter / DirectoryCleaner
//! ```
//!
//! The startup backlog (existing files, then empty-directory quarantine) is
//! handled before any live arrival. The OS watch is established before the
//! scan runs, so nothing created in between is missed.

mod error;
mod lane;
mod orchestrator;
mod stats;
mod task;

pub use error::{EngineError, EngineResult};
pub use orchestrator::{Orchestrator, Step};
pub use stats::{EngineStats, HealthReporter, StatsSnapshot};
pub use task::{FileTask, TaskState};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ProcessorConfig, Settings, WatcherConfig};
use crate::paths::Roots;
use crate::processor::ContentProcessor;
use crate::retry::RetryPolicy;
use crate::watcher::{EventSource, FileFilter, scan_existing};
use lane::Lane;

/// Everything the engine needs, resolved once from [`Settings`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub watch_dir: PathBuf,
    pub saved_dir: PathBuf,
    pub error_dir: PathBuf,
    pub retry: RetryPolicy,
    pub processor: ProcessorConfig,
    pub processor_timeout: Duration,
    pub watcher: WatcherConfig,
    /// Zero disables health reporting.
    pub health_interval: Duration,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            watch_dir: settings.paths.watch_dir.clone(),
            saved_dir: settings.paths.saved_dir.clone(),
            error_dir: settings.paths.error_dir.clone(),
            retry: RetryPolicy::from_config(&settings.retry),
            processor: settings.processor.clone(),
            processor_timeout: Duration::from_secs(settings.processor.timeout_secs),
            watcher: settings.watcher.clone(),
            health_interval: Duration::from_secs(settings.health.interval_secs),
        }
    }
}

/// Watches a directory tree and routes every file to the saved or error
/// root.
pub struct Engine {
    config: EngineConfig,
    processor: Box<dyn ContentProcessor>,
    stats: Arc<EngineStats>,
}

impl Engine {
    /// The processor is initialized when the engine starts.
    pub fn new(config: EngineConfig, processor: Box<dyn ContentProcessor>) -> Self {
        Self {
            config,
            processor,
            stats: Arc::new(EngineStats::new()),
        }
    }

    /// Shared counters, readable while the engine runs.
    pub fn stats(&self) -> Arc<EngineStats> {
        self.stats.clone()
    }

    /// Process the existing tree, then watch for new files until
    /// `shutdown` is cancelled.
    ///
    /// The task in progress when shutdown is requested is finished; pending
    /// retries are abandoned and their files stay in the watch root.
    pub async fn run(self, shutdown: CancellationToken) -> EngineResult<StatsSnapshot> {
        self.start(shutdown, true).await
    }

    /// Process the existing tree, including all retries, and return
    /// without watching.
    pub async fn run_once(self, shutdown: CancellationToken) -> EngineResult<StatsSnapshot> {
        self.start(shutdown, false).await
    }

    async fn start(self, shutdown: CancellationToken, watch: bool) -> EngineResult<StatsSnapshot> {
        let Engine {
            config,
            mut processor,
            stats,
        } = self;

        let roots = Roots::new(&config.watch_dir, &config.saved_dir, &config.error_dir)?;

        if let Err(source) = processor.initialize(&config.processor).await {
            return Err(EngineError::Processor {
                name: processor.name().to_string(),
                source,
            });
        }
        let processor: Arc<dyn ContentProcessor> = Arc::from(processor);

        let filter = FileFilter::new(&config.watcher.ignore_patterns)?;

        // Stops helper tasks when the lane is done, whatever the reason
        let stop = shutdown.child_token();

        let live = if watch {
            let (source, arrivals) = EventSource::builder()
                .root(&roots.watch)
                .filter(filter.clone())
                .debounce_ms(config.watcher.debounce_ms)
                .duplicate_window_ms(config.watcher.duplicate_window_ms)
                .queue_capacity(config.watcher.queue_capacity)
                .build()?;
            Some((tokio::spawn(source.run(stop.clone())), arrivals))
        } else {
            None
        };

        let scan = scan_existing(&roots.watch, &filter)?;

        crate::log_event!(
            "engine",
            "started",
            "{} -> saved {} / error {} (processor: {})",
            roots.watch.display(),
            roots.saved.display(),
            roots.error.display(),
            processor.name()
        );

        let health =
            tokio::spawn(HealthReporter::new(stats.clone(), config.health_interval).run(stop.clone()));

        let orchestrator = Orchestrator::new(
            roots,
            processor.clone(),
            config.retry.clone(),
            config.processor_timeout,
            stats.clone(),
        );
        let mut lane = Lane::new(orchestrator, stats.clone(), stop.clone());

        lane.run_startup(scan).await;

        match live {
            Some((watcher, arrivals)) => {
                lane.run_live(arrivals).await;
                stop.cancel();
                match watcher.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("[engine] watcher stopped with error: {e}"),
                    Err(e) => tracing::error!("[engine] watcher task failed: {e}"),
                }
            }
            None => lane.drain_retries().await,
        }

        lane.finish();
        stop.cancel();
        if let Err(e) = health.await {
            tracing::warn!("[engine] health reporter failed: {e}");
        }

        processor.shutdown().await;

        let snapshot = stats.snapshot();
        crate::log_event!("engine", "stopped", "{snapshot}");
        Ok(snapshot)
    }
}
