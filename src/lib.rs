pub mod cli;
pub mod config;
pub mod engine;
pub mod fsops;
pub mod logging;
pub mod paths;
pub mod processor;
pub mod retry;
pub mod watcher;

pub use config::Settings;
pub use engine::{Engine, EngineConfig, EngineError, EngineStats, StatsSnapshot};
pub use fsops::{DirectoryCleaner, ErrorLogWriter, ErrorRecord, QuarantineOutcome, Relocator};
pub use paths::{PathError, PathMapper, Roots};
pub use processor::{ContentProcessor, Metadata, Outcome, ProcessorError};
pub use retry::{RetryDecision, RetryPolicy};
pub use watcher::{EventSource, StartupScan, WatchError, scan_existing};
