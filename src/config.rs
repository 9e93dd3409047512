//! Configuration module for docflow.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides (applied by the `run` command)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DOCFLOW_` and use double
//! underscores to separate nested levels:
//! - `DOCFLOW_PATHS__WATCH_DIR=/data/inbox` sets `paths.watch_dir`
//! - `DOCFLOW_RETRY__MAX_ATTEMPTS=5` sets `retry.max_attempts`
//! - `DOCFLOW_PROCESSOR__TIMEOUT_SECS=60` sets `processor.timeout_secs`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Config file looked up in the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "docflow.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "DOCFLOW_";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Watched, saved and error directory trees
    #[serde(default)]
    pub paths: PathsConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Content processor selection and options
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// File watcher tuning
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Periodic health reporting
    #[serde(default)]
    pub health: HealthConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    /// Directory tree watched for new files
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,

    /// Destination tree for successfully processed files
    #[serde(default = "default_saved_dir")]
    pub saved_dir: PathBuf,

    /// Destination tree for failed files and quarantined directories
    #[serde(default = "default_error_dir")]
    pub error_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    /// Retries allowed for transient failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for any retry delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Which content processor adapter to run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Built-in UTF-8 text inspection.
    #[default]
    Text,
    /// External program invoked once per file.
    Command,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProcessorConfig {
    #[serde(default)]
    pub kind: ProcessorKind,

    /// Overall time budget for one processing attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Accepted file extensions (without dot). Empty accepts everything.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Chunk window in characters (text processor)
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Overlap between consecutive chunks (text processor)
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Program to run (command processor)
    #[serde(default)]
    pub command: String,

    /// Program arguments, `{path}` is replaced by the file path
    #[serde(default)]
    pub args: Vec<String>,

    /// Exit codes that signal a retryable failure (command processor)
    #[serde(default = "default_transient_exit_codes")]
    pub transient_exit_codes: Vec<i32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatcherConfig {
    /// How long a file must be quiet before it is dispatched
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Window in which a re-reported path is treated as a duplicate
    #[serde(default = "default_duplicate_window_ms")]
    pub duplicate_window_ms: u64,

    /// Capacity of the queue between the watcher and the processing lane
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// File name globs that are never dispatched
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthConfig {
    /// Seconds between health lines (0 disables reporting)
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `docflow::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_watch_dir() -> PathBuf {
    PathBuf::from("./inbox")
}
fn default_saved_dir() -> PathBuf {
    PathBuf::from("./saved")
}
fn default_error_dir() -> PathBuf {
    PathBuf::from("./error")
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_extensions() -> Vec<String> {
    ["txt", "md", "markdown", "rst", "csv", "json", "html", "xml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_chunk_chars() -> usize {
    1_000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_transient_exit_codes() -> Vec<i32> {
    // EX_TEMPFAIL from sysexits.h
    vec![75]
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_duplicate_window_ms() -> u64 {
    2_000
}
fn default_queue_capacity() -> usize {
    1_024
}
fn default_ignore_patterns() -> Vec<String> {
    ["*.part", "*.tmp", "*.crdownload", "*.swp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_health_interval() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            watch_dir: default_watch_dir(),
            saved_dir: default_saved_dir(),
            error_dir: default_error_dir(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            kind: ProcessorKind::default(),
            timeout_secs: default_timeout_secs(),
            extensions: default_extensions(),
            chunk_chars: default_chunk_chars(),
            chunk_overlap: default_chunk_overlap(),
            command: String::new(),
            args: Vec::new(),
            transient_exit_codes: default_transient_exit_codes(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            duplicate_window_ms: default_duplicate_window_ms(),
            queue_capacity: default_queue_capacity(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// Uses `config_path` when given, otherwise `docflow.toml` in the
    /// current directory. A missing file is not an error.
    pub fn load(config_path: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(path)
    }

    /// Load configuration from a specific file, with env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a default settings file at `path`.
    pub fn init_config_file(
        path: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if !force && path.exists() {
            return Err(format!(
                "Configuration file already exists at {}. Use --force to overwrite",
                path.display()
            )
            .into());
        }

        Settings::default().save(path)?;
        Ok(path.to_path_buf())
    }
}
