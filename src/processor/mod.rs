//! Pluggable content processing.
//!
//! The orchestration core only needs a three-valued verdict per file.
//! Everything about what "processing" means lives behind
//! [`ContentProcessor`]; new processors implement the trait without
//! touching the engine.

mod command;
mod error;
mod text;

pub use command::CommandProcessor;
pub use error::{ProcessorError, ProcessorResult};
pub use text::TextProcessor;

use std::path::Path;

use async_trait::async_trait;

use crate::config::{ProcessorConfig, ProcessorKind};

/// Free-form metadata reported by a successful processing run.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Verdict of one processing attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Metadata),
    /// Retrying will not help (unsupported, corrupt, misconfigured).
    PermanentFailure(String),
    /// Retrying later may succeed (timeouts, rate limits, flaky I/O).
    TransientFailure(String),
}

impl Outcome {
    pub fn success() -> Self {
        Outcome::Success(Metadata::new())
    }

    /// Failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::PermanentFailure(reason) | Outcome::TransientFailure(reason) => Some(reason),
        }
    }
}

/// Contract for content processors.
///
/// `process` is treated as a synchronous call boundary by the orchestrator:
/// at most one call is in flight at a time. Implementations may use their
/// own concurrency internally.
#[async_trait]
pub trait ContentProcessor: Send + Sync {
    /// Processor name for logging.
    fn name(&self) -> &str;

    /// Prepare the processor. An error here is fatal at startup.
    async fn initialize(&mut self, config: &ProcessorConfig) -> ProcessorResult<()>;

    /// Whether the processor accepts this file at all.
    fn supports(&self, path: &Path) -> bool;

    /// Process one file.
    ///
    /// `Err` is reserved for infrastructure faults; it is classified with
    /// [`ProcessorError::is_transient`].
    async fn process(&self, path: &Path) -> ProcessorResult<Outcome>;

    /// Release resources before exit.
    async fn shutdown(&self) {}
}

/// Build the processor selected by `config.kind`.
///
/// The returned processor still needs [`ContentProcessor::initialize`].
pub fn from_config(config: &ProcessorConfig) -> Box<dyn ContentProcessor> {
    match config.kind {
        ProcessorKind::Text => Box::new(TextProcessor::new()),
        ProcessorKind::Command => Box::new(CommandProcessor::new()),
    }
}

/// Case-insensitive extension filter shared by the built-in processors.
/// An empty list accepts every file.
pub(crate) fn extension_allowed(extensions: &[String], path: &Path) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_filter() {
        let exts = vec!["txt".to_string(), "MD".to_string()];
        assert!(extension_allowed(&exts, Path::new("/a/doc.txt")));
        assert!(extension_allowed(&exts, Path::new("/a/README.md")));
        assert!(extension_allowed(&exts, Path::new("/a/DOC.TXT")));
        assert!(!extension_allowed(&exts, Path::new("/a/image.png")));
        assert!(!extension_allowed(&exts, Path::new("/a/Makefile")));
        assert!(extension_allowed(&[], Path::new("/a/Makefile")));
    }

    #[test]
    fn test_outcome_reason() {
        assert_eq!(Outcome::success().reason(), None);
        assert_eq!(
            Outcome::PermanentFailure("bad format".into()).reason(),
            Some("bad format")
        );
    }

    #[test]
    fn test_from_config_selects_kind() {
        let mut config = ProcessorConfig::default();
        assert_eq!(from_config(&config).name(), "text");
        config.kind = ProcessorKind::Command;
        assert_eq!(from_config(&config).name(), "command");
    }
}
