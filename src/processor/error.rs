//! Error types for content processors.

use std::path::PathBuf;

use thiserror::Error;

use crate::fsops::is_transient_io;

/// Faults raised while initializing or running a processor.
///
/// These are infrastructure faults, not processing verdicts: a processor
/// reports "this file is bad" through [`super::Outcome`]. The orchestrator
/// maps an `Err` to an outcome using [`ProcessorError::is_transient`].
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid processor configuration: {reason}")]
    Config { reason: String },

    #[error("Processor '{name}' is not initialized")]
    NotInitialized { name: String },
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;

impl ProcessorError {
    /// Whether the fault is known to clear up on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ProcessorError::Io { source, .. } | ProcessorError::Spawn { source, .. } => {
                is_transient_io(source)
            }
            ProcessorError::Config { .. } | ProcessorError::NotInitialized { .. } => false,
        }
    }
}
