//! Error types for engine startup.

use thiserror::Error;

use crate::paths::PathError;
use crate::processor::ProcessorError;
use crate::watcher::WatchError;

/// Fatal conditions that prevent the engine from running.
///
/// Per-file failures never surface here; they end in the error root.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Cannot prepare directory roots: {0}")]
    Roots(#[from] PathError),

    #[error("Cannot start watching: {0}")]
    Watch(#[from] WatchError),

    #[error("Processor '{name}' failed to initialize: {source}")]
    Processor {
        name: String,
        #[source]
        source: ProcessorError,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
