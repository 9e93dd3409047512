//! Error types for filesystem mutations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::paths::PathError;

/// Errors from relocation, cleanup and log writing.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("{operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Copy of {path} is incomplete: expected {expected} bytes, wrote {actual}")]
    CopyMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Path(#[from] PathError),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        FsError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FsError::Io { source, .. } => is_transient_io(source),
            FsError::CopyMismatch { .. } | FsError::Path(_) => false,
        }
    }
}

/// Classify an I/O error raised by local infrastructure.
///
/// Only conditions known to clear up on their own count as transient;
/// everything else (missing files, permissions, corrupt data) is permanent.
pub fn is_transient_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::BrokenPipe
    )
}
