//! Filesystem mutations performed by the processing lane.
//!
//! All three roots are only ever written through this module, and only from
//! the single processing lane in [`crate::engine`].

mod cleaner;
mod error;
mod error_log;
mod relocator;

pub use cleaner::{DirectoryCleaner, QuarantineOutcome, is_empty_for_cleanup, is_empty_for_quarantine};
pub use error::{FsError, FsResult, is_transient_io};
pub use error_log::{
    EMPTY_AT_STARTUP_REASON, ErrorLogWriter, ErrorRecord, QUARANTINE_LOG_NAME, log_path_for,
};
pub use relocator::Relocator;
