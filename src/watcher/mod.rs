//! Arrival detection for the watch root.
//!
//! Startup runs [`scan_existing`] once to find the backlog; afterwards an
//! [`EventSource`] reports each file that appears, after it has been quiet
//! for the debounce duration.
//!
//! # Architecture
//!
//! ```text
//! notify::RecommendedWatcher (recursive)
//!         | raw events (unbounded)
//!     EventSource
//!       - Debouncer (quiet period, duplicate window)
//!       - FileFilter (ignore globs)
//!         | file paths (bounded)
//!     processing lane
//! ```

mod debouncer;
mod error;
mod filter;
mod scan;
mod source;

pub use debouncer::Debouncer;
pub use error::WatchError;
pub use filter::FileFilter;
pub use scan::{StartupScan, scan_existing};
pub use source::{EventSource, EventSourceBuilder};
