//! Directory bookkeeping under the watch root.
//!
//! Two emptiness predicates are used on purpose:
//! - *empty for cleanup*: no non-directory entry anywhere beneath the
//!   directory (empty subdirectories are fine). Used after a file has been
//!   moved out, walking upwards.
//! - *empty for quarantine*: the directory has no entries at all. Used for
//!   directories found empty by the startup scan.
//!
//! Neither algorithm ever touches the watch root itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::error::{FsError, FsResult};
use super::error_log::{EMPTY_AT_STARTUP_REASON, ErrorLogWriter};
use super::relocator::Relocator;
use crate::paths::Roots;

/// Result of a quarantine request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineOutcome {
    /// Moved under the error root with a quarantine log.
    Quarantined { destination: PathBuf },
    /// Gained content since it was enumerated.
    NotEmpty,
    /// Something already exists at the mirrored path under the saved or
    /// error root, so the directory was emptied by processing rather than
    /// being empty originally.
    AlreadyProcessed,
    /// No longer exists (or is no longer a directory).
    Vanished,
}

/// Removes a directory tree holding nothing but empty directories.
type RemoveFn = fn(&Path) -> FsResult<()>;

pub struct DirectoryCleaner {
    roots: Roots,
    relocator: Relocator,
    logs: ErrorLogWriter,
    remove: RemoveFn,
}

impl DirectoryCleaner {
    pub fn new(roots: Roots) -> Self {
        let relocator = Relocator::new(&roots.watch);
        Self {
            roots,
            relocator,
            logs: ErrorLogWriter::new(),
            remove: remove_empty_tree,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_relocator(mut self, relocator: Relocator) -> Self {
        self.relocator = relocator;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_remover(mut self, remove: RemoveFn) -> Self {
        self.remove = remove;
        self
    }

    /// Remove `start` and its ancestors while they are empty for cleanup,
    /// stopping below the watch root.
    ///
    /// Deletion failures are logged as warnings and end the walk; they are
    /// never reported to the caller. Returns the number of directories
    /// removed.
    pub fn cleanup_after_move(&self, start: &Path) -> usize {
        let mut current = start.to_path_buf();
        let mut removed = 0;

        while current != self.roots.watch && current.starts_with(&self.roots.watch) {
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.is_dir() => {}
                // Already gone; its parent may still need removing
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if !current.pop() {
                        break;
                    }
                    continue;
                }
                _ => break,
            }

            if !is_empty_for_cleanup(&current) {
                break;
            }

            match (self.remove)(&current) {
                Ok(()) => {
                    removed += 1;
                    crate::outcome!("removed", "{}", self.display_relative(&current));
                }
                Err(e) => {
                    tracing::warn!(
                        "[cleanup] could not remove {}, leaving it: {e}",
                        current.display()
                    );
                    break;
                }
            }

            if !current.pop() {
                break;
            }
        }

        removed
    }

    /// Move a directory that was empty at startup into the error root.
    ///
    /// Emptiness and processing history are re-checked here rather than
    /// trusted from enumeration time, since other files may have completed
    /// in between.
    pub fn quarantine(&self, dir: &Path) -> FsResult<QuarantineOutcome> {
        let relative = self.roots.relative(dir)?;

        match fs::symlink_metadata(dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(QuarantineOutcome::Vanished),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(QuarantineOutcome::Vanished);
            }
            Err(e) => return Err(FsError::io("stat", dir, e)),
        }

        if !is_empty_for_cleanup(dir) || !is_empty_for_quarantine(dir) {
            crate::debug_event!("quarantine", "skipped, no longer empty", "{}", relative.display());
            return Ok(QuarantineOutcome::NotEmpty);
        }

        if self.roots.already_processed(&relative) {
            crate::debug_event!(
                "quarantine",
                "skipped, already processed",
                "{}",
                relative.display()
            );
            return Ok(QuarantineOutcome::AlreadyProcessed);
        }

        let destination = self.relocator.move_empty_dir(dir, &self.roots.error)?;

        // The move already happened, so a missing log does not undo it
        if let Err(e) = self
            .logs
            .write_quarantine(dir, &destination, EMPTY_AT_STARTUP_REASON)
        {
            tracing::warn!(
                "[quarantine] {} was quarantined but its log could not be written: {e}",
                relative.display()
            );
        }

        crate::outcome!(
            "quarantined",
            "{} -> {}",
            relative.display(),
            destination.display()
        );

        Ok(QuarantineOutcome::Quarantined { destination })
    }

    fn display_relative(&self, path: &Path) -> String {
        self.roots
            .relative(path)
            .map(|rel| rel.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }
}

/// No non-directory entry exists anywhere beneath `dir`.
///
/// Unreadable entries count as content.
pub fn is_empty_for_cleanup(dir: &Path) -> bool {
    for entry in WalkDir::new(dir).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => {}
            _ => return false,
        }
    }
    true
}

/// `dir` has no entries of any kind.
pub fn is_empty_for_quarantine(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    }
}

/// Remove a directory that contains only (possibly nested) empty
/// directories, deepest first. `remove_dir` refuses non-empty
/// directories, so a file arriving mid-walk aborts the removal instead of
/// being deleted.
fn remove_empty_tree(dir: &Path) -> FsResult<()> {
    for entry in WalkDir::new(dir).follow_links(false).contents_first(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            FsError::io("walk", path, io::Error::other(e.to_string()))
        })?;
        fs::remove_dir(entry.path()).map_err(|e| FsError::io("remove_dir", entry.path(), e))?;
    }
    Ok(())
}
