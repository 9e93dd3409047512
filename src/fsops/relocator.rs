//! Moves processed files (and empty directories) into a destination root,
//! mirroring their path relative to the watch root.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::error::{FsError, FsResult};
use crate::paths::PathMapper;

/// Same-filesystem move attempted before falling back to a copy.
type RenameFn = fn(&Path, &Path) -> io::Result<()>;

fn rename_in_place(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

/// Structure-preserving mover rooted at the watched tree.
#[derive(Debug, Clone)]
pub struct Relocator {
    watch_root: PathBuf,
    rename: RenameFn,
}

impl Relocator {
    pub fn new(watch_root: impl Into<PathBuf>) -> Self {
        Self {
            watch_root: watch_root.into(),
            rename: rename_in_place,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_rename(mut self, rename: RenameFn) -> Self {
        self.rename = rename;
        self
    }

    /// Destination `source` would be moved to under `dest_root`.
    pub fn destination_for(&self, source: &Path, dest_root: &Path) -> FsResult<PathBuf> {
        let relative = PathMapper::relative(&self.watch_root, source)?;
        Ok(PathMapper::destination(dest_root, &relative))
    }

    /// Move a regular file to its mirrored location under `dest_root`.
    ///
    /// Uses a rename when both roots share a filesystem. Across filesystems
    /// the file is copied into a temporary sibling of the destination,
    /// synced, verified and then renamed into place; the source is only
    /// removed after that succeeds. An existing file at the destination is
    /// replaced.
    pub fn move_file(&self, source: &Path, dest_root: &Path) -> FsResult<PathBuf> {
        let destination = self.destination_for(source, dest_root)?;
        ensure_parent(&destination)?;

        match (self.rename)(source, &destination) {
            Ok(()) => Ok(destination),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                crate::debug_event!(
                    "relocator",
                    "cross-device",
                    "copying {} to {}",
                    source.display(),
                    destination.display()
                );
                copy_then_remove(source, &destination)?;
                Ok(destination)
            }
            Err(e) => Err(FsError::io("rename", source, e)),
        }
    }

    /// Move an empty directory to its mirrored location under `dest_root`.
    pub fn move_empty_dir(&self, source: &Path, dest_root: &Path) -> FsResult<PathBuf> {
        let destination = self.destination_for(source, dest_root)?;
        ensure_parent(&destination)?;

        match (self.rename)(source, &destination) {
            Ok(()) => Ok(destination),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                fs::create_dir_all(&destination)
                    .map_err(|e| FsError::io("create_dir", &destination, e))?;
                fs::remove_dir(source).map_err(|e| FsError::io("remove_dir", source, e))?;
                Ok(destination)
            }
            Err(e) => Err(FsError::io("rename", source, e)),
        }
    }
}

fn ensure_parent(destination: &Path) -> FsResult<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| FsError::io("create_parent", parent, e))?;
    }
    Ok(())
}

/// Copy `source` to `destination` without ever exposing a partial file,
/// then delete `source`.
///
/// The source is left untouched if any step before the final rename fails.
pub(crate) fn copy_then_remove(source: &Path, destination: &Path) -> FsResult<()> {
    let parent = destination
        .parent()
        .ok_or_else(|| FsError::io("copy", destination, io::Error::other("no parent directory")))?;

    let metadata = fs::metadata(source).map_err(|e| FsError::io("stat", source, e))?;
    let mut reader = File::open(source).map_err(|e| FsError::io("open", source, e))?;

    // Dropping the temp file on any early return removes it.
    let mut staged =
        NamedTempFile::new_in(parent).map_err(|e| FsError::io("create_temp", parent, e))?;
    let written = io::copy(&mut reader, staged.as_file_mut())
        .map_err(|e| FsError::io("copy", staged.path(), e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| FsError::io("sync", staged.path(), e))?;

    let staged_len = staged
        .as_file()
        .metadata()
        .map_err(|e| FsError::io("stat", staged.path(), e))?
        .len();
    if written != metadata.len() || staged_len != metadata.len() {
        return Err(FsError::CopyMismatch {
            path: source.to_path_buf(),
            expected: metadata.len(),
            actual: staged_len,
        });
    }

    fs::set_permissions(staged.path(), metadata.permissions())
        .map_err(|e| FsError::io("set_permissions", staged.path(), e))?;
    staged
        .persist(destination)
        .map_err(|e| FsError::io("persist", destination, e.error))?;

    fs::remove_file(source).map_err(|e| FsError::io("remove_source", source, e))
}
