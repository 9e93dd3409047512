//! Startup enumeration of the watch root.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{FileFilter, WatchError};
use crate::fsops::is_empty_for_quarantine;

/// What the watch root contained before live watching began.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartupScan {
    /// Regular files, in path order.
    pub files: Vec<PathBuf>,
    /// Directories with no entries at all, in path order.
    pub empty_dirs: Vec<PathBuf>,
}

/// Walk `root` and collect pre-existing files and completely empty
/// directories. The root itself is never reported. Symlinks are not
/// followed and not reported.
pub fn scan_existing(root: &Path, filter: &FileFilter) -> Result<StartupScan, WatchError> {
    if !root.is_dir() {
        return Err(WatchError::ScanFailed {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let mut scan = StartupScan::default();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("[scan] skipping unreadable entry: {e}");
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_file() {
            if filter.allows(entry.path()) {
                scan.files.push(entry.into_path());
            } else {
                crate::debug_event!("scan", "ignored", "{}", entry.path().display());
            }
        } else if file_type.is_dir() && is_empty_for_quarantine(entry.path()) {
            scan.empty_dirs.push(entry.into_path());
        }
    }

    crate::log_event!(
        "scan",
        "startup",
        "{} files, {} empty directories",
        scan.files.len(),
        scan.empty_dirs.len()
    );

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_finds_files_and_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/doc.txt"), "x").unwrap();
        fs::write(root.join("top.txt"), "x").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::create_dir_all(root.join("holder/leaf")).unwrap();

        let scan = scan_existing(root, &FileFilter::default()).unwrap();

        assert_eq!(
            scan.files,
            vec![root.join("a/b/doc.txt"), root.join("top.txt")]
        );
        // "holder" contains a subdirectory, so only the leaf qualifies
        assert_eq!(
            scan.empty_dirs,
            vec![root.join("empty"), root.join("holder/leaf")]
        );
    }

    #[test]
    fn test_scan_applies_filter() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("movie.part"), "x").unwrap();
        fs::write(temp.path().join("doc.txt"), "x").unwrap();

        let filter = FileFilter::new(&["*.part".to_string()]).unwrap();
        let scan = scan_existing(temp.path(), &filter).unwrap();
        assert_eq!(scan.files, vec![temp.path().join("doc.txt")]);
    }

    #[test]
    fn test_scan_empty_root_reports_nothing() {
        let temp = TempDir::new().unwrap();
        let scan = scan_existing(temp.path(), &FileFilter::default()).unwrap();
        assert_eq!(scan, StartupScan::default());
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let err = scan_existing(&temp.path().join("absent"), &FileFilter::default());
        assert!(matches!(err, Err(WatchError::ScanFailed { .. })));
    }
}
