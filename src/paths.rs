//! Path mapping between the watched tree and the two destination trees.
//!
//! Every file keeps its path relative to the watched root when it is
//! relocated, so `watch/a/b/doc.txt` lands at `saved/a/b/doc.txt` or
//! `error/a/b/doc.txt`. The same mapping answers "has this path already been
//! processed" by probing the destination trees; there is no separate ledger.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Errors from path mapping and root validation.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("{path} is not under root {root}")]
    NotUnderRoot { path: PathBuf, root: PathBuf },

    #[error("Invalid root configuration: {reason}")]
    InvalidRoots { reason: String },

    #[error("Cannot prepare root {path}: {source}")]
    RootIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = Result<T, PathError>;

/// Stateless relative/destination path computation.
pub struct PathMapper;

impl PathMapper {
    /// Path of `absolute` relative to `root`.
    ///
    /// Fails with [`PathError::NotUnderRoot`] unless `absolute` is a strict
    /// descendant of `root`. Paths containing `..` after the root prefix are
    /// rejected as well, since they could escape the destination trees.
    pub fn relative(root: &Path, absolute: &Path) -> PathResult<PathBuf> {
        let not_under = || PathError::NotUnderRoot {
            path: absolute.to_path_buf(),
            root: root.to_path_buf(),
        };

        let relative = absolute.strip_prefix(root).map_err(|_| not_under())?;
        if relative.as_os_str().is_empty() {
            return Err(not_under());
        }
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(not_under());
        }

        Ok(relative.to_path_buf())
    }

    /// Equivalent location of `relative` under `alt_root`.
    pub fn destination(alt_root: &Path, relative: &Path) -> PathBuf {
        alt_root.join(relative)
    }
}

/// The three configured directory trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub watch: PathBuf,
    pub saved: PathBuf,
    pub error: PathBuf,
}

impl Roots {
    /// Validate the roots' relationship, create missing directories, then
    /// canonicalize and validate again.
    ///
    /// The first check works on lexically absolute paths, so a rejected
    /// configuration leaves nothing behind on disk. The second one catches
    /// overlaps that only show up once symlinks are resolved.
    pub fn new(
        watch: impl AsRef<Path>,
        saved: impl AsRef<Path>,
        error: impl AsRef<Path>,
    ) -> PathResult<Self> {
        let (watch, saved, error) = (watch.as_ref(), saved.as_ref(), error.as_ref());

        Self {
            watch: lexical_absolute(watch)?,
            saved: lexical_absolute(saved)?,
            error: lexical_absolute(error)?,
        }
        .validate()?;

        let watch = prepare_root(watch)?;
        let saved = prepare_root(saved)?;
        let error = prepare_root(error)?;

        let roots = Self {
            watch,
            saved,
            error,
        };
        roots.validate()?;
        Ok(roots)
    }

    fn validate(&self) -> PathResult<()> {
        if self.saved == self.error {
            return Err(invalid(format!(
                "saved and error roots are the same directory ({})",
                self.saved.display()
            )));
        }

        for (label, dest) in [("saved", &self.saved), ("error", &self.error)] {
            if dest == &self.watch {
                return Err(invalid(format!(
                    "{label} root equals the watch root ({})",
                    dest.display()
                )));
            }
            if self.watch.starts_with(dest) {
                return Err(invalid(format!(
                    "{label} root {} contains the watch root {}",
                    dest.display(),
                    self.watch.display()
                )));
            }
            if dest.starts_with(&self.watch) {
                return Err(invalid(format!(
                    "{label} root {} lies inside the watch root {}",
                    dest.display(),
                    self.watch.display()
                )));
            }
        }

        Ok(())
    }

    /// Path of `absolute` relative to the watch root.
    pub fn relative(&self, absolute: &Path) -> PathResult<PathBuf> {
        PathMapper::relative(&self.watch, absolute)
    }

    /// Whether something already exists at `relative` under the saved or
    /// error root.
    pub fn already_processed(&self, relative: &Path) -> bool {
        PathMapper::destination(&self.saved, relative).symlink_metadata().is_ok()
            || PathMapper::destination(&self.error, relative)
                .symlink_metadata()
                .is_ok()
    }
}

/// Absolute form of `path` with `.` and `..` folded, without touching the
/// filesystem beyond reading the current directory.
fn lexical_absolute(path: &Path) -> PathResult<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|source| PathError::RootIo {
        path: path.to_path_buf(),
        source,
    })?;

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

fn prepare_root(path: &Path) -> PathResult<PathBuf> {
    let io_err = |source| PathError::RootIo {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(path).map_err(io_err)?;
    let canonical = path.canonicalize().map_err(io_err)?;
    if !canonical.is_dir() {
        return Err(invalid(format!("{} is not a directory", path.display())));
    }
    Ok(canonical)
}

fn invalid(reason: String) -> PathError {
    PathError::InvalidRoots { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_strips_root() {
        let rel = PathMapper::relative(Path::new("/src"), Path::new("/src/a/b/doc.txt")).unwrap();
        assert_eq!(rel, PathBuf::from("a/b/doc.txt"));
    }

    #[test]
    fn test_relative_rejects_outside_and_root_itself() {
        let err = PathMapper::relative(Path::new("/src"), Path::new("/other/doc.txt"));
        assert!(matches!(err, Err(PathError::NotUnderRoot { .. })));

        let err = PathMapper::relative(Path::new("/src"), Path::new("/src"));
        assert!(matches!(err, Err(PathError::NotUnderRoot { .. })));

        // Prefix match on a sibling name is not containment
        let err = PathMapper::relative(Path::new("/src"), Path::new("/srcx/doc.txt"));
        assert!(matches!(err, Err(PathError::NotUnderRoot { .. })));
    }

    #[test]
    fn test_relative_rejects_parent_components() {
        let err = PathMapper::relative(Path::new("/src"), Path::new("/src/../etc/passwd"));
        assert!(matches!(err, Err(PathError::NotUnderRoot { .. })));
    }

    #[test]
    fn test_destination_joins() {
        let dest = PathMapper::destination(Path::new("/saved"), Path::new("a/b/doc.txt"));
        assert_eq!(dest, PathBuf::from("/saved/a/b/doc.txt"));
    }

    #[test]
    fn test_roots_create_missing_dirs() {
        let temp = TempDir::new().unwrap();
        let roots = Roots::new(
            temp.path().join("src"),
            temp.path().join("saved"),
            temp.path().join("error"),
        )
        .unwrap();

        assert!(roots.watch.is_dir());
        assert!(roots.saved.is_dir());
        assert!(roots.error.is_dir());
        assert!(roots.watch.is_absolute());
    }

    #[test]
    fn test_roots_reject_overlap() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();

        let same = Roots::new(base.join("src"), base.join("src"), base.join("error"));
        assert!(matches!(same, Err(PathError::InvalidRoots { .. })));

        let ancestor = Roots::new(base.join("out/src"), base.join("out"), base.join("error"));
        assert!(matches!(ancestor, Err(PathError::InvalidRoots { .. })));

        let nested = Roots::new(base.join("src"), base.join("src/saved"), base.join("error"));
        assert!(matches!(nested, Err(PathError::InvalidRoots { .. })));

        let shared = Roots::new(base.join("src"), base.join("out"), base.join("out"));
        assert!(matches!(shared, Err(PathError::InvalidRoots { .. })));
    }

    #[test]
    fn test_rejected_roots_create_nothing() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();

        let nested = Roots::new(base.join("src"), base.join("src/saved"), base.join("error"));
        assert!(matches!(nested, Err(PathError::InvalidRoots { .. })));
        assert!(!base.join("src").exists());
        assert!(!base.join("error").exists());

        // `..` is folded before comparing
        let sneaky = Roots::new(
            base.join("src"),
            base.join("out/../src/saved"),
            base.join("error"),
        );
        assert!(matches!(sneaky, Err(PathError::InvalidRoots { .. })));
        assert!(!base.join("src").exists());
        assert!(!base.join("out").exists());
    }

    #[test]
    fn test_lexical_absolute_folds_dots() {
        assert_eq!(
            lexical_absolute(Path::new("/a/./b/../c")).unwrap(),
            PathBuf::from("/a/c")
        );
        assert!(lexical_absolute(Path::new("rel")).unwrap().is_absolute());
    }

    #[test]
    fn test_roots_allow_siblings_under_common_parent() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        let roots = Roots::new(base.join("src"), base.join("out/saved"), base.join("out/error"));
        assert!(roots.is_ok());
    }

    #[test]
    fn test_already_processed_probes_both_roots() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        let roots = Roots::new(base.join("src"), base.join("saved"), base.join("error")).unwrap();

        let rel = Path::new("x/y");
        assert!(!roots.already_processed(rel));

        std::fs::create_dir_all(roots.error.join("x/y")).unwrap();
        assert!(roots.already_processed(rel));

        std::fs::create_dir_all(roots.saved.join("a")).unwrap();
        std::fs::write(roots.saved.join("a/doc.txt"), "x").unwrap();
        assert!(roots.already_processed(Path::new("a")));
        assert!(roots.already_processed(Path::new("a/doc.txt")));
    }
}
