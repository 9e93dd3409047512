//! File name filter shared by the startup scan and live events.

use std::path::Path;

use glob::Pattern;

use super::WatchError;

/// Rejects files whose name matches any configured glob.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    ignore: Vec<Pattern>,
}

impl FileFilter {
    pub fn new(patterns: &[String]) -> Result<Self, WatchError> {
        let ignore = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| WatchError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ignore })
    }

    /// Whether a file at `path` should be dispatched.
    pub fn allows(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            // Non-UTF-8 names cannot match a pattern
            return true;
        };
        !self.ignore.iter().any(|p| p.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_file_name_only() {
        let filter = FileFilter::new(&["*.part".to_string(), ".~lock*".to_string()]).unwrap();
        assert!(!filter.allows(Path::new("/in/movie.mkv.part")));
        assert!(!filter.allows(Path::new("/in/.~lock.report.odt#")));
        assert!(filter.allows(Path::new("/in/report.odt")));
        // Directory components are not matched
        assert!(filter.allows(Path::new("/in/x.part/doc.txt")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = FileFilter::new(&["[".to_string()]).unwrap_err();
        assert!(matches!(err, WatchError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        assert!(FileFilter::default().allows(Path::new("/in/a.tmp")));
    }
}
