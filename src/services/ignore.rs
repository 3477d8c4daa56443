//! Ignore Filter
//!
//! Decides whether a path under a project root is excluded from
//! recording. A path is ignored when any segment of its relative form
//! equals a global ignore segment, or when any project glob matches the
//! relative path or its basename.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

pub struct IgnoreFilter {
    global_segments: Vec<String>,
    globs: GlobSet,
}

impl IgnoreFilter {
    /// Build from global segments and project glob patterns. Invalid
    /// patterns are skipped with a warning rather than failing the watcher.
    pub fn new(global_segments: &[String], patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "skipping invalid ignore pattern");
                }
            }
        }
        let globs = builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignore glob set failed to build; project patterns disabled");
            GlobSet::empty()
        });
        Self {
            global_segments: global_segments.to_vec(),
            globs,
        }
    }

    /// Whether the relative path should be ignored.
    pub fn is_ignored(&self, rel_path: &Path) -> bool {
        for segment in rel_path.iter() {
            let segment = segment.to_string_lossy();
            if self
                .global_segments
                .iter()
                .any(|global| global.as_str() == segment)
            {
                return true;
            }
        }

        if self.globs.is_match(rel_path) {
            return true;
        }
        if let Some(basename) = rel_path.file_name() {
            if self.globs.is_match(Path::new(basename)) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> Vec<String> {
        vec![".git".to_string(), "node_modules".to_string()]
    }

    #[test]
    fn test_global_segment_anywhere_in_path() {
        let filter = IgnoreFilter::new(&globals(), &[]);
        assert!(filter.is_ignored(Path::new(".git/config")));
        assert!(filter.is_ignored(Path::new("pkg/node_modules/dep/index.js")));
        assert!(!filter.is_ignored(Path::new("src/main.rs")));
    }

    #[test]
    fn test_project_glob_on_relative_path_and_basename() {
        let filter = IgnoreFilter::new(&globals(), &["*.log".to_string()]);
        assert!(filter.is_ignored(Path::new("x.log")));
        // Basename match even when the glob has no directory component.
        assert!(filter.is_ignored(Path::new("deep/nested/x.log")));
        assert!(!filter.is_ignored(Path::new("x.txt")));
    }

    #[test]
    fn test_directory_glob() {
        let filter = IgnoreFilter::new(&globals(), &["build/**".to_string()]);
        assert!(filter.is_ignored(Path::new("build/out.bin")));
        assert!(!filter.is_ignored(Path::new("src/build.rs")));
    }

    #[test]
    fn test_empty_pattern_list_matches_nothing() {
        let filter = IgnoreFilter::new(&[], &[]);
        assert!(!filter.is_ignored(Path::new("anything/at/all.txt")));
    }

    #[test]
    fn test_invalid_pattern_skipped() {
        let filter = IgnoreFilter::new(&[], &["[".to_string(), "*.tmp".to_string()]);
        assert!(filter.is_ignored(Path::new("a.tmp")));
        assert!(!filter.is_ignored(Path::new("a.txt")));
    }
}
