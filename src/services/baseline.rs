//! Baseline Cache
//!
//! Holds the last-observed bytes per absolute path for diffing. On the
//! first observation of a path inside a version-control working tree, the
//! baseline is seeded from the HEAD blob; afterwards the cache is
//! authoritative. Owned by a single watcher instance, never shared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::git::GitRepo;
use crate::models::event::BaselineSource;

pub struct BaselineCache {
    entries: HashMap<PathBuf, Vec<u8>>,
    repo: Option<GitRepo>,
}

impl BaselineCache {
    pub fn new(repo: Option<GitRepo>) -> Self {
        Self {
            entries: HashMap::new(),
            repo,
        }
    }

    /// The bytes considered "previous" for `abs_path`, and where they came
    /// from. First observation consults HEAD; otherwise the cache.
    pub fn previous(&self, abs_path: &Path) -> (Vec<u8>, BaselineSource) {
        if let Some(bytes) = self.entries.get(abs_path) {
            return (bytes.clone(), BaselineSource::Cache);
        }
        if let Some(repo) = &self.repo {
            if let Some(rel) = repo.relative_to_root(abs_path) {
                if let Some(blob) = repo.head_blob(&rel) {
                    return (blob, BaselineSource::Head);
                }
            }
        }
        (Vec::new(), BaselineSource::Cache)
    }

    /// Record the new bytes as the baseline for subsequent observations.
    pub fn update(&mut self, abs_path: PathBuf, bytes: Vec<u8>) {
        self.entries.insert(abs_path, bytes);
    }

    /// Drop the baseline for a deleted path so a re-creation diffs from
    /// HEAD (or empty) again.
    pub fn forget(&mut self, abs_path: &Path) {
        self.entries.remove(abs_path);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
