//! Git Operations
//!
//! Thin wrapper over the `git` CLI used for baseline seeding. Only read
//! operations are issued; the recorder never mutates a working tree.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::utils::error::{AppError, AppResult};

/// Result of a git command execution
#[derive(Debug, Clone)]
pub struct GitResult {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Low-level git command executor.
#[derive(Debug, Default, Clone)]
pub struct GitOps;

impl GitOps {
    pub fn new() -> Self {
        Self
    }

    /// Execute a git command in the specified directory.
    ///
    /// Stdout is returned as raw bytes: blob content must survive
    /// non-UTF-8 data untouched.
    pub fn execute(&self, cwd: &Path, args: &[&str]) -> AppResult<GitResult> {
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            // Disable interactive prompts to avoid hanging automation flows.
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| AppError::command(format!("Failed to execute git: {}", e)))?;

        Ok(GitResult {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// A resolved version-control handle for a project root.
#[derive(Debug, Clone)]
pub struct GitRepo {
    git: GitOps,
    /// Top-level working-tree directory.
    root: PathBuf,
}

impl GitRepo {
    /// Discover the repository containing `dir`, if any.
    pub fn discover(dir: &Path) -> Option<Self> {
        let git = GitOps::new();
        let result = git
            .execute(dir, &["rev-parse", "--show-toplevel"])
            .ok()
            .filter(|r| r.success)?;
        let top = String::from_utf8_lossy(&result.stdout).trim().to_string();
        if top.is_empty() {
            return None;
        }
        Some(Self {
            git,
            root: PathBuf::from(top),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The HEAD blob for a path relative to the working-tree root, or None
    /// when the path is not tracked at HEAD.
    pub fn head_blob(&self, rel_path: &str) -> Option<Vec<u8>> {
        let spec = format!("HEAD:{}", rel_path.replace('\\', "/"));
        let result = self.git.execute(&self.root, &["show", &spec]).ok()?;
        if result.success {
            Some(result.stdout)
        } else {
            None
        }
    }

    /// Short hash and subject of the HEAD commit, when one exists.
    pub fn head_summary(&self) -> Option<String> {
        let result = self
            .git
            .execute(&self.root, &["log", "-1", "--format=%h %s"])
            .ok()
            .filter(|r| r.success)?;
        let line = String::from_utf8_lossy(&result.stdout).trim().to_string();
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }

    /// Path of `abs` relative to the working-tree root, when inside it.
    pub fn relative_to_root(&self, abs: &Path) -> Option<String> {
        abs.strip_prefix(&self.root)
            .ok()
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_outside_repository() {
        let dir = TempDir::new().unwrap();
        assert!(GitRepo::discover(dir.path()).is_none());
    }

    #[test]
    fn test_discover_and_head_blob() {
        let dir = TempDir::new().unwrap();
        let git = GitOps::new();
        // Skip silently when git is unavailable in the environment.
        if git.execute(dir.path(), &["init"]).is_err() {
            return;
        }
        git.execute(dir.path(), &["config", "user.email", "t@example.com"])
            .unwrap();
        git.execute(dir.path(), &["config", "user.name", "t"])
            .unwrap();
        std::fs::write(dir.path().join("tracked.txt"), b"committed\n").unwrap();
        git.execute(dir.path(), &["add", "."]).unwrap();
        git.execute(dir.path(), &["commit", "-m", "init", "--no-gpg-sign"])
            .unwrap();

        let repo = GitRepo::discover(dir.path()).expect("repository discovered");
        assert_eq!(repo.head_blob("tracked.txt").unwrap(), b"committed\n");
        assert!(repo.head_blob("absent.txt").is_none());
        assert!(repo.head_summary().unwrap().contains("init"));
    }
}
