//! Project Model
//!
//! Registered project directories and their watch configuration.

use serde::{Deserialize, Serialize};

use super::architecture::ArchitectureRecord;

/// A registered project directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    /// Absolute path of the watched directory, unique across projects.
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
    pub active: bool,
    /// Glob patterns matched against the relative path and the basename.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Architecture document path, relative to the project root.
    #[serde(default)]
    pub feature_doc_path: Option<String>,
    /// Parsed architecture record, present once the document has been parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ArchitectureRecord>,
}

/// Input for creating a project.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub feature_doc_path: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update applied by PATCH.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// The watcher-relevant slice of project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub feature_doc_path: Option<String>,
}

/// Listing view with derived stats.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub event_count: i64,
    pub has_architecture: bool,
    pub change_log_len: usize,
    pub architecture_updated_at: Option<i64>,
}

impl ProjectSummary {
    pub fn from_project(project: Project, event_count: i64) -> Self {
        let (has_architecture, change_log_len, architecture_updated_at) =
            match project.architecture.as_ref() {
                Some(record) => (true, record.change_log.len(), Some(record.updated_at)),
                None => (false, 0, None),
            };
        Self {
            project,
            event_count,
            has_architecture,
            change_log_len,
            architecture_updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_defaults() {
        let input: NewProject =
            serde_json::from_str(r#"{"name": "A", "path": "/p/a"}"#).unwrap();
        assert!(input.active);
        assert!(input.ignore_patterns.is_empty());
        assert!(input.feature_doc_path.is_none());
    }

    #[test]
    fn test_summary_without_architecture() {
        let project = Project {
            id: 1,
            name: "A".to_string(),
            path: "/p/a".to_string(),
            description: None,
            created_at: 0,
            active: true,
            ignore_patterns: vec![],
            feature_doc_path: None,
            architecture: None,
        };
        let summary = ProjectSummary::from_project(project, 3);
        assert_eq!(summary.event_count, 3);
        assert!(!summary.has_architecture);
        assert_eq!(summary.change_log_len, 0);
    }
}
