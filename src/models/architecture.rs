//! Architecture Record Model
//!
//! The structured, living summary of a project's architecture document,
//! embedded in the project row and extended by the impact updater.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of change-log entries retained per project.
pub const MAX_CHANGE_LOG: usize = 100;

/// One feature block parsed from the architecture document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMapping {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Production/development dependency lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySets {
    #[serde(default)]
    pub production: Vec<String>,
    #[serde(default)]
    pub development: Vec<String>,
}

/// Severity of a single change's architectural impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Minor,
    Moderate,
    Major,
}

impl Default for ImpactLevel {
    fn default() -> Self {
        Self::Minor
    }
}

/// One impact entry in the change log, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub event_id: i64,
    /// Unix seconds.
    pub timestamp: i64,
    pub file_path: String,
    pub change_type: String,
    #[serde(default)]
    pub affected_features: Vec<String>,
    #[serde(default)]
    pub modified_classes: Vec<String>,
    #[serde(default)]
    pub new_classes: Vec<String>,
    #[serde(default)]
    pub architectural_change: bool,
    #[serde(default)]
    pub impact_level: ImpactLevel,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concerns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

/// Parsed architecture document plus its bounded change log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchitectureRecord {
    /// Path of the source markdown document, relative to the project root.
    pub source_path: String,
    /// Unix seconds of the last parse or impact update.
    pub updated_at: i64,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub features: Vec<FeatureMapping>,
    /// Class name → description.
    #[serde(default)]
    pub class_registry: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: DependencySets,
    /// Bounded FIFO, newest first.
    #[serde(default)]
    pub change_log: Vec<ChangeLogEntry>,
}

impl ArchitectureRecord {
    /// Prepend an impact entry, evicting the oldest past [`MAX_CHANGE_LOG`].
    pub fn push_impact(&mut self, entry: ChangeLogEntry) {
        self.updated_at = entry.timestamp;
        self.change_log.insert(0, entry);
        self.change_log.truncate(MAX_CHANGE_LOG);
    }

    /// Feature names whose file lists mention the given relative path.
    pub fn features_touching(&self, rel_path: &str) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| f.files.iter().any(|file| rel_path.ends_with(file.as_str())))
            .map(|f| f.name.clone())
            .collect()
    }
}
