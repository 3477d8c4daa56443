//! Architecture Tracker
//!
//! Parses a project's markdown architecture document into a structured
//! record, and extends that record with an impact entry for each file
//! change that plausibly affects the architecture. Impact updates for the
//! same project are serialized; across projects they run independently.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use codetrail_llm::{AnalysisModel, FeatureSummary, ImpactRequest};
use tokio::sync::Mutex;

use super::broadcaster::Broadcaster;
use super::text::truncate_chars;
use crate::models::architecture::{ArchitectureRecord, ChangeLogEntry, FeatureMapping, ImpactLevel};
use crate::models::event::{Envelope, Event, EventKind, EventPayload, ImplicationsPayload};
use crate::models::project::Project;
use crate::storage::Database;
use crate::utils::error::{AppError, AppResult};

/// Truncation limits for the impact prompt.
const OVERVIEW_CHARS: usize = 600;
const DIFF_EXCERPT_CHARS: usize = 400;

// ── Document parser ─────────────────────────────────────────────────────

/// Parse a markdown architecture document.
///
/// Recognized sections (tolerant of heading level and case):
/// `Overview`, `Feature: <name>` blocks, `Class Registry`, `Dependencies`.
/// Missing sections yield empty collections; unknown content is ignored.
pub fn parse_architecture_document(path: &Path, source_path: &str) -> AppResult<ArchitectureRecord> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_architecture_text(&content, source_path))
}

enum Section {
    None,
    Overview,
    Feature,
    ClassRegistry,
    Dependencies,
}

pub fn parse_architecture_text(content: &str, source_path: &str) -> ArchitectureRecord {
    let mut record = ArchitectureRecord {
        source_path: source_path.to_string(),
        updated_at: Utc::now().timestamp(),
        ..Default::default()
    };
    let mut section = Section::None;
    let mut overview_lines: Vec<String> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(heading) = heading_text(trimmed) {
            let lowered = heading.to_lowercase();
            if lowered == "overview" {
                section = Section::Overview;
            } else if let Some(name) = heading
                .strip_prefix("Feature:")
                .or_else(|| heading.strip_prefix("feature:"))
            {
                record.features.push(FeatureMapping {
                    name: name.trim().to_string(),
                    classes: vec![],
                    files: vec![],
                    dependencies: vec![],
                });
                section = Section::Feature;
            } else if lowered == "class registry" {
                section = Section::ClassRegistry;
            } else if lowered == "dependencies" {
                section = Section::Dependencies;
            } else if lowered.starts_with("feature mapping") {
                // The container heading; feature blocks follow.
                section = Section::None;
            } else {
                section = Section::None;
            }
            continue;
        }

        match section {
            Section::Overview => {
                if !trimmed.is_empty() {
                    overview_lines.push(trimmed.to_string());
                }
            }
            Section::Feature => {
                if let Some((label, rest)) = bullet_label(trimmed) {
                    if let Some(feature) = record.features.last_mut() {
                        match label.as_str() {
                            "classes" => feature.classes = comma_list(rest),
                            "files" => feature.files = comma_list(rest),
                            "dependencies" => feature.dependencies = comma_list(rest),
                            _ => {}
                        }
                    }
                }
            }
            Section::ClassRegistry => {
                if let Some(body) = bullet_body(trimmed) {
                    if let Some((name, description)) = body.split_once(':') {
                        let name = name.trim();
                        if !name.is_empty() {
                            record
                                .class_registry
                                .insert(name.to_string(), description.trim().to_string());
                        }
                    }
                }
            }
            Section::Dependencies => {
                if let Some((label, rest)) = bullet_label(trimmed) {
                    match label.as_str() {
                        "production" => record.dependencies.production = comma_list(rest),
                        "development" => record.dependencies.development = comma_list(rest),
                        _ => {}
                    }
                }
            }
            Section::None => {}
        }
    }

    record.overview = overview_lines.join("\n");
    record
}

fn heading_text(line: &str) -> Option<&str> {
    let stripped = line.trim_start_matches('#');
    if stripped.len() == line.len() {
        return None;
    }
    Some(stripped.trim())
}

fn bullet_body(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim)
}

/// `- Classes: A, B` → ("classes", "A, B")
fn bullet_label(line: &str) -> Option<(String, &str)> {
    let body = bullet_body(line)?;
    let (label, rest) = body.split_once(':')?;
    Some((label.trim().to_lowercase(), rest.trim()))
}

fn comma_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

// ── Impact tracker ──────────────────────────────────────────────────────

pub struct ArchitectureTracker {
    db: Arc<Database>,
    model: Arc<dyn AnalysisModel>,
    broadcaster: Broadcaster,
    /// Per-project critical sections guarding the change log.
    project_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ArchitectureTracker {
    pub fn new(db: Arc<Database>, model: Arc<dyn AnalysisModel>, broadcaster: Broadcaster) -> Self {
        Self {
            db,
            model,
            broadcaster,
            project_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Whether impact analysis runs at all.
    pub fn enabled(&self) -> bool {
        self.model.enabled()
    }

    /// Parse (or re-parse) the project's architecture document and store
    /// the result. A parse failure leaves the previous record intact.
    pub fn refresh_document(&self, project: &Project) -> AppResult<ArchitectureRecord> {
        let doc_rel = project.feature_doc_path.as_deref().ok_or_else(|| {
            AppError::validation(format!(
                "Project {} has no architecture document configured",
                project.id
            ))
        })?;
        let doc_path = Path::new(&project.path).join(doc_rel);
        let mut record = parse_architecture_document(&doc_path, doc_rel)?;

        // Carry the existing change log across re-parses.
        if let Some(previous) = project.architecture.as_ref() {
            record.change_log = previous.change_log.clone();
        }
        self.db.set_project_architecture(project.id, Some(&record))?;
        Ok(record)
    }

    /// Analyze one `file_change` event for a project with an architecture
    /// record: ask the model for an impact assessment, prepend it to the
    /// change log, and append an `implications_analysis` event. Failures
    /// are logged and leave the record unchanged.
    pub async fn analyze_event(&self, event: Event) {
        if event.kind != EventKind::FileChange || !self.enabled() {
            return;
        }
        let Some(project_id) = event.project_id else {
            return;
        };
        if let Err(e) = self.analyze_inner(project_id, &event).await {
            tracing::warn!(project_id, event_id = event.id, error = %e, "impact analysis skipped");
        }
    }

    async fn analyze_inner(&self, project_id: i64, event: &Event) -> AppResult<()> {
        let project = self.db.get_project(project_id)?;
        let Some(record) = project.architecture else {
            return Ok(());
        };

        let path = event.path.clone().unwrap_or_default();
        let change_type = event.payload["event"]
            .as_str()
            .unwrap_or("modified")
            .to_string();
        let request = ImpactRequest {
            overview: truncate_chars(&record.overview, OVERVIEW_CHARS),
            features: record
                .features
                .iter()
                .map(|feature| FeatureSummary {
                    name: feature.name.clone(),
                    files: feature.files.clone(),
                })
                .collect(),
            classes: record.class_registry.keys().cloned().collect(),
            path: path.clone(),
            change_type: change_type.clone(),
            diff_excerpt: truncate_chars(
                event.payload["diff"].as_str().unwrap_or_default(),
                DIFF_EXCERPT_CHARS,
            ),
        };

        let assessment = self.model.summarize_impact(&request).await?;

        let entry = ChangeLogEntry {
            event_id: event.id,
            timestamp: Utc::now().timestamp(),
            file_path: path,
            change_type,
            affected_features: assessment.affected_features,
            modified_classes: assessment.modified_classes,
            new_classes: assessment.new_classes,
            architectural_change: assessment.architectural_change,
            impact_level: parse_impact_level(&assessment.impact_level),
            summary: assessment.summary.clone(),
            concerns: assessment.concerns,
            recommendations: assessment.recommendations,
        };

        // Serialize change-log mutation per project.
        let lock = self.project_lock(project_id).await;
        let _guard = lock.lock().await;

        // Re-read inside the critical section so concurrent updates compose.
        let mut record = self
            .db
            .get_project(project_id)?
            .architecture
            .unwrap_or(record);
        record.push_impact(entry);
        let change_log_len = record.change_log.len();
        self.db
            .set_project_architecture(project_id, Some(&record))?;

        let payload = EventPayload::Implications(ImplicationsPayload {
            content: assessment.summary,
            project_id,
            event_count: change_log_len as i64,
        });
        let appended = self.db.append_event(
            EventKind::ImplicationsAnalysis,
            Some(project_id),
            event.path.as_deref(),
            &payload.to_value(),
        )?;
        self.broadcaster.publish(Envelope::from(&appended));
        Ok(())
    }

    async fn project_lock(&self, project_id: i64) -> Arc<Mutex<()>> {
        self.project_locks
            .lock()
            .await
            .entry(project_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn parse_impact_level(text: &str) -> ImpactLevel {
    match text.to_lowercase().as_str() {
        "major" => ImpactLevel::Major,
        "moderate" => ImpactLevel::Moderate,
        _ => ImpactLevel::Minor,
    }
}
