//! Architecture tracker integration tests
//!
//! Uses a scripted analysis model to drive the impact updater end to end:
//! document parse on project creation, change-log growth, and the
//! `implications_analysis` event stream.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use codetrail::models::event::EventKind;
use codetrail::models::project::NewProject;
use codetrail::services::{ArchitectureTracker, Broadcaster};
use codetrail::storage::{Database, EventFilter};
use codetrail_llm::{
    AnalysisModel, ImpactAssessment, ImpactRequest, LlmError, LlmResult, MatchRequest,
    MatchResponse,
};

struct ScriptedImpactModel;

#[async_trait]
impl AnalysisModel for ScriptedImpactModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn score_matches(&self, _request: &MatchRequest) -> LlmResult<MatchResponse> {
        Ok(MatchResponse::default())
    }

    async fn summarize_events(&self, _digest: &str) -> LlmResult<String> {
        Err(LlmError::Disabled)
    }

    async fn summarize_impact(&self, request: &ImpactRequest) -> LlmResult<ImpactAssessment> {
        // Affect every feature whose file list mentions the changed path.
        let affected = request
            .features
            .iter()
            .filter(|feature| feature.files.iter().any(|file| request.path.ends_with(file)))
            .map(|feature| feature.name.clone())
            .collect();
        Ok(ImpactAssessment {
            affected_features: affected,
            modified_classes: vec!["Service".to_string()],
            new_classes: vec![],
            architectural_change: false,
            impact_level: "moderate".to_string(),
            summary: format!("touched {}", request.path),
            concerns: vec![],
            recommendations: vec![],
        })
    }
}

const DOC: &str = "# Overview\n\nService under test.\n\n\
## Feature: F\n- Classes: Service\n- Files: svc.py\n\n\
# Class Registry\n- Service: does the work\n";

fn setup() -> (TempDir, Arc<Database>, ArchitectureTracker, i64) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ARCHITECTURE.md"), DOC).unwrap();

    let db = Arc::new(Database::in_memory().unwrap());
    let project = db
        .create_project(&NewProject {
            name: "p".to_string(),
            path: dir.path().to_string_lossy().to_string(),
            description: None,
            ignore_patterns: vec![],
            feature_doc_path: Some("ARCHITECTURE.md".to_string()),
            active: true,
        })
        .unwrap();

    let tracker = ArchitectureTracker::new(
        db.clone(),
        Arc::new(ScriptedImpactModel),
        Broadcaster::new(),
    );
    tracker.refresh_document(&project).unwrap();
    (dir, db, tracker, project.id)
}

fn file_change(db: &Database, project_id: i64, path: &str) -> codetrail::models::event::Event {
    db.append_event(
        EventKind::FileChange,
        Some(project_id),
        Some(path),
        &serde_json::json!({"event": "modified", "diff": "+x\n", "sha": "s", "size": 2, "baseline": "cache"}),
    )
    .unwrap()
}

#[tokio::test]
async fn impact_entry_lands_in_change_log_and_event_stream() {
    let (_dir, db, tracker, project_id) = setup();

    let event = file_change(&db, project_id, "svc.py");
    tracker.analyze_event(event.clone()).await;

    let record = db.get_project(project_id).unwrap().architecture.unwrap();
    assert_eq!(record.change_log.len(), 1);
    let entry = &record.change_log[0];
    assert_eq!(entry.event_id, event.id);
    assert_eq!(entry.affected_features, vec!["F"]);
    assert_eq!(entry.modified_classes, vec!["Service"]);
    assert_eq!(entry.file_path, "svc.py");

    let (items, total) = db
        .list_events(&EventFilter {
            kind: Some(EventKind::ImplicationsAnalysis),
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].payload["project_id"], project_id);
    assert_eq!(items[0].payload["event_count"], 1);
    assert!(items[0].payload["content"]
        .as_str()
        .unwrap()
        .contains("svc.py"));
}

#[tokio::test]
async fn change_log_is_newest_first() {
    let (_dir, db, tracker, project_id) = setup();

    for path in ["svc.py", "other.py"] {
        let event = file_change(&db, project_id, path);
        tracker.analyze_event(event).await;
    }

    let record = db.get_project(project_id).unwrap().architecture.unwrap();
    assert_eq!(record.change_log.len(), 2);
    assert_eq!(record.change_log[0].file_path, "other.py");
    assert_eq!(record.change_log[1].file_path, "svc.py");
}

#[tokio::test]
async fn non_file_change_events_are_ignored() {
    let (_dir, db, tracker, project_id) = setup();

    let event = db
        .append_event(
            EventKind::Prompt,
            Some(project_id),
            None,
            &serde_json::json!({"text": "hi"}),
        )
        .unwrap();
    tracker.analyze_event(event).await;

    let record = db.get_project(project_id).unwrap().architecture.unwrap();
    assert!(record.change_log.is_empty());
}

#[tokio::test]
async fn projects_without_architecture_are_skipped() {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(Database::in_memory().unwrap());
    let project = db
        .create_project(&NewProject {
            name: "bare".to_string(),
            path: dir.path().to_string_lossy().to_string(),
            description: None,
            ignore_patterns: vec![],
            feature_doc_path: None,
            active: true,
        })
        .unwrap();
    let tracker = ArchitectureTracker::new(
        db.clone(),
        Arc::new(ScriptedImpactModel),
        Broadcaster::new(),
    );

    let event = file_change(&db, project.id, "svc.py");
    tracker.analyze_event(event).await;

    // No record, no implications event.
    let (_, total) = db
        .list_events(&EventFilter {
            kind: Some(EventKind::ImplicationsAnalysis),
            limit: 10,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn reparse_preserves_change_log() {
    let (_dir, db, tracker, project_id) = setup();

    let event = file_change(&db, project_id, "svc.py");
    tracker.analyze_event(event).await;

    let project = db.get_project(project_id).unwrap();
    let refreshed = tracker.refresh_document(&project).unwrap();
    assert_eq!(refreshed.change_log.len(), 1);
    assert_eq!(refreshed.features.len(), 1);
}
