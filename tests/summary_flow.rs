//! Summarizer integration tests
//!
//! Drives Summarizer::run with a scripted analysis model: the digest is
//! built from stored events, the journal entry lands as a `summary` event,
//! and live subscribers observe it.

use std::sync::Arc;

use async_trait::async_trait;

use codetrail::models::event::EventKind;
use codetrail::models::project::NewProject;
use codetrail::services::{Broadcaster, Summarizer};
use codetrail::storage::Database;
use codetrail_llm::{
    AnalysisModel, ImpactAssessment, ImpactRequest, LlmError, LlmResult, MatchRequest,
    MatchResponse,
};

/// Echoes the first digest line back so tests can assert what it was fed.
struct ScriptedJournalModel;

#[async_trait]
impl AnalysisModel for ScriptedJournalModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn score_matches(&self, _request: &MatchRequest) -> LlmResult<MatchResponse> {
        Ok(MatchResponse::default())
    }

    async fn summarize_impact(&self, _request: &ImpactRequest) -> LlmResult<ImpactAssessment> {
        Err(LlmError::Disabled)
    }

    async fn summarize_events(&self, digest: &str) -> LlmResult<String> {
        let first_line = digest.lines().next().unwrap_or_default();
        Ok(format!("- summarized from: {}", first_line))
    }
}

fn setup() -> (Arc<Database>, Broadcaster, Summarizer, i64) {
    let db = Arc::new(Database::in_memory().unwrap());
    let project = db
        .create_project(&NewProject {
            name: "p".to_string(),
            path: "/tmp/p".to_string(),
            description: None,
            ignore_patterns: vec![],
            feature_doc_path: None,
            active: true,
        })
        .unwrap();
    let broadcaster = Broadcaster::new();
    let summarizer = Summarizer::new(
        db.clone(),
        Arc::new(ScriptedJournalModel),
        broadcaster.clone(),
        None,
    );
    (db, broadcaster, summarizer, project.id)
}

#[tokio::test]
async fn run_appends_summary_event_and_publishes() {
    let (db, broadcaster, summarizer, pid) = setup();
    db.append_event(
        EventKind::Prompt,
        Some(pid),
        None,
        &serde_json::json!({"text": "add retries"}),
    )
    .unwrap();

    let mut subscription = broadcaster.attach();
    let event = summarizer.run(Some(pid)).await.unwrap();

    assert_eq!(event.kind, EventKind::Summary);
    assert_eq!(event.project_id, Some(pid));
    let content = event.payload["content"].as_str().unwrap();
    assert!(content.starts_with("- summarized from: Recent events"));

    let envelope = subscription.recv().await.unwrap();
    assert_eq!(envelope.id, event.id);
    assert_eq!(envelope.kind, EventKind::Summary);
}

#[tokio::test]
async fn latest_returns_the_run_result() {
    let (_db, _broadcaster, summarizer, pid) = setup();
    assert!(summarizer.latest(Some(pid)).is_err());

    let run = summarizer.run(Some(pid)).await.unwrap();
    let latest = summarizer.latest(Some(pid)).unwrap();
    assert_eq!(latest.id, run.id);

    // Unscoped lookup sees it too.
    assert_eq!(summarizer.latest(None).unwrap().id, run.id);
}

#[tokio::test]
async fn successive_runs_supersede() {
    let (_db, _broadcaster, summarizer, pid) = setup();
    summarizer.run(Some(pid)).await.unwrap();
    let second = summarizer.run(Some(pid)).await.unwrap();
    assert_eq!(summarizer.latest(Some(pid)).unwrap().id, second.id);
}

#[tokio::test]
async fn disabled_model_rejects_run() {
    let db = Arc::new(Database::in_memory().unwrap());
    let summarizer = Summarizer::new(
        db,
        codetrail_llm::build_model(None),
        Broadcaster::new(),
        None,
    );
    let err = summarizer.run(None).await.unwrap_err();
    assert!(err.to_string().contains("OPENAI_API_KEY"));
}
