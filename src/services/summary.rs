//! Activity Summarizer
//!
//! On demand, condenses a digest of recent events into a short journal
//! entry through the analysis model and records it as a `summary` event.
//! Requires the analysis credential; without it the run endpoint rejects
//! the request instead of degrading.

use std::sync::Arc;

use codetrail_llm::AnalysisModel;

use super::broadcaster::Broadcaster;
use super::git::GitRepo;
use super::text::trim_marked;
use crate::models::event::{Envelope, Event, EventKind, EventPayload};
use crate::storage::{Database, EventFilter};
use crate::utils::error::{AppError, AppResult};

/// Events considered for one digest.
const DIGEST_EVENT_LIMIT: i64 = 50;
/// Character budget for the digest handed to the model.
const DIGEST_CHAR_LIMIT: usize = 6000;

pub struct Summarizer {
    db: Arc<Database>,
    model: Arc<dyn AnalysisModel>,
    broadcaster: Broadcaster,
    /// Default repository handle, used only for the digest header.
    repo: Option<GitRepo>,
}

impl Summarizer {
    pub fn new(
        db: Arc<Database>,
        model: Arc<dyn AnalysisModel>,
        broadcaster: Broadcaster,
        repo: Option<GitRepo>,
    ) -> Self {
        Self {
            db,
            model,
            broadcaster,
            repo,
        }
    }

    pub fn enabled(&self) -> bool {
        self.model.enabled()
    }

    /// Summarize recent activity and record the result. Returns the
    /// appended `summary` event.
    pub async fn run(&self, project_id: Option<i64>) -> AppResult<Event> {
        if !self.enabled() {
            return Err(AppError::validation(
                "OPENAI_API_KEY is required for summaries",
            ));
        }
        let (events, _) = self.db.list_events(&EventFilter {
            project_id,
            limit: DIGEST_EVENT_LIMIT,
            ..Default::default()
        })?;
        let digest = build_event_digest(&events, self.repo.as_ref());
        let content = self.model.summarize_events(&digest).await?;

        let payload = EventPayload::Summary { content };
        let event =
            self.db
                .append_event(EventKind::Summary, project_id, None, &payload.to_value())?;
        self.broadcaster.publish(Envelope::from(&event));
        Ok(event)
    }

    /// The most recent `summary` event, optionally scoped to one project.
    pub fn latest(&self, project_id: Option<i64>) -> AppResult<Event> {
        self.db
            .latest_event_of_kind(EventKind::Summary, project_id)?
            .ok_or_else(|| AppError::not_found("No summary available yet"))
    }
}

/// Render recent events (newest first) as a line-oriented digest with a
/// per-kind snippet, capped at the character budget.
pub fn build_event_digest(events: &[Event], repo: Option<&GitRepo>) -> String {
    let mut lines: Vec<String> = Vec::new();
    for event in events {
        let data = &event.payload;
        let snippet = match event.kind {
            EventKind::FileChange => format!(
                "{}; diff={}",
                data["event"].as_str().unwrap_or_default(),
                trim_marked(data["diff"].as_str().unwrap_or_default(), 400)
            ),
            EventKind::FileDeleted => "deleted".to_string(),
            EventKind::FolderCreated => "folder created".to_string(),
            EventKind::FolderDeleted => "folder deleted".to_string(),
            EventKind::Prompt => trim_marked(data["text"].as_str().unwrap_or_default(), 300),
            EventKind::CopilotChat => format!(
                "prompt={} | reply={}",
                trim_marked(data["prompt"].as_str().unwrap_or_default(), 200),
                trim_marked(data["response"].as_str().unwrap_or_default(), 200)
            ),
            EventKind::Error => trim_marked(data["message"].as_str().unwrap_or_default(), 200),
            EventKind::Summary => trim_marked(data["content"].as_str().unwrap_or_default(), 200),
            _ => String::new(),
        };

        let instant = chrono::DateTime::<chrono::Utc>::from_timestamp(event.timestamp, 0)
            .unwrap_or_default();
        lines.push(format!(
            "{} | {} | {} | {}",
            instant.format("%Y-%m-%dT%H:%M:%SZ"),
            event.kind,
            event.path.as_deref().unwrap_or("-"),
            snippet
        ));

        if lines.iter().map(String::len).sum::<usize>() > DIGEST_CHAR_LIMIT {
            lines.push("...[truncated digest]".to_string());
            break;
        }
    }

    let mut header: Vec<String> = Vec::new();
    if let Some(repo) = repo {
        header.push(format!("Repo: {}", repo.root().display()));
        if let Some(commit) = repo.head_summary() {
            header.push(format!("Latest commit: {}", commit));
        }
    }
    header.push(format!("Recent events (limit {}):", DIGEST_EVENT_LIMIT));

    let digest = header
        .into_iter()
        .chain(lines)
        .collect::<Vec<_>>()
        .join("\n");
    trim_marked(&digest, DIGEST_CHAR_LIMIT)
}
