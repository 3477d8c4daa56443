//! Correlator
//!
//! Scores semantic matches between an AI conversation and recent
//! code-change events. Scheduled as a background task on every
//! conversation insert; the inserting request never waits for it. Falls
//! back to literal file-reference overlap when the model fails.

use std::sync::Arc;

use codetrail_llm::{AnalysisModel, MatchCandidate, MatchRequest, ScoredMatch};

use super::broadcaster::Broadcaster;
use super::text::truncate_chars;
use crate::models::conversation::{AiConversation, MatchCategory};
use crate::models::event::{AiMatchPayload, Envelope, Event, EventKind, EventPayload};
use crate::storage::{Database, MatchRecord};
use crate::utils::error::AppResult;

/// Truncation limits for the model prompt.
const PROMPT_CHARS: usize = 500;
const RESPONSE_CHARS: usize = 1000;
const DIFF_EXCERPT_CHARS: usize = 300;
/// Candidates offered to the model at most.
const MAX_CANDIDATES: usize = 20;

/// Fallback confidence for literal file-reference overlap.
const FALLBACK_CONFIDENCE: f64 = 0.5;

pub struct Correlator {
    db: Arc<Database>,
    model: Arc<dyn AnalysisModel>,
    broadcaster: Broadcaster,
    window_secs: i64,
}

impl Correlator {
    pub fn new(
        db: Arc<Database>,
        model: Arc<dyn AnalysisModel>,
        broadcaster: Broadcaster,
        window_secs: i64,
    ) -> Self {
        Self {
            db,
            model,
            broadcaster,
            window_secs,
        }
    }

    /// Whether correlation runs at all. Without a credential the component
    /// is a no-op.
    pub fn enabled(&self) -> bool {
        self.model.enabled()
    }

    /// Correlate one conversation against recent code changes. Returns the
    /// number of match rows inserted.
    pub async fn correlate(&self, conversation_id: i64) -> AppResult<usize> {
        if !self.enabled() {
            return Ok(0);
        }
        let conversation = self.db.read_ai_conversation(conversation_id)?;
        let events = self.db.events_in_window(
            conversation.project_id,
            EventKind::FileChange,
            conversation.timestamp - self.window_secs,
            conversation.timestamp + self.window_secs,
        )?;

        if events.is_empty() {
            self.db
                .set_conversation_matches(conversation.id, &[], 0.0)?;
            return Ok(0);
        }

        let scored = match self.model.score_matches(&build_request(&conversation, &events)).await
        {
            Ok(response) => response.matches,
            Err(e) => {
                tracing::warn!(
                    conversation_id = conversation.id,
                    error = %e,
                    "match scoring failed; using file-overlap fallback"
                );
                fallback_matches(&conversation, &events)
            }
        };

        let inserted = self.insert_matches(&conversation, &events, scored)?;
        self.publish_summary(&conversation, events.len(), inserted.len());
        Ok(inserted.len())
    }

    /// Insert validated match rows and bring the conversation's
    /// denormalized match set in line with them.
    fn insert_matches(
        &self,
        conversation: &AiConversation,
        events: &[Event],
        scored: Vec<ScoredMatch>,
    ) -> AppResult<Vec<i64>> {
        let mut matched_ids = Vec::new();
        let mut confidences = Vec::new();
        for scored_match in scored {
            // Only candidate ids count; anything else the model invented is dropped.
            let Some(event) = events.iter().find(|e| e.id == scored_match.event_id) else {
                continue;
            };
            let category = scored_match
                .match_category
                .parse::<MatchCategory>()
                .unwrap_or(MatchCategory::Suggested);
            let record = MatchRecord {
                conversation_id: conversation.id,
                event_id: event.id,
                match_category: category,
                confidence: scored_match.confidence,
                reasoning: scored_match.reasoning,
                file_overlap: scored_match.file_overlap,
                time_delta_seconds: event.timestamp - conversation.timestamp,
            };
            let inserted = self.db.insert_ai_match(&record)?;
            matched_ids.push(inserted.event_id);
            confidences.push(inserted.confidence);
        }

        let mean = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };
        self.db
            .set_conversation_matches(conversation.id, &matched_ids, mean)?;
        Ok(matched_ids)
    }

    /// Append an `ai_match` summary event so live subscribers can observe
    /// correlation progress.
    fn publish_summary(&self, conversation: &AiConversation, candidates: usize, matches: usize) {
        let payload = EventPayload::AiMatch(AiMatchPayload {
            prompt_count: 1,
            code_change_count: candidates as i64,
            match_count: matches as i64,
        });
        match self.db.append_event(
            EventKind::AiMatch,
            conversation.project_id,
            None,
            &payload.to_value(),
        ) {
            Ok(event) => self.broadcaster.publish(Envelope::from(&event)),
            Err(e) => {
                tracing::warn!(conversation_id = conversation.id, error = %e, "failed to record match summary")
            }
        }
    }
}

fn build_request(conversation: &AiConversation, events: &[Event]) -> MatchRequest {
    MatchRequest {
        user_prompt: truncate_chars(&conversation.user_prompt, PROMPT_CHARS),
        assistant_response: truncate_chars(&conversation.assistant_response, RESPONSE_CHARS),
        file_references: conversation.file_references.clone(),
        candidates: events
            .iter()
            .take(MAX_CANDIDATES)
            .map(|event| MatchCandidate {
                event_id: event.id,
                path: event.path.clone().unwrap_or_default(),
                diff_excerpt: truncate_chars(
                    event.payload["diff"].as_str().unwrap_or_default(),
                    DIFF_EXCERPT_CHARS,
                ),
                time_delta_seconds: event.timestamp - conversation.timestamp,
            })
            .collect(),
    }
}

/// Degenerate matcher: a `related` match at fixed confidence for every
/// candidate whose path appears literally in the conversation's file
/// references.
fn fallback_matches(conversation: &AiConversation, events: &[Event]) -> Vec<ScoredMatch> {
    events
        .iter()
        .filter(|event| {
            event
                .path
                .as_deref()
                .map(|path| {
                    conversation
                        .file_references
                        .iter()
                        .any(|reference| path.ends_with(reference.as_str()) || reference.ends_with(path))
                })
                .unwrap_or(false)
        })
        .map(|event| ScoredMatch {
            event_id: event.id,
            match_category: MatchCategory::Related.as_str().to_string(),
            confidence: FALLBACK_CONFIDENCE,
            reasoning: "file referenced in conversation".to_string(),
            file_overlap: 1,
            time_delta: event.timestamp - conversation.timestamp,
        })
        .collect()
}
