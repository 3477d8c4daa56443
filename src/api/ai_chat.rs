//! AI Conversation Endpoints
//!
//! Conversation ingest (which schedules the correlator), listing, stats,
//! the joined timeline view, and the manual correlation trigger.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{default_limit, ApiResult, Page};
use crate::models::conversation::{AiConversation, AiStats, NewConversation, TimelineEntry};
use crate::models::event::{CopilotChatPayload, Envelope, EventPayload};
use crate::services::extract::{extract_code_snippets, extract_file_references};
use crate::state::AppState;
use crate::storage::{ConversationFilter, ConversationRecord};

/// POST /ai-chat
///
/// Inserts the conversation row (with deterministic snippet/file-reference
/// extraction), records a `copilot_chat` event, and schedules a correlator
/// task. The response returns as soon as the rows are durable.
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(input): Json<NewConversation>,
) -> ApiResult<(StatusCode, Json<AiConversation>)> {
    let session_id = input
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let record = ConversationRecord {
        project_id: input.project_id,
        session_id: session_id.clone(),
        provider: input.provider.clone(),
        model: input.model.clone(),
        user_prompt: input.user_prompt.clone(),
        assistant_response: input.assistant_response.clone(),
        code_snippets: extract_code_snippets(&input.assistant_response),
        file_references: extract_file_references(&input.assistant_response),
        metadata: input.metadata.clone(),
    };
    let conversation = state.db.insert_ai_conversation(&record)?;

    // The chat also lands in the event stream like any other ingest write.
    let payload = EventPayload::CopilotChat(CopilotChatPayload {
        prompt: input.user_prompt,
        response: input.assistant_response,
        source: Some(input.provider),
        model: input.model,
        conversation_id: Some(session_id),
    });
    let event = state.db.append_event(
        payload.kind(),
        conversation.project_id,
        None,
        &payload.to_value(),
    )?;
    state.broadcaster.publish(Envelope::from(&event));

    if state.correlator.enabled() {
        let correlator = state.correlator.clone();
        let conversation_id = conversation.id;
        state.tasks.spawn("correlate", async move {
            if let Err(e) = correlator.correlate(conversation_id).await {
                tracing::warn!(conversation_id, error = %e, "correlation task failed");
            }
        });
    }

    Ok((StatusCode::CREATED, Json(conversation)))
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsParams {
    pub project_id: Option<i64>,
    pub ai_provider: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /ai-chat
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(params): Query<ListConversationsParams>,
) -> ApiResult<Json<Page<AiConversation>>> {
    let filter = ConversationFilter {
        project_id: params.project_id,
        provider: params.ai_provider,
        offset: params.offset.max(0),
        limit: params.limit.clamp(1, 500),
    };
    let (items, total) = state.db.list_ai_conversations(&filter)?;
    Ok(Json(Page::new(items, total, filter.offset, filter.limit)))
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub project_id: Option<i64>,
}

/// GET /ai-chat/stats
///
/// Registered as a literal route so it can never be shadowed by the
/// `/ai-chat/{id}` capture.
pub async fn conversation_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> ApiResult<Json<AiStats>> {
    Ok(Json(state.db.ai_stats(params.project_id)?))
}

/// GET /ai-chat/{id}
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<AiConversation>> {
    Ok(Json(state.db.read_ai_conversation(id)?))
}

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub conversation: AiConversation,
    pub timeline: Vec<TimelineEntry>,
}

/// GET /ai-chat/{id}/timeline
pub async fn conversation_timeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TimelineResponse>> {
    let conversation = state.db.read_ai_conversation(id)?;
    let matches = state.db.list_ai_matches(id)?;

    let mut timeline = Vec::with_capacity(matches.len());
    for entry in matches {
        let event = state.db.read_event(entry.event_id).ok();
        timeline.push(TimelineEntry {
            event_id: entry.event_id,
            path: event.as_ref().and_then(|e| e.path.clone()),
            match_category: entry.match_category,
            confidence: entry.confidence,
            reasoning: entry.reasoning,
            time_delta_seconds: entry.time_delta_seconds,
            diff: event
                .as_ref()
                .and_then(|e| e.payload["diff"].as_str().map(String::from)),
        });
    }
    Ok(Json(TimelineResponse {
        conversation,
        timeline,
    }))
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub conversation_id: i64,
    pub match_count: usize,
}

/// POST /ai-chat/{id}/match
///
/// Manual correlator trigger; runs inline and reports the inserted count.
pub async fn trigger_match(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MatchResponse>> {
    let match_count = state.correlator.correlate(id).await?;
    Ok(Json(MatchResponse {
        conversation_id: id,
        match_count,
    }))
}
