//! Ingest Endpoints
//!
//! External write paths: prompts, assistant chats, and error notes. Every
//! operation writes through the store and then publishes on the
//! broadcaster, exactly like the watcher path.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::ApiResult;
use crate::models::event::{
    CopilotChatPayload, Envelope, ErrorPayload, Event, EventPayload, PromptPayload,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogPromptRequest {
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
}

/// POST /prompt
pub async fn log_prompt(
    State(state): State<AppState>,
    Json(input): Json<LogPromptRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let payload = EventPayload::Prompt(PromptPayload {
        text: input.text,
        source: input.source,
        model: input.model,
    });
    append_and_publish(&state, input.project_id, None, payload).await
}

#[derive(Debug, Deserialize)]
pub struct LogChatRequest {
    pub prompt: String,
    pub response: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
}

/// POST /copilot
pub async fn log_chat(
    State(state): State<AppState>,
    Json(input): Json<LogChatRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let payload = EventPayload::CopilotChat(CopilotChatPayload {
        prompt: input.prompt,
        response: input.response,
        source: input.source,
        model: input.model,
        conversation_id: input.conversation_id,
    });
    append_and_publish(&state, input.project_id, None, payload).await
}

#[derive(Debug, Deserialize)]
pub struct LogErrorRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub project_id: Option<i64>,
}

/// POST /error
pub async fn log_error(
    State(state): State<AppState>,
    Json(input): Json<LogErrorRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let payload = EventPayload::Error(ErrorPayload {
        message: input.message,
        context: input.context,
    });
    append_and_publish(&state, input.project_id, None, payload).await
}

async fn append_and_publish(
    state: &AppState,
    project_id: Option<i64>,
    path: Option<&str>,
    payload: EventPayload,
) -> ApiResult<(StatusCode, Json<Event>)> {
    if let Some(project_id) = project_id {
        state.db.get_project(project_id)?;
    }
    let event = state
        .db
        .append_event(payload.kind(), project_id, path, &payload.to_value())?;
    state.broadcaster.publish(Envelope::from(&event));
    Ok((StatusCode::CREATED, Json(event)))
}
