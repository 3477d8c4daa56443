//! Summary Endpoints
//!
//! On-demand activity summarization and retrieval of the most recent
//! summary. Running a summary requires the analysis credential.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::models::event::Event;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub project_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub event_id: i64,
    /// Unix seconds.
    pub timestamp: i64,
    pub content: String,
}

impl From<Event> for SummaryResponse {
    fn from(event: Event) -> Self {
        Self {
            event_id: event.id,
            timestamp: event.timestamp,
            content: event.payload["content"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// POST /summary/run
pub async fn run_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Json<SummaryResponse>> {
    let event = state.summarizer.run(params.project_id).await?;
    Ok(Json(event.into()))
}

/// GET /summary/latest
pub async fn latest_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Json<SummaryResponse>> {
    let event = state.summarizer.latest(params.project_id)?;
    Ok(Json(event.into()))
}
