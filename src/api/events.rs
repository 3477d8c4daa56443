//! Event Endpoints
//!
//! Paginated listing, the live SSE push channel, and the bulk export
//! surface.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::{default_limit, ApiError, ApiResult, Page};
use crate::models::event::{Event, EventKind};
use crate::state::AppState;
use crate::storage::EventFilter;

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    pub project_id: Option<i64>,
    pub kind: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl ListEventsParams {
    fn to_filter(&self) -> ApiResult<EventFilter> {
        let kind = match self.kind.as_deref() {
            Some(raw) => Some(raw.parse::<EventKind>().map_err(ApiError::from)?),
            None => None,
        };
        Ok(EventFilter {
            project_id: self.project_id,
            kind,
            search: self.search.clone(),
            offset: self.offset.max(0),
            limit: self.limit.clamp(1, 500),
        })
    }
}

/// GET /events
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsParams>,
) -> ApiResult<Json<Page<Event>>> {
    let filter = params.to_filter()?;
    let (items, total) = state.db.list_events(&filter)?;
    Ok(Json(Page::new(items, total, filter.offset, filter.limit)))
}

/// GET /events/stream
///
/// One JSON text frame per event envelope, in publish order. A subscriber
/// that falls behind loses the oldest pending envelopes; reconnecting and
/// querying `/events` recovers history. No acknowledgements.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.broadcaster.attach();
    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(envelope) => match serde_json::to_string(&envelope) {
            Ok(json) => Some(Ok(SseEvent::default().data(json))),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize envelope");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "slow event-stream subscriber dropped envelopes");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)))
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default = "default_format")]
    pub format: String,
    pub project_id: Option<i64>,
    pub kind: Option<String>,
}

fn default_format() -> String {
    "json".to_string()
}

/// Hard cap on exported rows.
const EXPORT_LIMIT: i64 = 10_000;

/// GET /events/export?format=json|markdown
pub async fn export_events(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let kind = match params.kind.as_deref() {
        Some(raw) => Some(raw.parse::<EventKind>().map_err(ApiError::from)?),
        None => None,
    };
    let (items, _) = state.db.list_events(&EventFilter {
        project_id: params.project_id,
        kind,
        search: None,
        offset: 0,
        limit: EXPORT_LIMIT,
    })?;

    match params.format.as_str() {
        "json" => Ok(Json(items).into_response()),
        "markdown" => {
            let body = render_markdown(&items);
            Ok((
                [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
                body,
            )
                .into_response())
        }
        other => Err(ApiError::bad_request(format!(
            "Unknown export format: {}",
            other
        ))),
    }
}

/// Render events grouped by day, newest day first, with fenced diffs for
/// file changes.
fn render_markdown(events: &[Event]) -> String {
    let mut output = String::from("# Activity Export\n");
    let mut current_day = String::new();
    for event in events {
        let instant = DateTime::<Utc>::from_timestamp(event.timestamp, 0).unwrap_or_default();
        let day = instant.format("%Y-%m-%d").to_string();
        if day != current_day {
            output.push_str(&format!("\n## {}\n\n", day));
            current_day = day;
        }
        output.push_str(&format!(
            "### [{}] {}{}\n",
            instant.format("%H:%M:%S"),
            event.kind,
            event
                .path
                .as_deref()
                .map(|path| format!(" `{}`", path))
                .unwrap_or_default()
        ));
        match event.kind {
            EventKind::FileChange => {
                if let Some(diff) = event.payload["diff"].as_str() {
                    output.push_str("```diff\n");
                    output.push_str(diff);
                    if !diff.ends_with('\n') {
                        output.push('\n');
                    }
                    output.push_str("```\n");
                }
            }
            EventKind::Prompt => {
                if let Some(text) = event.payload["text"].as_str() {
                    output.push_str(&format!("> {}\n", text));
                }
            }
            _ => {
                output.push_str(&format!("```json\n{}\n```\n", event.payload));
            }
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown_groups_by_day() {
        let events = vec![Event {
            id: 1,
            project_id: Some(1),
            timestamp: 86_400, // 1970-01-02
            kind: EventKind::FileChange,
            path: Some("f.txt".to_string()),
            payload: serde_json::json!({"event": "modified", "diff": "+x\n", "sha": "s", "size": 1, "baseline": "cache"}),
        }];
        let markdown = render_markdown(&events);
        assert!(markdown.contains("## 1970-01-02"));
        assert!(markdown.contains("`f.txt`"));
        assert!(markdown.contains("```diff\n+x\n```"));
    }

    #[test]
    fn test_render_markdown_prompt() {
        let events = vec![Event {
            id: 1,
            project_id: None,
            timestamp: 0,
            kind: EventKind::Prompt,
            path: None,
            payload: serde_json::json!({"text": "do the thing"}),
        }];
        let markdown = render_markdown(&events);
        assert!(markdown.contains("> do the thing"));
    }
}
