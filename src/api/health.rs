//! Health Probe

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub watchers: usize,
    pub version: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.is_healthy();
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        watchers: state.supervisor.watcher_count().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}
