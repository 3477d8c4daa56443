//! HTTP Server
//!
//! Router assembly and the listener loop. Transport concerns only; all
//! behavior lives in the api handlers and services.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;

/// Build the full route table.
///
/// `/ai-chat/stats` is registered as a literal route next to the
/// `/ai-chat/:id` capture; literal segments win, and a regression test
/// pins that down.
pub fn build_router(state: AppState) -> Router {
    let cors_enabled = state.config.cors_enabled;
    let cors_origins = state.config.cors_origins.clone();

    let router = Router::new()
        .route("/health", get(api::health::health))
        .route(
            "/projects",
            post(api::projects::create_project).get(api::projects::list_projects),
        )
        .route(
            "/projects/:id",
            get(api::projects::get_project)
                .patch(api::projects::patch_project)
                .delete(api::projects::delete_project),
        )
        .route(
            "/projects/:id/config",
            get(api::projects::get_config).put(api::projects::put_config),
        )
        .route(
            "/projects/:id/technical-doc",
            get(api::projects::get_technical_doc),
        )
        .route(
            "/projects/:id/technical-doc/refresh",
            post(api::projects::refresh_technical_doc),
        )
        .route("/events", get(api::events::list_events))
        .route("/events/stream", get(api::events::stream_events))
        .route("/events/export", get(api::events::export_events))
        .route("/prompt", post(api::ingest::log_prompt))
        .route("/copilot", post(api::ingest::log_chat))
        .route("/error", post(api::ingest::log_error))
        .route("/summary/run", post(api::summary::run_summary))
        .route("/summary/latest", get(api::summary::latest_summary))
        .route("/ai-chat/stats", get(api::ai_chat::conversation_stats))
        .route(
            "/ai-chat",
            post(api::ai_chat::create_conversation).get(api::ai_chat::list_conversations),
        )
        .route("/ai-chat/:id", get(api::ai_chat::get_conversation))
        .route(
            "/ai-chat/:id/timeline",
            get(api::ai_chat::conversation_timeline),
        )
        .route("/ai-chat/:id/match", post(api::ai_chat::trigger_match))
        .layer(TraceLayer::new_for_http());

    let router = if cors_enabled {
        router.layer(build_cors_layer(&cors_origins))
    } else {
        router
    };

    router.with_state(state)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.parse::<HeaderValue>().ok())
            .collect();
        layer.allow_origin(parsed)
    }
}
