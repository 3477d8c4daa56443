//! codetrail
//!
//! Localhost development-activity recorder: watches registered project
//! directories, records typed events with unified diffs, exposes them over
//! a JSON/HTTP API with a live push channel, and correlates externally
//! supplied AI conversations to recent code changes.

pub mod api;
pub mod config;
pub mod models;
pub mod server;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

use std::net::SocketAddr;

pub use config::Config;
pub use state::AppState;

use crate::utils::error::AppResult;

/// Build the state, start the watchers, and serve until shutdown.
pub async fn run_server(config: Config) -> AppResult<()> {
    let port = config.port;
    let state = AppState::new(config)?;
    state.supervisor.start_all().await?;

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "codetrail listening");
    axum::serve(listener, router).await?;
    Ok(())
}
