//! Configuration
//!
//! Environment-driven configuration. Every knob has a default suited to
//! localhost use; nothing is persisted.

use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::default_database_path;

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 4381;
/// Default per-file byte cap for diffing and baseline caching.
pub const DEFAULT_MAX_BYTES: u64 = 2_000_000;
/// Default global ignore segments.
pub const DEFAULT_IGNORE_PARTS: &str = ".git,node_modules,.venv,.idea,.vscode,__pycache__";
/// Default correlation window, seconds either side of the conversation instant.
pub const DEFAULT_CORRELATION_WINDOW_SECS: i64 = 300;
/// Default analysis-call timeout, seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
/// Default bound on concurrently running background analysis tasks.
pub const DEFAULT_MAX_BACKGROUND_TASKS: usize = 4;

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (`PORT`).
    pub port: u16,
    /// SQLite file path (`DB_PATH`).
    pub db_path: PathBuf,
    /// Root scanned for a default version-control handle (`REPO_PATH`).
    pub repo_path: Option<PathBuf>,
    /// Per-file diff cap in bytes (`MAX_BYTES`).
    pub max_file_bytes: u64,
    /// Global ignore segments (`IGNORE_PARTS`, comma separated).
    pub global_ignores: Vec<String>,
    /// Same-path coalescing window in milliseconds (`DEBOUNCE_MS`).
    ///
    /// 0 disables debouncing: every distinct write becomes an event, and only
    /// byte-equal rewrites coalesce.
    pub debounce_ms: u64,
    /// Analysis credential (`OPENAI_API_KEY`); absence disables the
    /// correlator and the architecture tracker.
    pub openai_api_key: Option<String>,
    /// Model tag for impact/summary work (`OPENAI_MODEL`).
    pub openai_model: String,
    /// Model tag for prompt/code matching (`OPENAI_MATCHING_MODEL`).
    pub openai_matching_model: String,
    /// Cross-origin policy (`CORS_ENABLED`, `CORS_ORIGINS`).
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
    /// Correlation window either side of a conversation instant, seconds.
    pub correlation_window_secs: i64,
    /// Per-call analysis timeout, seconds.
    pub llm_timeout_secs: u64,
    /// Bound on concurrently running background analysis tasks.
    pub max_background_tasks: usize,
}

impl Config {
    /// Assemble configuration from the process environment.
    pub fn from_env() -> AppResult<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::config(format!("Invalid PORT: {}", raw)))?,
            Err(_) => DEFAULT_PORT,
        };

        let db_path = match std::env::var("DB_PATH") {
            Ok(raw) if !raw.is_empty() => PathBuf::from(raw),
            _ => default_database_path()?,
        };

        let repo_path = std::env::var("REPO_PATH")
            .ok()
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let max_file_bytes = parse_env_u64("MAX_BYTES", DEFAULT_MAX_BYTES)?;
        let debounce_ms = parse_env_u64("DEBOUNCE_MS", 0)?;

        let global_ignores = std::env::var("IGNORE_PARTS")
            .unwrap_or_else(|_| DEFAULT_IGNORE_PARTS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect();

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let openai_matching_model =
            std::env::var("OPENAI_MATCHING_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let cors_enabled = std::env::var("CORS_ENABLED")
            .map(|raw| matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        let correlation_window_secs = parse_env_u64(
            "CORRELATION_WINDOW_SECS",
            DEFAULT_CORRELATION_WINDOW_SECS as u64,
        )? as i64;
        let llm_timeout_secs = parse_env_u64("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?;
        let max_background_tasks = parse_env_u64(
            "MAX_BACKGROUND_TASKS",
            DEFAULT_MAX_BACKGROUND_TASKS as u64,
        )?
        .max(1) as usize;

        Ok(Self {
            port,
            db_path,
            repo_path,
            max_file_bytes,
            global_ignores,
            debounce_ms,
            openai_api_key,
            openai_model,
            openai_matching_model,
            cors_enabled,
            cors_origins,
            correlation_window_secs,
            llm_timeout_secs,
            max_background_tasks,
        })
    }

    /// Whether analysis features (correlator, architecture tracker) are on.
    pub fn analysis_enabled(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: PathBuf::from("events.db"),
            repo_path: None,
            max_file_bytes: DEFAULT_MAX_BYTES,
            global_ignores: DEFAULT_IGNORE_PARTS
                .split(',')
                .map(String::from)
                .collect(),
            debounce_ms: 0,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_matching_model: "gpt-4o".to_string(),
            cors_enabled: false,
            cors_origins: vec![],
            correlation_window_secs: DEFAULT_CORRELATION_WINDOW_SECS,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            max_background_tasks: DEFAULT_MAX_BACKGROUND_TASKS,
        }
    }
}

fn parse_env_u64(key: &str, default: u64) -> AppResult<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| AppError::config(format!("Invalid {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
