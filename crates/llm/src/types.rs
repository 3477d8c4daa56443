//! Analysis-Model Types
//!
//! Request/response types for the two analysis operations, plus the error
//! taxonomy shared by every provider implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by analysis-model calls
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Server error ({status:?}): {message}")]
    ServerError { message: String, status: Option<u16> },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Malformed model response: {message}")]
    MalformedResponse { message: String },

    /// No credential configured; analysis features are off.
    #[error("Analysis model disabled")]
    Disabled,

    #[error("{message}")]
    Other { message: String },
}

/// Result type alias for analysis-model operations
pub type LlmResult<T> = Result<T, LlmError>;

impl LlmError {
    /// Whether a retry (or a degraded fallback) is the right reaction.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::ServerError { .. }
                | LlmError::Timeout
                | LlmError::Network { .. }
        )
    }
}

/// Map an HTTP error status to a typed error.
pub fn parse_http_error(status: u16, body: &str) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthenticationFailed {
            message: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}

/// Configuration for a provider client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    /// Base URL override (optional)
    pub base_url: Option<String>,
    /// Model tag for impact summarization
    pub impact_model: String,
    /// Model tag for prompt/code matching
    pub matching_model: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

// ── score_matches ───────────────────────────────────────────────────────

/// One candidate code-change event offered to the model.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub event_id: i64,
    pub path: String,
    pub diff_excerpt: String,
    /// Event instant minus conversation instant, seconds.
    pub time_delta_seconds: i64,
}

/// Input to [`score_matches`](crate::AnalysisModel::score_matches).
#[derive(Debug, Clone, Serialize)]
pub struct MatchRequest {
    pub user_prompt: String,
    pub assistant_response: String,
    pub file_references: Vec<String>,
    pub candidates: Vec<MatchCandidate>,
}

/// One scored match returned by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredMatch {
    pub event_id: i64,
    #[serde(default)]
    pub match_category: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub file_overlap: i64,
    #[serde(default)]
    pub time_delta: i64,
}

/// The strict object the model must return for a match request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchResponse {
    #[serde(default)]
    pub matches: Vec<ScoredMatch>,
}

// ── summarize_impact ────────────────────────────────────────────────────

/// Condensed feature view included in an impact prompt.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub name: String,
    pub files: Vec<String>,
}

/// Input to [`summarize_impact`](crate::AnalysisModel::summarize_impact).
#[derive(Debug, Clone, Serialize)]
pub struct ImpactRequest {
    pub overview: String,
    pub features: Vec<FeatureSummary>,
    pub classes: Vec<String>,
    pub path: String,
    pub change_type: String,
    pub diff_excerpt: String,
}

/// The strict object the model must return for an impact request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImpactAssessment {
    #[serde(default)]
    pub affected_features: Vec<String>,
    #[serde(default)]
    pub modified_classes: Vec<String>,
    #[serde(default)]
    pub new_classes: Vec<String>,
    #[serde(default)]
    pub architectural_change: bool,
    #[serde(default)]
    pub impact_level: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_error() {
        assert!(matches!(
            parse_http_error(401, "unauthorized"),
            LlmError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            parse_http_error(429, "slow down"),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            parse_http_error(503, "down"),
            LlmError::ServerError { .. }
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout.is_transient());
        assert!(parse_http_error(500, "x").is_transient());
        assert!(!parse_http_error(400, "x").is_transient());
        assert!(!LlmError::Disabled.is_transient());
    }

    #[test]
    fn test_match_response_tolerates_missing_fields() {
        let parsed: MatchResponse =
            serde_json::from_str(r#"{"matches": [{"event_id": 3}]}"#).unwrap();
        assert_eq!(parsed.matches.len(), 1);
        assert_eq!(parsed.matches[0].event_id, 3);
        assert_eq!(parsed.matches[0].confidence, 0.0);
    }
}
