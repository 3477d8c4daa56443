//! AI Conversation Model
//!
//! Externally supplied prompt/response exchanges and their correlation to
//! code-change events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::utils::error::AppError;

/// A fenced code block extracted from an assistant response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    #[serde(default)]
    pub language: Option<String>,
    pub text: String,
    pub line_count: usize,
}

/// One recorded AI exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConversation {
    pub id: i64,
    #[serde(default)]
    pub project_id: Option<i64>,
    /// Groups multiple exchanges; generated when the caller supplies none.
    pub session_id: String,
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Unix seconds.
    pub timestamp: i64,
    pub user_prompt: String,
    pub assistant_response: String,
    #[serde(default)]
    pub code_snippets: Vec<CodeSnippet>,
    #[serde(default)]
    pub file_references: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Event ids this conversation was matched to by the correlator.
    #[serde(default)]
    pub matched_to_events: Vec<i64>,
    /// Mean confidence of the inserted matches, zero when none.
    #[serde(default)]
    pub confidence_score: f64,
}

/// Ingest input for a conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewConversation {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    pub user_prompt: String,
    pub assistant_response: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_provider() -> String {
    "unknown".to_string()
}

/// How a code-change event relates to a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchCategory {
    Direct,
    Related,
    Suggested,
}

impl MatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchCategory::Direct => "direct",
            MatchCategory::Related => "related",
            MatchCategory::Suggested => "suggested",
        }
    }
}

impl std::str::FromStr for MatchCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(MatchCategory::Direct),
            "related" => Ok(MatchCategory::Related),
            "suggested" => Ok(MatchCategory::Suggested),
            other => Err(AppError::validation(format!(
                "Unknown match category: {}",
                other
            ))),
        }
    }
}

/// One scored link between a conversation and a code-change event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiCodeMatch {
    pub id: i64,
    pub conversation_id: i64,
    pub event_id: i64,
    pub match_category: MatchCategory,
    /// In [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    pub file_overlap: i64,
    /// Event instant minus conversation instant, seconds.
    pub time_delta_seconds: i64,
    /// Unix seconds.
    pub created_at: i64,
}

/// Timeline row: a match joined with its event.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub event_id: i64,
    pub path: Option<String>,
    pub match_category: MatchCategory,
    pub confidence: f64,
    pub reasoning: String,
    pub time_delta_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Aggregate statistics over conversations and matches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AiStats {
    pub total_conversations: i64,
    pub matched_conversations: i64,
    pub total_matches: i64,
    pub by_provider: HashMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_category_round_trip() {
        for category in [
            MatchCategory::Direct,
            MatchCategory::Related,
            MatchCategory::Suggested,
        ] {
            let parsed: MatchCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("indirect".parse::<MatchCategory>().is_err());
    }

    #[test]
    fn test_new_conversation_defaults() {
        let input: NewConversation = serde_json::from_str(
            r#"{"user_prompt": "fix it", "assistant_response": "done"}"#,
        )
        .unwrap();
        assert_eq!(input.provider, "unknown");
        assert!(input.session_id.is_none());
    }
}
