//! Analysis-Model Trait
//!
//! Defines the interface the recorder calls for semantic work: scoring
//! conversation/code matches and summarizing architectural impact. A
//! disabled implementation is selected when no credential is configured;
//! every caller must tolerate absence.

use std::sync::Arc;

use async_trait::async_trait;

use crate::openai::OpenAiClient;
use crate::types::{
    ClientConfig, ImpactAssessment, ImpactRequest, LlmError, LlmResult, MatchRequest,
    MatchResponse,
};

#[async_trait]
pub trait AnalysisModel: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Whether calls can succeed at all. Callers skip scheduling work when
    /// this is false.
    fn enabled(&self) -> bool {
        true
    }

    /// Score candidate code-change events against a conversation. The model
    /// must return the strict `{matches: [...]}` object.
    async fn score_matches(&self, request: &MatchRequest) -> LlmResult<MatchResponse>;

    /// Assess the architectural impact of one file change. The model must
    /// return the strict impact object.
    async fn summarize_impact(&self, request: &ImpactRequest) -> LlmResult<ImpactAssessment>;

    /// Condense a digest of recent events into a short journal entry.
    /// Free-text response, no strict object.
    async fn summarize_events(&self, digest: &str) -> LlmResult<String>;
}

/// No-credential implementation: reports disabled and fails every call.
pub struct DisabledModel;

#[async_trait]
impl AnalysisModel for DisabledModel {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn enabled(&self) -> bool {
        false
    }

    async fn score_matches(&self, _request: &MatchRequest) -> LlmResult<MatchResponse> {
        Err(LlmError::Disabled)
    }

    async fn summarize_impact(&self, _request: &ImpactRequest) -> LlmResult<ImpactAssessment> {
        Err(LlmError::Disabled)
    }

    async fn summarize_events(&self, _digest: &str) -> LlmResult<String> {
        Err(LlmError::Disabled)
    }
}

/// Select the implementation for the given configuration.
pub fn build_model(config: Option<ClientConfig>) -> Arc<dyn AnalysisModel> {
    match config {
        Some(config) => Arc::new(OpenAiClient::new(config)),
        None => Arc::new(DisabledModel),
    }
}
