//! codetrail-llm
//!
//! Analysis-model access for the recorder: a provider trait with the two
//! operations the core needs (match scoring, impact summarization), an
//! OpenAI-compatible implementation, and a disabled stand-in selected when
//! no credential is configured.

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

pub use provider::{build_model, AnalysisModel, DisabledModel};
pub use types::{
    ClientConfig, FeatureSummary, ImpactAssessment, ImpactRequest, LlmError, LlmResult,
    MatchCandidate, MatchRequest, MatchResponse, ScoredMatch,
};
