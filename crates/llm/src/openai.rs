//! OpenAI Provider
//!
//! Implementation of the AnalysisModel trait against the OpenAI
//! chat-completions API. Both operations request a JSON object response and
//! parse it strictly; anything else surfaces as `MalformedResponse`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::http_client::build_http_client;
use crate::provider::AnalysisModel;
use crate::types::{
    parse_http_error, ClientConfig, ImpactAssessment, ImpactRequest, LlmError, LlmResult,
    MatchRequest, MatchResponse,
};

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const MATCH_SYSTEM_PROMPT: &str = "You correlate AI coding-assistant conversations with recorded \
file-change events. Respond with a JSON object of the form \
{\"matches\": [{\"event_id\": int, \"match_category\": \"direct\"|\"related\"|\"suggested\", \
\"confidence\": float in [0,1], \"reasoning\": string, \"file_overlap\": int, \
\"time_delta\": int}]}. Only reference event ids from the candidate list. \
Return {\"matches\": []} when nothing plausibly matches.";

const IMPACT_SYSTEM_PROMPT: &str = "You maintain a living architecture document for a software \
project. Given the current architecture summary and one file change, respond with a JSON object \
of the form {\"affected_features\": [string], \"modified_classes\": [string], \
\"new_classes\": [string], \"architectural_change\": bool, \
\"impact_level\": \"minor\"|\"moderate\"|\"major\", \"summary\": string, \
\"concerns\": [string], \"recommendations\": [string]}.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a diligent software project journaler. Given recent \
repository events, produce a concise, bullet-style summary covering changed areas, notable \
diffs, prompts/conversations, and errors. Keep it under 200 words. If information is missing, \
state that briefly.";

/// OpenAI analysis client
pub struct OpenAiClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: ClientConfig) -> Self {
        let client = build_http_client(config.timeout_secs);
        Self { config, client }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }

    /// Issue one chat completion and return the message content. JSON mode
    /// forces the strict-object response format.
    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: String,
        json_mode: bool,
    ) -> LlmResult<String> {
        tracing::debug!(model, chars = user.len(), "analysis call");
        let mut body = json!({
            "model": model,
            "temperature": 0.2,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(self.base_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| LlmError::Network {
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(parse_http_error(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::MalformedResponse {
                message: format!("completion envelope: {}", e),
            })?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::MalformedResponse {
                message: "no choices returned".to_string(),
            })
    }

    fn match_prompt(request: &MatchRequest) -> String {
        let mut prompt = String::new();
        prompt.push_str("User prompt:\n");
        prompt.push_str(&request.user_prompt);
        prompt.push_str("\n\nAssistant response:\n");
        prompt.push_str(&request.assistant_response);
        prompt.push_str("\n\nFiles referenced in the conversation:\n");
        if request.file_references.is_empty() {
            prompt.push_str("(none)\n");
        }
        for reference in &request.file_references {
            prompt.push_str("- ");
            prompt.push_str(reference);
            prompt.push('\n');
        }
        prompt.push_str("\nCandidate file-change events:\n");
        for candidate in &request.candidates {
            prompt.push_str(&format!(
                "event_id={} path={} delta_seconds={}\n{}\n\n",
                candidate.event_id,
                candidate.path,
                candidate.time_delta_seconds,
                candidate.diff_excerpt
            ));
        }
        prompt
    }

    fn impact_prompt(request: &ImpactRequest) -> String {
        let mut prompt = String::new();
        prompt.push_str("Architecture overview:\n");
        prompt.push_str(&request.overview);
        prompt.push_str("\n\nFeatures:\n");
        if request.features.is_empty() {
            prompt.push_str("(none documented)\n");
        }
        for feature in &request.features {
            prompt.push_str(&format!(
                "- {} (files: {})\n",
                feature.name,
                feature.files.join(", ")
            ));
        }
        prompt.push_str("\nKnown classes: ");
        prompt.push_str(&request.classes.join(", "));
        prompt.push_str(&format!(
            "\n\nChange under analysis:\npath: {}\nchange: {}\n{}\n",
            request.path, request.change_type, request.diff_excerpt
        ));
        prompt
    }
}

#[async_trait]
impl AnalysisModel for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn score_matches(&self, request: &MatchRequest) -> LlmResult<MatchResponse> {
        let content = self
            .complete(
                &self.config.matching_model,
                MATCH_SYSTEM_PROMPT,
                Self::match_prompt(request),
                true,
            )
            .await?;
        parse_json_object(&content)
    }

    async fn summarize_impact(&self, request: &ImpactRequest) -> LlmResult<ImpactAssessment> {
        let content = self
            .complete(
                &self.config.impact_model,
                IMPACT_SYSTEM_PROMPT,
                Self::impact_prompt(request),
                true,
            )
            .await?;
        parse_json_object(&content)
    }

    async fn summarize_events(&self, digest: &str) -> LlmResult<String> {
        let content = self
            .complete(
                &self.config.impact_model,
                SUMMARY_SYSTEM_PROMPT,
                digest.to_string(),
                false,
            )
            .await?;
        Ok(content.trim().to_string())
    }
}

/// Parse a strict JSON object out of a model reply, tolerating a fenced
/// code block around it.
fn parse_json_object<T: serde::de::DeserializeOwned>(content: &str) -> LlmResult<T> {
    let trimmed = strip_code_fence(content.trim());
    serde_json::from_str(trimmed).map_err(|e| LlmError::MalformedResponse {
        message: format!("{}: {}", e, truncate(trimmed, 200)),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the optional language tag line, then the closing fence.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(text)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
