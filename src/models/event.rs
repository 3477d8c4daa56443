//! Event Model
//!
//! Append-only, typed, timestamped records. The payload is a closed tagged
//! union keyed by the event kind; the store persists the serialized JSON
//! unchanged and never interprets it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::error::{AppError, AppResult};

/// The closed set of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FileChange,
    FileDeleted,
    FolderCreated,
    FolderDeleted,
    Prompt,
    CopilotChat,
    Error,
    Summary,
    AiMatch,
    ImplicationsAnalysis,
}

impl EventKind {
    /// Stable string form used in the database and over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FileChange => "file_change",
            EventKind::FileDeleted => "file_deleted",
            EventKind::FolderCreated => "folder_created",
            EventKind::FolderDeleted => "folder_deleted",
            EventKind::Prompt => "prompt",
            EventKind::CopilotChat => "copilot_chat",
            EventKind::Error => "error",
            EventKind::Summary => "summary",
            EventKind::AiMatch => "ai_match",
            EventKind::ImplicationsAnalysis => "implications_analysis",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file_change" => Ok(EventKind::FileChange),
            "file_deleted" => Ok(EventKind::FileDeleted),
            "folder_created" => Ok(EventKind::FolderCreated),
            "folder_deleted" => Ok(EventKind::FolderDeleted),
            "prompt" => Ok(EventKind::Prompt),
            "copilot_chat" => Ok(EventKind::CopilotChat),
            "error" => Ok(EventKind::Error),
            "summary" => Ok(EventKind::Summary),
            "ai_match" => Ok(EventKind::AiMatch),
            "implications_analysis" => Ok(EventKind::ImplicationsAnalysis),
            other => Err(AppError::validation(format!("Unknown event kind: {}", other))),
        }
    }
}

/// Whether a file change was a creation or a modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Modified,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Created => "created",
            ChangeAction::Modified => "modified",
        }
    }
}

/// Where the previous bytes for a diff came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineSource {
    /// Last bytes the baseline cache stored.
    Cache,
    /// Version-control HEAD blob (first observation of the path).
    Head,
}

// ── Per-kind payload bodies ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangePayload {
    pub event: ChangeAction,
    pub diff: String,
    pub sha: String,
    pub size: u64,
    pub baseline: BaselineSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotChatPayload {
    pub prompt: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMatchPayload {
    pub prompt_count: i64,
    pub code_change_count: i64,
    pub match_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplicationsPayload {
    pub content: String,
    pub project_id: i64,
    pub event_count: i64,
}

/// The closed tagged union over event kinds.
///
/// Serializes to the exact per-kind wire shapes; the kind itself travels in
/// the event row, not inside the payload.
#[derive(Debug, Clone)]
pub enum EventPayload {
    FileChange(FileChangePayload),
    FileDeleted,
    FolderCreated,
    FolderDeleted,
    Prompt(PromptPayload),
    CopilotChat(CopilotChatPayload),
    Error(ErrorPayload),
    Summary { content: String },
    AiMatch(AiMatchPayload),
    Implications(ImplicationsPayload),
}

impl EventPayload {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::FileChange(_) => EventKind::FileChange,
            EventPayload::FileDeleted => EventKind::FileDeleted,
            EventPayload::FolderCreated => EventKind::FolderCreated,
            EventPayload::FolderDeleted => EventKind::FolderDeleted,
            EventPayload::Prompt(_) => EventKind::Prompt,
            EventPayload::CopilotChat(_) => EventKind::CopilotChat,
            EventPayload::Error(_) => EventKind::Error,
            EventPayload::Summary { .. } => EventKind::Summary,
            EventPayload::AiMatch(_) => EventKind::AiMatch,
            EventPayload::Implications(_) => EventKind::ImplicationsAnalysis,
        }
    }

    /// Serialize to the wire shape for this kind.
    pub fn to_value(&self) -> Value {
        match self {
            EventPayload::FileChange(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            EventPayload::FileDeleted => serde_json::json!({"event": "deleted"}),
            EventPayload::FolderCreated => {
                serde_json::json!({"event": "created", "type": "directory"})
            }
            EventPayload::FolderDeleted => {
                serde_json::json!({"event": "deleted", "type": "directory"})
            }
            EventPayload::Prompt(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            EventPayload::CopilotChat(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            EventPayload::Error(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            EventPayload::Summary { content } => serde_json::json!({"content": content}),
            EventPayload::AiMatch(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            EventPayload::Implications(p) => serde_json::to_value(p).unwrap_or(Value::Null),
        }
    }

    /// Reconstruct a typed payload from a kind and its stored JSON.
    pub fn from_parts(kind: EventKind, value: Value) -> AppResult<Self> {
        let payload = match kind {
            EventKind::FileChange => EventPayload::FileChange(serde_json::from_value(value)?),
            EventKind::FileDeleted => EventPayload::FileDeleted,
            EventKind::FolderCreated => EventPayload::FolderCreated,
            EventKind::FolderDeleted => EventPayload::FolderDeleted,
            EventKind::Prompt => EventPayload::Prompt(serde_json::from_value(value)?),
            EventKind::CopilotChat => EventPayload::CopilotChat(serde_json::from_value(value)?),
            EventKind::Error => EventPayload::Error(serde_json::from_value(value)?),
            EventKind::Summary => {
                let content = value
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                EventPayload::Summary { content }
            }
            EventKind::AiMatch => EventPayload::AiMatch(serde_json::from_value(value)?),
            EventKind::ImplicationsAnalysis => {
                EventPayload::Implications(serde_json::from_value(value)?)
            }
        };
        Ok(payload)
    }
}

// ── Stored event and broadcast envelope ─────────────────────────────────

/// A stored event row. Payload is kept as raw JSON; callers that need the
/// typed form go through [`EventPayload::from_parts`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub project_id: Option<i64>,
    /// Unix seconds.
    pub timestamp: i64,
    pub kind: EventKind,
    pub path: Option<String>,
    pub payload: Value,
}

/// The record broadcast for each new event and pushed to live subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: i64,
    pub timestamp: i64,
    pub kind: EventKind,
    pub project_id: Option<i64>,
    pub path: Option<String>,
    pub payload: Value,
}

impl From<&Event> for Envelope {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            timestamp: event.timestamp,
            kind: event.kind,
            project_id: event.project_id,
            path: event.path.clone(),
            payload: event.payload.clone(),
        }
    }
}
