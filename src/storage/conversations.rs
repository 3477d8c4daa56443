//! AI Conversation Storage
//!
//! Conversation rows, match rows, and the aggregate statistics view. The
//! `matched_to_events` column is kept in lockstep with the match table by
//! the correlator through [`Database::set_conversation_matches`].

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use super::database::Database;
use crate::models::conversation::{
    AiCodeMatch, AiConversation, AiStats, CodeSnippet, MatchCategory,
};
use crate::utils::error::{AppError, AppResult};

const CONVERSATION_COLUMNS: &str = "id, project_id, session_id, provider, model, timestamp, \
     user_prompt, assistant_response, code_snippets, file_references, metadata, \
     matched_to_events, confidence_score";

/// Prepared values for a conversation insert. Extraction (snippets, file
/// references) happens upstream; the store persists what it is given.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub project_id: Option<i64>,
    pub session_id: String,
    pub provider: String,
    pub model: Option<String>,
    pub user_prompt: String,
    pub assistant_response: String,
    pub code_snippets: Vec<CodeSnippet>,
    pub file_references: Vec<String>,
    pub metadata: Option<Value>,
}

/// Prepared values for a match insert.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub conversation_id: i64,
    pub event_id: i64,
    pub match_category: MatchCategory,
    pub confidence: f64,
    pub reasoning: String,
    pub file_overlap: i64,
    pub time_delta_seconds: i64,
}

/// Filter set for conversation listing.
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub project_id: Option<i64>,
    pub provider: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

impl Database {
    /// Insert a conversation and return the stored row.
    pub fn insert_ai_conversation(&self, record: &ConversationRecord) -> AppResult<AiConversation> {
        if let Some(project_id) = record.project_id {
            // Fail early with NotFound instead of a foreign-key error.
            self.get_project(project_id)?;
        }
        let timestamp = Utc::now().timestamp();
        let snippets_json = serde_json::to_string(&record.code_snippets)?;
        let refs_json = serde_json::to_string(&record.file_references)?;
        let metadata_json = match &record.metadata {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO ai_conversations
                 (project_id, session_id, provider, model, timestamp, user_prompt,
                  assistant_response, code_snippets, file_references, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.project_id,
                record.session_id,
                record.provider,
                record.model,
                timestamp,
                record.user_prompt,
                record.assistant_response,
                snippets_json,
                refs_json,
                metadata_json,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.read_ai_conversation(id)
    }

    /// Read a single conversation by id.
    pub fn read_ai_conversation(&self, id: i64) -> AppResult<AiConversation> {
        let conn = self.get_connection()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM ai_conversations WHERE id = ?1",
                CONVERSATION_COLUMNS
            ),
            params![id],
            row_to_conversation,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Conversation {}", id)))
    }

    /// List conversations newest-first with the given filters.
    pub fn list_ai_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> AppResult<(Vec<AiConversation>, i64)> {
        let limit = filter.limit.clamp(1, 500);
        let offset = filter.offset.max(0);

        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<&dyn rusqlite::types::ToSql> = Vec::new();
        if let Some(ref project_id) = filter.project_id {
            clauses.push("project_id = ?");
            args.push(project_id);
        }
        if let Some(ref provider) = filter.provider {
            clauses.push("provider = ?");
            args.push(provider);
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let conn = self.get_connection()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM ai_conversations{}", where_sql),
            args.as_slice(),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ai_conversations{} ORDER BY id DESC LIMIT ? OFFSET ?",
            CONVERSATION_COLUMNS, where_sql
        ))?;
        args.push(&limit);
        args.push(&offset);
        let rows = stmt.query_map(args.as_slice(), row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok((conversations, total))
    }

    /// Insert a match row. Confidence is clamped to [0, 1].
    pub fn insert_ai_match(&self, record: &MatchRecord) -> AppResult<AiCodeMatch> {
        let created_at = Utc::now().timestamp();
        let confidence = record.confidence.clamp(0.0, 1.0);
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO ai_code_matches
                 (conversation_id, event_id, match_category, confidence, reasoning,
                  file_overlap, time_delta_seconds, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.conversation_id,
                record.event_id,
                record.match_category.as_str(),
                confidence,
                record.reasoning,
                record.file_overlap,
                record.time_delta_seconds,
                created_at,
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(AiCodeMatch {
            id,
            conversation_id: record.conversation_id,
            event_id: record.event_id,
            match_category: record.match_category,
            confidence,
            reasoning: record.reasoning.clone(),
            file_overlap: record.file_overlap,
            time_delta_seconds: record.time_delta_seconds,
            created_at,
        })
    }

    /// Matches for a conversation, highest confidence first.
    pub fn list_ai_matches(&self, conversation_id: i64) -> AppResult<Vec<AiCodeMatch>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, event_id, match_category, confidence, reasoning,
                    file_overlap, time_delta_seconds, created_at
             FROM ai_code_matches WHERE conversation_id = ?1
             ORDER BY confidence DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], row_to_match)?;
        let mut matches = Vec::new();
        for row in rows {
            matches.push(row?);
        }
        Ok(matches)
    }

    /// Update the denormalized match set and aggregate confidence.
    pub fn set_conversation_matches(
        &self,
        conversation_id: i64,
        event_ids: &[i64],
        confidence_score: f64,
    ) -> AppResult<()> {
        let ids_json = serde_json::to_string(event_ids)?;
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE ai_conversations SET matched_to_events = ?2, confidence_score = ?3
             WHERE id = ?1",
            params![conversation_id, ids_json, confidence_score],
        )?;
        if changed == 0 {
            return Err(AppError::not_found(format!(
                "Conversation {}",
                conversation_id
            )));
        }
        Ok(())
    }

    /// Aggregate totals, optionally scoped to one project.
    pub fn ai_stats(&self, project_id: Option<i64>) -> AppResult<AiStats> {
        let conn = self.get_connection()?;
        let scope = match project_id {
            Some(_) => " WHERE project_id = ?1",
            None => "",
        };
        let args: Vec<&dyn rusqlite::types::ToSql> = match project_id {
            Some(ref pid) => vec![pid],
            None => vec![],
        };

        let total_conversations: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM ai_conversations{}", scope),
            args.as_slice(),
            |row| row.get(0),
        )?;
        let matched_conversations: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM ai_conversations{}{}",
                scope,
                if scope.is_empty() {
                    " WHERE matched_to_events != '[]'"
                } else {
                    " AND matched_to_events != '[]'"
                }
            ),
            args.as_slice(),
            |row| row.get(0),
        )?;
        let total_matches: i64 = match project_id {
            Some(pid) => conn.query_row(
                "SELECT COUNT(*) FROM ai_code_matches m
                 JOIN ai_conversations c ON c.id = m.conversation_id
                 WHERE c.project_id = ?1",
                params![pid],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM ai_code_matches", [], |row| row.get(0))?,
        };

        let mut stats = AiStats {
            total_conversations,
            matched_conversations,
            total_matches,
            by_provider: Default::default(),
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT provider, COUNT(*) FROM ai_conversations{} GROUP BY provider",
            scope
        ))?;
        let rows = stmt.query_map(args.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (provider, count) = row?;
            stats.by_provider.insert(provider, count);
        }
        Ok(stats)
    }
}

fn row_to_conversation(row: &Row) -> rusqlite::Result<AiConversation> {
    let snippets_json: String = row.get(8)?;
    let refs_json: String = row.get(9)?;
    let metadata_json: Option<String> = row.get(10)?;
    let matched_json: String = row.get(11)?;
    Ok(AiConversation {
        id: row.get(0)?,
        project_id: row.get(1)?,
        session_id: row.get(2)?,
        provider: row.get(3)?,
        model: row.get(4)?,
        timestamp: row.get(5)?,
        user_prompt: row.get(6)?,
        assistant_response: row.get(7)?,
        code_snippets: serde_json::from_str(&snippets_json).unwrap_or_default(),
        file_references: serde_json::from_str(&refs_json).unwrap_or_default(),
        metadata: metadata_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok()),
        matched_to_events: serde_json::from_str(&matched_json).unwrap_or_default(),
        confidence_score: row.get(12)?,
    })
}

fn row_to_match(row: &Row) -> rusqlite::Result<AiCodeMatch> {
    let category_text: String = row.get(3)?;
    Ok(AiCodeMatch {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        event_id: row.get(2)?,
        match_category: category_text.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown match category {}", category_text).into(),
            )
        })?,
        confidence: row.get(4)?,
        reasoning: row.get(5)?,
        file_overlap: row.get(6)?,
        time_delta_seconds: row.get(7)?,
        created_at: row.get(8)?,
    })
}
