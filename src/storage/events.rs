//! Event Storage
//!
//! Append-only event rows with filtered, paginated listing. Ids are
//! allocated by SQLite and are strictly increasing with insertion order.

use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use super::database::Database;
use crate::models::event::{Event, EventKind};
use crate::utils::error::{AppError, AppResult};

/// Filter set for event listing. `total` is computed over the same filters.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub project_id: Option<i64>,
    pub kind: Option<EventKind>,
    /// Case-insensitive substring over path and stringified payload.
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

impl Database {
    /// Append an event and return the stored row with its assigned id.
    ///
    /// The insert is a single statement; the id is never observable before
    /// the row is durable.
    pub fn append_event(
        &self,
        kind: EventKind,
        project_id: Option<i64>,
        path: Option<&str>,
        payload: &Value,
    ) -> AppResult<Event> {
        let timestamp = Utc::now().timestamp();
        let payload_text = serde_json::to_string(payload)?;
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO events (project_id, timestamp, kind, path, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![project_id, timestamp, kind.as_str(), path, payload_text],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Event {
            id,
            project_id,
            timestamp,
            kind,
            path: path.map(String::from),
            payload: payload.clone(),
        })
    }

    /// Read a single event by id.
    pub fn read_event(&self, id: i64) -> AppResult<Event> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT id, project_id, timestamp, kind, path, payload
             FROM events WHERE id = ?1",
            params![id],
            row_to_event,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Event {}", id)))
    }

    /// List events newest-first with the given filters.
    ///
    /// Returns `(items, total)` where `total` counts all rows matching the
    /// same filter set, ignoring offset/limit.
    pub fn list_events(&self, filter: &EventFilter) -> AppResult<(Vec<Event>, i64)> {
        let kind_str = filter.kind.map(|k| k.as_str().to_string());
        let search_like = filter
            .search
            .as_ref()
            .map(|s| format!("%{}%", s.to_lowercase()));
        let limit = filter.limit.clamp(1, 500);
        let offset = filter.offset.max(0);

        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<&dyn ToSql> = Vec::new();
        if let Some(ref project_id) = filter.project_id {
            clauses.push("project_id = ?");
            args.push(project_id);
        }
        if let Some(ref kind) = kind_str {
            clauses.push("kind = ?");
            args.push(kind);
        }
        if let Some(ref like) = search_like {
            clauses.push("(LOWER(COALESCE(path, '')) LIKE ? OR LOWER(payload) LIKE ?)");
            args.push(like);
            args.push(like);
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let conn = self.get_connection()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM events{}", where_sql),
            args.as_slice(),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT id, project_id, timestamp, kind, path, payload
             FROM events{} ORDER BY id DESC LIMIT ? OFFSET ?",
            where_sql
        ))?;
        args.push(&limit);
        args.push(&offset);
        let rows = stmt.query_map(args.as_slice(), row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok((events, total))
    }

    /// The most recent event of a kind, optionally scoped to one project.
    /// `None` means any project, not the global (null) scope.
    pub fn latest_event_of_kind(
        &self,
        kind: EventKind,
        project_id: Option<i64>,
    ) -> AppResult<Option<Event>> {
        let conn = self.get_connection()?;
        let found = match project_id {
            Some(pid) => conn
                .query_row(
                    "SELECT id, project_id, timestamp, kind, path, payload FROM events
                     WHERE kind = ?1 AND project_id = ?2 ORDER BY id DESC LIMIT 1",
                    params![kind.as_str(), pid],
                    row_to_event,
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT id, project_id, timestamp, kind, path, payload FROM events
                     WHERE kind = ?1 ORDER BY id DESC LIMIT 1",
                    params![kind.as_str()],
                    row_to_event,
                )
                .optional()?,
        };
        Ok(found)
    }

    /// Code-change events for a project within `[start_ts, end_ts]`,
    /// ascending by id. Used by the correlator's candidate selection.
    pub fn events_in_window(
        &self,
        project_id: Option<i64>,
        kind: EventKind,
        start_ts: i64,
        end_ts: i64,
    ) -> AppResult<Vec<Event>> {
        let conn = self.get_connection()?;
        let mut events = Vec::new();
        match project_id {
            Some(pid) => {
                let mut stmt = conn.prepare(
                    "SELECT id, project_id, timestamp, kind, path, payload FROM events
                     WHERE project_id = ?1 AND kind = ?2 AND timestamp BETWEEN ?3 AND ?4
                     ORDER BY id ASC",
                )?;
                let rows =
                    stmt.query_map(params![pid, kind.as_str(), start_ts, end_ts], row_to_event)?;
                for row in rows {
                    events.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, project_id, timestamp, kind, path, payload FROM events
                     WHERE project_id IS NULL AND kind = ?1 AND timestamp BETWEEN ?2 AND ?3
                     ORDER BY id ASC",
                )?;
                let rows =
                    stmt.query_map(params![kind.as_str(), start_ts, end_ts], row_to_event)?;
                for row in rows {
                    events.push(row?);
                }
            }
        }
        Ok(events)
    }
}

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let kind_text: String = row.get(3)?;
    let payload_text: String = row.get(5)?;
    Ok(Event {
        id: row.get(0)?,
        project_id: row.get(1)?,
        timestamp: row.get(2)?,
        kind: kind_text.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown event kind {}", kind_text).into(),
            )
        })?,
        path: row.get(4)?,
        payload: serde_json::from_str(&payload_text).unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::EventPayload;
    use crate::models::project::NewProject;

    fn db_with_project() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let project = db
            .create_project(&NewProject {
                name: "p".to_string(),
                path: "/tmp/p".to_string(),
                description: None,
                ignore_patterns: vec![],
                feature_doc_path: None,
                active: true,
            })
            .unwrap();
        (db, project.id)
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let (db, pid) = db_with_project();
        let mut last = 0;
        for _ in 0..5 {
            let event = db
                .append_event(
                    EventKind::Prompt,
                    Some(pid),
                    None,
                    &serde_json::json!({"text": "hi"}),
                )
                .unwrap();
            assert!(event.id > last);
            last = event.id;
        }
    }

    #[test]
    fn test_list_is_newest_first_with_total() {
        let (db, pid) = db_with_project();
        for i in 0..7 {
            db.append_event(
                EventKind::Prompt,
                Some(pid),
                Some(&format!("f{}.txt", i)),
                &serde_json::json!({"text": i}),
            )
            .unwrap();
        }
        let (items, total) = db
            .list_events(&EventFilter {
                project_id: Some(pid),
                limit: 3,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 7);
        assert_eq!(items.len(), 3);
        assert!(items[0].id > items[1].id && items[1].id > items[2].id);
    }

    #[test]
    fn test_pages_are_disjoint_and_contiguous() {
        let (db, pid) = db_with_project();
        for i in 0..10 {
            db.append_event(
                EventKind::Prompt,
                Some(pid),
                None,
                &serde_json::json!({"text": i}),
            )
            .unwrap();
        }
        let page = |offset| {
            db.list_events(&EventFilter {
                project_id: Some(pid),
                offset,
                limit: 4,
                ..Default::default()
            })
            .unwrap()
            .0
        };
        let (first, second) = (page(0), page(4));
        let both: Vec<i64> = first.iter().chain(second.iter()).map(|e| e.id).collect();
        let (all, _) = db
            .list_events(&EventFilter {
                project_id: Some(pid),
                offset: 0,
                limit: 8,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(both, all.iter().map(|e| e.id).collect::<Vec<_>>());
    }

    #[test]
    fn test_search_matches_path_and_payload() {
        let (db, pid) = db_with_project();
        db.append_event(
            EventKind::FileChange,
            Some(pid),
            Some("src/auth/token.py"),
            &serde_json::json!({"event": "modified", "diff": "+x", "sha": "s", "size": 1, "baseline": "cache"}),
        )
        .unwrap();
        db.append_event(
            EventKind::Prompt,
            Some(pid),
            None,
            &serde_json::json!({"text": "refactor the Token logic"}),
        )
        .unwrap();

        let search = |needle: &str| {
            db.list_events(&EventFilter {
                search: Some(needle.to_string()),
                limit: 50,
                ..Default::default()
            })
            .unwrap()
            .1
        };
        assert_eq!(search("token"), 2); // path hit + payload hit, case-insensitive
        assert_eq!(search("auth"), 1);
        assert_eq!(search("nomatch"), 0);
    }

    #[test]
    fn test_kind_filter() {
        let (db, pid) = db_with_project();
        db.append_event(EventKind::FileDeleted, Some(pid), Some("a"), &serde_json::json!({"event": "deleted"}))
            .unwrap();
        db.append_event(EventKind::Prompt, Some(pid), None, &serde_json::json!({"text": "t"}))
            .unwrap();
        let (items, total) = db
            .list_events(&EventFilter {
                kind: Some(EventKind::FileDeleted),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].kind, EventKind::FileDeleted);
    }

    #[test]
    fn test_window_selection() {
        let (db, pid) = db_with_project();
        let event = db
            .append_event(
                EventKind::FileChange,
                Some(pid),
                Some("x.rs"),
                &serde_json::json!({"event": "modified", "diff": "", "sha": "s", "size": 0, "baseline": "cache"}),
            )
            .unwrap();
        let now = event.timestamp;
        let hits = db
            .events_in_window(Some(pid), EventKind::FileChange, now - 300, now + 300)
            .unwrap();
        assert_eq!(hits.len(), 1);
        let misses = db
            .events_in_window(Some(pid), EventKind::FileChange, now + 10, now + 300)
            .unwrap();
        assert!(misses.is_empty());
    }

    #[test]
    fn test_latest_of_kind() {
        let (db, pid) = db_with_project();
        assert!(db
            .latest_event_of_kind(EventKind::Summary, None)
            .unwrap()
            .is_none());

        db.append_event(
            EventKind::Summary,
            None,
            None,
            &serde_json::json!({"content": "global"}),
        )
        .unwrap();
        let scoped = db
            .append_event(
                EventKind::Summary,
                Some(pid),
                None,
                &serde_json::json!({"content": "scoped"}),
            )
            .unwrap();

        // Unscoped lookup returns the newest of any project.
        let latest = db
            .latest_event_of_kind(EventKind::Summary, None)
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, scoped.id);

        let for_project = db
            .latest_event_of_kind(EventKind::Summary, Some(pid))
            .unwrap()
            .unwrap();
        assert_eq!(for_project.payload["content"], "scoped");
    }

    #[test]
    fn test_project_cascade_deletes_events() {
        let (db, pid) = db_with_project();
        let event = db
            .append_event(EventKind::Prompt, Some(pid), None, &serde_json::json!({"text": "t"}))
            .unwrap();
        db.delete_project(pid).unwrap();
        assert!(matches!(
            db.read_event(event.id).unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
