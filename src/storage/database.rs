//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2
//! connection pooling. Sole durable home of projects, events, AI
//! conversations, and AI/code matches.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
/// Type alias for a pooled connection
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Columns that must exist after migration, per table. Older database files
/// are upgraded in place by adding any that are missing; rows are never
/// rewritten or dropped.
const REQUIRED_COLUMNS: &[(&str, &str, &str)] = &[
    ("projects", "ignore_patterns", "TEXT NOT NULL DEFAULT '[]'"),
    ("projects", "feature_doc_path", "TEXT"),
    ("projects", "architecture", "TEXT"),
    ("events", "path", "TEXT"),
    ("events", "payload", "TEXT NOT NULL DEFAULT '{}'"),
    ("ai_conversations", "session_id", "TEXT NOT NULL DEFAULT ''"),
    ("ai_conversations", "code_snippets", "TEXT NOT NULL DEFAULT '[]'"),
    ("ai_conversations", "file_references", "TEXT NOT NULL DEFAULT '[]'"),
    ("ai_conversations", "metadata", "TEXT"),
    (
        "ai_conversations",
        "matched_to_events",
        "TEXT NOT NULL DEFAULT '[]'",
    ),
    (
        "ai_conversations",
        "confidence_score",
        "REAL NOT NULL DEFAULT 0.0",
    ),
    ("ai_code_matches", "reasoning", "TEXT NOT NULL DEFAULT ''"),
    ("ai_code_matches", "file_overlap", "INTEGER NOT NULL DEFAULT 0"),
    (
        "ai_code_matches",
        "time_delta_seconds",
        "INTEGER NOT NULL DEFAULT 0",
    ),
];

/// Database service for managing SQLite operations
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn new(db_path: &Path) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        db.migrate()?;

        Ok(db)
    }

    /// Create an in-memory database (tests).
    pub fn in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        db.migrate()?;
        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                ignore_patterns TEXT NOT NULL DEFAULT '[]',
                feature_doc_path TEXT,
                architecture TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
                timestamp INTEGER NOT NULL,
                kind TEXT NOT NULL,
                path TEXT,
                payload TEXT NOT NULL DEFAULT '{}'
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ai_conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
                session_id TEXT NOT NULL DEFAULT '',
                provider TEXT NOT NULL,
                model TEXT,
                timestamp INTEGER NOT NULL,
                user_prompt TEXT NOT NULL,
                assistant_response TEXT NOT NULL,
                code_snippets TEXT NOT NULL DEFAULT '[]',
                file_references TEXT NOT NULL DEFAULT '[]',
                metadata TEXT,
                matched_to_events TEXT NOT NULL DEFAULT '[]',
                confidence_score REAL NOT NULL DEFAULT 0.0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ai_code_matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL
                    REFERENCES ai_conversations(id) ON DELETE CASCADE,
                event_id INTEGER NOT NULL
                    REFERENCES events(id) ON DELETE CASCADE,
                match_category TEXT NOT NULL,
                confidence REAL NOT NULL,
                reasoning TEXT NOT NULL DEFAULT '',
                file_overlap INTEGER NOT NULL DEFAULT 0,
                time_delta_seconds INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_project ON events(project_id, id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_kind ON events(kind, id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_project
                 ON ai_conversations(project_id, timestamp)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_session
                 ON ai_conversations(session_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_matches_conversation
                 ON ai_code_matches(conversation_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_matches_event ON ai_code_matches(event_id)",
            [],
        )?;

        Ok(())
    }

    /// Additive schema migration: add any required column that is missing.
    /// Existing rows are left intact; nothing is ever dropped.
    fn migrate(&self) -> AppResult<()> {
        let conn = self.get_connection()?;
        for (table, column, ddl) in REQUIRED_COLUMNS {
            if !Self::column_exists(&conn, table, column)? {
                tracing::info!(table = %table, column = %column, "adding missing column");
                conn.execute(
                    &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, ddl),
                    [],
                )?;
            }
        }
        Ok(())
    }

    fn column_exists(conn: &DbConnection, table: &str, column: &str) -> AppResult<bool> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            if name == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.state().connections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_health() {
        let db = Database::in_memory().unwrap();
        assert!(db.is_healthy());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.init_schema().unwrap();
        db.migrate().unwrap();
        assert!(db.is_healthy());
    }

    #[test]
    fn test_migration_adds_missing_column() {
        // Simulate an old database file that predates the architecture column.
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "CREATE TABLE projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    path TEXT NOT NULL UNIQUE,
                    description TEXT,
                    created_at INTEGER NOT NULL,
                    active INTEGER NOT NULL DEFAULT 1
                )",
                [],
            )
            .unwrap();

        let db = Database { pool };
        db.init_schema().unwrap();
        db.migrate().unwrap();

        let conn = db.get_connection().unwrap();
        assert!(Database::column_exists(&conn, "projects", "architecture").unwrap());
        assert!(Database::column_exists(&conn, "projects", "ignore_patterns").unwrap());
    }
}
