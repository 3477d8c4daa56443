//! Project Storage
//!
//! CRUD operations for registered projects, including the embedded
//! architecture record and derived listing stats.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::database::Database;
use crate::models::architecture::ArchitectureRecord;
use crate::models::project::{NewProject, Project, ProjectConfig, ProjectSummary, ProjectUpdate};
use crate::utils::error::{AppError, AppResult};

const PROJECT_COLUMNS: &str = "id, name, path, description, created_at, active, \
     ignore_patterns, feature_doc_path, architecture";

impl Database {
    /// Create a project. The path must be absolute and unused.
    pub fn create_project(&self, input: &NewProject) -> AppResult<Project> {
        if input.name.trim().is_empty() {
            return Err(AppError::validation("Project name must not be empty"));
        }
        if !std::path::Path::new(&input.path).is_absolute() {
            return Err(AppError::validation(format!(
                "Project path must be absolute: {}",
                input.path
            )));
        }

        let conn = self.get_connection()?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM projects WHERE path = ?1",
                params![input.path],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(AppError::conflict(format!(
                "A project already exists for path {}",
                input.path
            )));
        }

        let patterns_json = serde_json::to_string(&input.ignore_patterns)?;
        let created_at = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO projects
                 (name, path, description, created_at, active, ignore_patterns, feature_doc_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                input.name,
                input.path,
                input.description,
                created_at,
                input.active as i64,
                patterns_json,
                input.feature_doc_path,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_project(id)
    }

    /// Fetch a single project by id.
    pub fn get_project(&self, id: i64) -> AppResult<Project> {
        let conn = self.get_connection()?;
        conn.query_row(
            &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
            params![id],
            row_to_project,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Project {}", id)))
    }

    /// List projects, optionally restricted by active flag, with derived stats.
    pub fn list_projects(&self, active_only: Option<bool>) -> AppResult<Vec<ProjectSummary>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {}, (SELECT COUNT(*) FROM events e WHERE e.project_id = projects.id)
             FROM projects {} ORDER BY id ASC",
            PROJECT_COLUMNS,
            match active_only {
                Some(true) => "WHERE active = 1",
                Some(false) => "WHERE active = 0",
                None => "",
            }
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let project = row_to_project(row)?;
            let event_count: i64 = row.get(9)?;
            Ok((project, event_count))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (project, event_count) = row?;
            summaries.push(ProjectSummary::from_project(project, event_count));
        }
        Ok(summaries)
    }

    /// Apply a partial update (name, description, active flag).
    pub fn update_project(&self, id: i64, update: &ProjectUpdate) -> AppResult<Project> {
        let current = self.get_project(id)?;
        let name = update.name.clone().unwrap_or(current.name);
        let description = update.description.clone().or(current.description);
        let active = update.active.unwrap_or(current.active);

        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE projects SET name = ?2, description = ?3, active = ?4 WHERE id = ?1",
            params![id, name, description, active as i64],
        )?;
        drop(conn);
        self.get_project(id)
    }

    /// Replace the watcher-relevant configuration slice.
    pub fn update_project_config(&self, id: i64, config: &ProjectConfig) -> AppResult<Project> {
        // Existence check first so the caller gets NotFound, not a no-op.
        self.get_project(id)?;
        let patterns_json = serde_json::to_string(&config.ignore_patterns)?;
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE projects SET ignore_patterns = ?2, feature_doc_path = ?3 WHERE id = ?1",
            params![id, patterns_json, config.feature_doc_path],
        )?;
        drop(conn);
        self.get_project(id)
    }

    /// Store (or clear) the embedded architecture record.
    pub fn set_project_architecture(
        &self,
        id: i64,
        record: Option<&ArchitectureRecord>,
    ) -> AppResult<()> {
        let json = match record {
            Some(record) => Some(serde_json::to_string(record)?),
            None => None,
        };
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE projects SET architecture = ?2 WHERE id = ?1",
            params![id, json],
        )?;
        if changed == 0 {
            return Err(AppError::not_found(format!("Project {}", id)));
        }
        Ok(())
    }

    /// Delete a project; events, conversations, and matches cascade.
    pub fn delete_project(&self, id: i64) -> AppResult<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(AppError::not_found(format!("Project {}", id)));
        }
        Ok(())
    }
}

fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    let patterns_json: String = row.get(6)?;
    let architecture_json: Option<String> = row.get(8)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        ignore_patterns: serde_json::from_str(&patterns_json).unwrap_or_default(),
        feature_doc_path: row.get(7)?,
        architecture: architecture_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok()),
    })
}
