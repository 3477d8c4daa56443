//! Project Endpoints
//!
//! CRUD, the watcher-config read/write pair (the write performs the
//! supervisor swap before returning), and the technical-doc surface.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{default_limit, ApiResult, Page};
use crate::models::architecture::ArchitectureRecord;
use crate::models::project::{NewProject, Project, ProjectConfig, ProjectSummary, ProjectUpdate};
use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListProjectsParams {
    pub active: Option<bool>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// POST /projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.db.create_project(&input)?;

    // Parse the architecture document when one is configured. A bad
    // document must not fail project creation.
    if project.feature_doc_path.is_some() {
        if let Err(e) = state.tracker.refresh_document(&project) {
            tracing::warn!(project_id = project.id, error = %e, "architecture document parse failed");
        }
    }

    if project.active {
        state.supervisor.start_project(&project).await;
    }

    let project = state.db.get_project(project.id)?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<ListProjectsParams>,
) -> ApiResult<Json<Page<ProjectSummary>>> {
    let all = state.db.list_projects(params.active)?;
    let total = all.len() as i64;
    let offset = params.offset.max(0);
    let limit = params.limit.clamp(1, 500);
    let items = all
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    Ok(Json(Page::new(items, total, offset, limit)))
}

/// GET /projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.db.get_project(id)?))
}

/// PATCH /projects/{id}
pub async fn patch_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ProjectUpdate>,
) -> ApiResult<Json<Project>> {
    let active_changed = update.active.is_some();
    let project = state.db.update_project(id, &update)?;
    if active_changed {
        state.supervisor.restart_project(id).await?;
    }
    Ok(Json(project))
}

/// DELETE /projects/{id}
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.supervisor.stop_project(id).await;
    state.db.delete_project(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/config
pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProjectConfig>> {
    let project = state.db.get_project(id)?;
    Ok(Json(ProjectConfig {
        ignore_patterns: project.ignore_patterns,
        feature_doc_path: project.feature_doc_path,
    }))
}

/// PUT /projects/{id}/config
///
/// Persists the new configuration and swaps the watcher before responding,
/// so a client that gets a 200 observes the new ignore set immediately.
pub async fn put_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(config): Json<ProjectConfig>,
) -> ApiResult<Json<ProjectConfig>> {
    let project = state.db.update_project_config(id, &config)?;

    if project.feature_doc_path.is_some() && project.architecture.is_none() {
        if let Err(e) = state.tracker.refresh_document(&project) {
            tracing::warn!(project_id = id, error = %e, "architecture document parse failed");
        }
    }

    state.supervisor.restart_project(id).await?;

    let project = state.db.get_project(id)?;
    Ok(Json(ProjectConfig {
        ignore_patterns: project.ignore_patterns,
        feature_doc_path: project.feature_doc_path,
    }))
}

/// GET /projects/{id}/technical-doc
pub async fn get_technical_doc(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ArchitectureRecord>> {
    let project = state.db.get_project(id)?;
    let record = project.architecture.ok_or_else(|| {
        AppError::not_found(format!("Project {} has no architecture record", id))
    })?;
    Ok(Json(record))
}

/// POST /projects/{id}/technical-doc/refresh
///
/// Re-parses the configured document. On failure the previous record is
/// left intact and the error is returned to the caller.
pub async fn refresh_technical_doc(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ArchitectureRecord>> {
    let project = state.db.get_project(id)?;
    let record = state.tracker.refresh_document(&project)?;
    Ok(Json(record))
}
