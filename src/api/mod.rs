//! HTTP API
//!
//! Handlers for the JSON surface, the shared error → response mapping, and
//! the pagination envelope used by every collection endpoint.

pub mod ai_chat;
pub mod events;
pub mod health;
pub mod ingest;
pub mod projects;
pub mod summary;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::utils::error::AppError;

/// API error type: the HTTP-facing view of [`AppError`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match &err {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR || status == StatusCode::SERVICE_UNAVAILABLE
        {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Pagination envelope for collection responses.
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: i64, offset: i64, limit: i64) -> Self {
        let limit = limit.max(1);
        Self {
            items,
            total,
            offset,
            limit,
            page: offset / limit + 1,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// Default page size for collection endpoints.
pub(crate) fn default_limit() -> i64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let page = Page::new(vec![1; 50], 315, 0, 50);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 7);

        let page = Page::new(vec![1; 15], 315, 300, 50);
        assert_eq!(page.page, 7);
        assert_eq!(page.items.len(), 15);
    }

    #[test]
    fn test_empty_page() {
        let page: Page<i64> = Page::new(vec![], 0, 0, 50);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_error_mapping() {
        let err: ApiError = AppError::not_found("event 3").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let err: ApiError = AppError::conflict("duplicate path").into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        let err: ApiError = AppError::validation("bad").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let err: ApiError = AppError::database("busy").into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
