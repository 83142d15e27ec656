use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{pagination::PageError, task::TaskError, worker::WorkerError},
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Field name to the messages raised for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Page(#[from] PageError),
    /// Rejected form input. Answered with 200 so the form can be shown again.
    #[error("Invalid form input")]
    Validation(FieldErrors),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Task(err) => match err {
                TaskError::TaskNotFound => (StatusCode::NOT_FOUND, "TaskError"),
                TaskError::TaskTypeNotFound(_)
                | TaskError::ProjectNotFound(_)
                | TaskError::WorkersNotFound(_) => (StatusCode::BAD_REQUEST, "TaskError"),
                TaskError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TaskError"),
            },
            ApiError::Worker(err) => match err {
                WorkerError::NotFound => (StatusCode::NOT_FOUND, "WorkerError"),
                WorkerError::UsernameTaken => (StatusCode::CONFLICT, "WorkerError"),
                WorkerError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "WorkerError"),
            },
            ApiError::Page(err) => match err {
                PageError::OutOfRange(_) => (StatusCode::NOT_FOUND, "PageError"),
                PageError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PageError"),
            },
            ApiError::Validation(_) => (StatusCode::OK, "ValidationError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }

        let response = match self {
            ApiError::Validation(errors) => {
                ApiResponse::<(), FieldErrors>::error_with_data(
                    errors,
                    "Please correct the errors below.",
                )
            }
            ApiError::Page(PageError::OutOfRange(_)) => {
                ApiResponse::error("Invalid page: That page contains no results")
            }
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Internal(msg) => {
                ApiResponse::error(&msg)
            }
            // Store failures are logged above; clients get no internals.
            _ if status_code.is_server_error() => ApiResponse::error(error_type),
            other => ApiResponse::error(&other.to_string()),
        };
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Database(DbErr::Custom("locked".to_string()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_map_to_expected_http_statuses() {
        assert_eq!(
            ApiError::from(TaskError::TaskNotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PageError::OutOfRange(9))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(WorkerError::UsernameTaken)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn validation_errors_are_returned_with_ok_status() {
        let response = ApiError::field("name", "This field is required.").into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_data"]["name"][0], "This field is required.");
    }
}
