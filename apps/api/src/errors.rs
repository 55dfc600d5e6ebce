use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found")]
    NotFound,

    #[error("Resource ID in body does not match path ID")]
    IdMismatch,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Content fetch error: {0}")]
    ContentFetch(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                "NOT_AUTHENTICATED",
                "Not authenticated.".to_string(),
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                "You do not have permissions to perform this action.".to_string(),
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "The requested resource could not be found.".to_string(),
            ),
            AppError::IdMismatch => (
                StatusCode::BAD_REQUEST,
                "ID_MISMATCH",
                "Resource ID in body does not match path ID.".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::ContentFetch(msg) => {
                tracing::warn!("Content fetch failed: {msg}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "CONTENT_ERROR",
                    "The content from the URL could not be fetched.".to_string(),
                )
            }
            AppError::Generation(msg) => {
                tracing::warn!("Signal generation failed: {msg}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "GENERATION_ERROR",
                    "A signal could not be generated from the content.".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
