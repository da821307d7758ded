use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(e) => {
                tracing::error!("❌ Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::NotFound(_) => {
                tracing::warn!("Not found: {}", self);
                (StatusCode::NOT_FOUND, "Not found")
            }
            AppError::InvalidInput(_) => {
                tracing::warn!("Invalid input: {}", self);
                (StatusCode::UNPROCESSABLE_ENTITY, "Invalid input")
            }
            AppError::Conflict(_) => {
                tracing::warn!("Conflict: {}", self);
                (StatusCode::CONFLICT, "Conflict")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("record".to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
