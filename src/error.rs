use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the notification store and device directory.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            StoreError::Persistence(_) | StoreError::Migration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            StoreError::NotFound => "record not found".to_string(),
            StoreError::InvalidArgument(msg) => msg.clone(),
            StoreError::Persistence(e) => {
                tracing::error!("Database error: {}", e);
                "internal server error".to_string()
            }
            StoreError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                "internal server error".to_string()
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
