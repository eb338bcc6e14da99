use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors talking to the payout producer
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream accepted the request but reported no updated payout")]
    NotApplied,

    #[error("Could not decode upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Default retry predicate. Only a request we could not even build is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport(e) => !e.is_builder(),
            UpstreamError::Status { .. } | UpstreamError::NotApplied | UpstreamError::Decode(_) => {
                true
            }
        }
    }

    /// Like `is_retryable`, but a 4xx other than 408/429 is treated as final.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Status { status, .. } if (400..500).contains(status) => {
                matches!(status, 408 | 429)
            }
            other => other.is_retryable(),
        }
    }
}

/// Malformed payout payloads. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayoutValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid payout identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid create_time: {0}")]
    InvalidTimestamp(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid recipient account identifier: {0}")]
    InvalidRecipient(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::Database(_) | AppError::Migration(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            ),
            AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Reconciliation task aborted: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
