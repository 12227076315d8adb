use axum::response::IntoResponse;
use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Import rejected: {0}")]
    Import(#[from] NormalizeError),
    #[error("{0}")]
    NotFound(String),
    #[error("External error: {0}")]
    External(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Import(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
            AppError::External(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            AppError::Db(_) | AppError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Validation(value)
    }
}

/// Reasons a CSV file is rejected by the normalizer.
///
/// Every variant is recoverable: callers report it and move on to the next file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Failed to read CSV: {0}")]
    Parse(String),
    #[error("CSV file has no data rows")]
    EmptyInput,
    #[error("Missing required CSV columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("No valid rows found after validation")]
    NoValidRows,
}

impl From<csv::Error> for NormalizeError {
    fn from(value: csv::Error) -> Self {
        NormalizeError::Parse(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM features are disabled")]
    Disabled,
    #[error("LLM request timed out")]
    Timeout,
    #[error("LLM provider rate limited the request")]
    RateLimited,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
