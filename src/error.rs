use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures inside the extractor. These never reach a chat user: the
/// extractor maps each one to its fallback response.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("language model endpoint or API key not configured")]
    NotConfigured,
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("language model returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model call timed out")]
    Timeout,
    #[error("language model response had empty content")]
    EmptyContent,
    #[error("response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("response JSON is not an object")]
    NotAnObject,
}

impl ExtractorError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractorError::Timeout => true,
            ExtractorError::Transport(err) => err.is_timeout() || err.is_connect(),
            ExtractorError::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found")]
    NotFound,
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    BadRequest(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "session_not_found"),
            ApiError::Conflict(code) => (StatusCode::CONFLICT, *code),
            ApiError::BadRequest(code) => (StatusCode::BAD_REQUEST, *code),
        };
        (status, Json(json!({ "error": code }))).into_response()
    }
}
