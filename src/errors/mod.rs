/// Unified error handling module
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors raised by the feed pipeline (fetch, parse, cache, query).
///
/// `Clone` so that one failed population can be handed to every caller
/// that joined the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("invalid JSON data: {0}")]
    MalformedInput(String),

    #[error("JSON data is not valid GeoJSON: {0}")]
    SchemaMismatch(String),

    #[error("fetching {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("unknown earthquake data request")]
    UnresolvableParameters,

    #[error("no earthquake for {0}")]
    NotFound(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Type alias for feed pipeline results
pub type FeedResult<T> = Result<T, FeedError>;

/// Unified error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Feed(FeedError),
    InvalidInput(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Feed(FeedError::NotFound(id)) => write!(f, "Not found: {}", id),
            ApiError::Feed(e) => write!(f, "Internal error: {}", e),
            ApiError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        ApiError::Feed(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Feed(FeedError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("no earthquake for {}", id),
            ),
            ApiError::Feed(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                format!("internal error: {}", e),
            ),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let error_response = ErrorResponse {
            ok: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::from(FeedError::NotFound("us123".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_other_feed_errors_map_to_500() {
        let errors = [
            FeedError::MalformedInput("eof".to_string()),
            FeedError::SchemaMismatch("type".to_string()),
            FeedError::Transport {
                url: "http://x".to_string(),
                reason: "503".to_string(),
            },
            FeedError::UnresolvableParameters,
            FeedError::Internal("empty".to_string()),
        ];
        for err in errors {
            let (status, code, message) = ApiError::from(err.clone()).parts();
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(code, "INTERNAL_ERROR");
            assert!(message.contains(&err.to_string()));
        }
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        let response = ApiError::InvalidInput("limit".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
