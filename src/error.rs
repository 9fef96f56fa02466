//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine, its stores and the HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A caller-supplied argument was rejected before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested expiration cannot be honoured
    #[error("Invalid expiration: {0}")]
    InvalidExpiration(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Error from the relational store, passed through unchanged
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The operation was cancelled before it started
    #[error("Operation cancelled")]
    Cancelled,

    /// No factory registered for the configured backend tag
    #[error("Unknown cache backend: {0}")]
    UnknownBackend(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidArgument(_) | CacheError::InvalidExpiration(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            CacheError::UnknownBackend(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::Internal(format!("blocking task failed: {}", err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (CacheError::InvalidArgument("k".into()), StatusCode::BAD_REQUEST),
            (CacheError::InvalidExpiration("e".into()), StatusCode::BAD_REQUEST),
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::Cancelled, StatusCode::REQUEST_TIMEOUT),
            (CacheError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_storage_error_is_wrapped_verbatim() {
        let err: CacheError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, CacheError::Storage(rusqlite::Error::QueryReturnedNoRows)));
        assert!(err.to_string().contains("Query returned no rows"));
    }
}
