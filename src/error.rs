//! Error types for the cache-aside layer
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Infrastructure failure reported by a cache store.
///
/// "Key not found" is never an error: stores report it as `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store unreachable or the connection dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation did not complete within the configured bound
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Store answered with something that could not be interpreted
    #[error("Protocol error: {0}")]
    Protocol(String),
}

// == Cache Error Enum ==
/// Error returned to callers of the cache-aside accessor.
///
/// Cloneable so that coalesced callers can all observe the same outcome.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Caller passed an unusable key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Store read failed for a reason other than a missing key
    #[error("Cache infrastructure error: {0}")]
    Infrastructure(#[from] StoreError),

    /// Stored bytes under a hit could not be decoded
    #[error("Failed to decode cached value for key '{key}': {message}")]
    Deserialization { key: String, message: String },

    /// The producer of fresh data failed
    #[error("Producer failed: {0:#}")]
    Producer(Arc<anyhow::Error>),
}

impl CacheError {
    /// Wraps a producer failure.
    pub fn producer(err: impl Into<anyhow::Error>) -> Self {
        CacheError::Producer(Arc::new(err.into()))
    }
}

// == Cache Write Error ==
/// Failure of the best-effort write that follows a successful fetch.
///
/// Never returned to callers; only logged and counted.
#[derive(Error, Debug)]
pub enum CacheWriteError {
    /// Fresh value could not be encoded
    #[error("Failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Store rejected or failed the write
    #[error("Failed to write key '{key}': {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Deserialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Producer(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache-aside layer.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts_to_infrastructure() {
        let err: CacheError = StoreError::Connection("refused".to_string()).into();
        assert!(matches!(
            err,
            CacheError::Infrastructure(StoreError::Connection(_))
        ));
    }

    #[test]
    fn test_producer_error_keeps_message() {
        let err = CacheError::producer(anyhow::anyhow!("upstream returned 500"));
        assert!(err.to_string().contains("upstream returned 500"));

        let cloned = err.clone();
        match (err, cloned) {
            (CacheError::Producer(a), CacheError::Producer(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected producer errors"),
        }
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (CacheError::InvalidKey("".into()), StatusCode::BAD_REQUEST),
            (
                StoreError::Timeout(Duration::from_millis(5)).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CacheError::Deserialization {
                    key: "k".into(),
                    message: "eof".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (CacheError::producer(anyhow::anyhow!("boom")), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
