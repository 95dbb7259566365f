//! Error types for the state cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == State Error Enum ==
/// Unified error type for the cache, the store adapter, the pool and the
/// state service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Remote store could not be reached (DNS, timeout, auth, 5xx...)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Record absent from the remote store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cache write succeeded but the durable write failed
    #[error("Persistence deferred for {key}: {reason}")]
    PersistenceDeferred { key: String, reason: String },

    /// Outbound request failed at the transport level (after retries)
    #[error("Transport error: {0}")]
    Transport(String),

    /// No pooled connection became available in time
    #[error("Connection pool exhausted for {host} after {waited_ms}ms")]
    PoolExhausted { host: String, waited_ms: u64 },

    /// Nothing cached and the store is unreachable
    #[error("State unavailable for {key}: {reason}")]
    StateUnavailable { key: String, reason: String },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StateError {
    /// Returns true if the caller may retry the operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StateError::StoreUnavailable(_)
                | StateError::Transport(_)
                | StateError::PoolExhausted { .. }
                | StateError::StateUnavailable { .. }
                | StateError::PersistenceDeferred { .. }
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for StateError {
    fn into_response(self) -> Response {
        let status = match &self {
            StateError::NotFound(_) => StatusCode::NOT_FOUND,
            StateError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            // The value is live in memory, only durability is pending
            StateError::PersistenceDeferred { .. } => StatusCode::ACCEPTED,
            StateError::StoreUnavailable(_)
            | StateError::PoolExhausted { .. }
            | StateError::StateUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            StateError::Transport(_) => StatusCode::BAD_GATEWAY,
            StateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the state cache.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StateError::StoreUnavailable("down".into()).is_retryable());
        assert!(StateError::PoolExhausted {
            host: "h".into(),
            waited_ms: 10
        }
        .is_retryable());
        assert!(!StateError::NotFound("k".into()).is_retryable());
        assert!(!StateError::InvalidRequest("bad".into()).is_retryable());
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (StateError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (StateError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (
                StateError::PersistenceDeferred {
                    key: "k".into(),
                    reason: "down".into(),
                },
                StatusCode::ACCEPTED,
            ),
            (
                StateError::StateUnavailable {
                    key: "k".into(),
                    reason: "down".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (StateError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected_status) in test_cases {
            assert_eq!(error.into_response().status(), expected_status);
        }
    }
}
