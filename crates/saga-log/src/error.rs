//! Saga log error types.

use thiserror::Error;

/// Errors that can occur while persisting or reading saga log rows.
#[derive(Debug, Error)]
pub enum SagaLogError {
    /// No rows exist for the requested saga.
    #[error("saga {0:?} not found")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error on the error-messages JSON array.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored status string did not parse.
    #[error("invalid status {0:?} in saga log row")]
    InvalidStatus(String),

    /// A stored timestamp did not parse.
    #[error("invalid timestamp {value:?} in saga log row: {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
}

/// Convenience type alias for saga log results.
pub type Result<T> = std::result::Result<T, SagaLogError>;
