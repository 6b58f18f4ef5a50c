//! Port for persisting saga log entries.

use async_trait::async_trait;

use crate::{Result, SagaLogEntry};

/// Storage abstraction for the saga log.
///
/// The orchestrator depends on this trait, not on SQLite directly, so
/// tests can swap in the in-memory implementation. The log is
/// append-only: `save` always inserts, never updates.
#[async_trait]
pub trait SagaLogStore: Send + Sync {
    /// Appends one row. Safe for concurrent callers; a successful return
    /// means the row is durable.
    async fn save(&self, entry: &SagaLogEntry) -> Result<()>;

    /// Returns the row with the greatest `(updated_at, id)` for the saga,
    /// or [`SagaLogError::NotFound`](crate::SagaLogError::NotFound).
    async fn get_latest(&self, saga_id: &str) -> Result<SagaLogEntry>;

    /// Returns every row for the saga ordered by `(updated_at, id)`.
    /// The order reflects actual causality within one saga.
    async fn history(&self, saga_id: &str) -> Result<Vec<SagaLogEntry>>;
}
