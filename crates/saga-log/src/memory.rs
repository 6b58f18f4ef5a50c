//! In-memory saga log store for tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Result, SagaLogEntry, SagaLogError, SagaLogStore};

/// In-memory implementation of [`SagaLogStore`] with the same semantics
/// as the SQLite store: append-only, ids assigned monotonically,
/// `(updated_at, id)` ordering.
#[derive(Clone, Default)]
pub struct InMemorySagaLog {
    entries: Arc<RwLock<Vec<SagaLogEntry>>>,
}

impl InMemorySagaLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all sagas.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Every row in insertion order. Test helper.
    pub async fn entries(&self) -> Vec<SagaLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl SagaLogStore for InMemorySagaLog {
    async fn save(&self, entry: &SagaLogEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        let mut entry = entry.clone();
        entry.id = entries.len() as i64 + 1;
        entries.push(entry);
        Ok(())
    }

    async fn get_latest(&self, saga_id: &str) -> Result<SagaLogEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.saga_id == saga_id)
            .max_by_key(|e| (e.updated_at, e.id))
            .cloned()
            .ok_or_else(|| SagaLogError::NotFound(saga_id.to_string()))
    }

    async fn history(&self, saga_id: &str) -> Result<Vec<SagaLogEntry>> {
        let entries = self.entries.read().await;
        let mut history: Vec<SagaLogEntry> = entries
            .iter()
            .filter(|e| e.saga_id == saga_id)
            .cloned()
            .collect();
        history.sort_by_key(|e| (e.updated_at, e.id));
        Ok(history)
    }
}
