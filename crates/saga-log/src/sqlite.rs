//! SQLite-backed saga log store.
//!
//! WAL mode is enabled on open so readers never block the writer.
//! That matters because the saga task writes while an HTTP handler may be
//! reading the status endpoint. The writer pool is capped at a single
//! connection, mirroring the engine's one-writer concurrency model;
//! readers get their own small pool.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;

use crate::{Result, SagaLogEntry, SagaLogError, SagaLogStore, SagaStatus};

// Append-only DDL: each row is an immutable event in the saga's
// lifecycle. Idempotent due to IF NOT EXISTS.
const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS saga_logs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    saga_id         TEXT    NOT NULL,
    status          TEXT    NOT NULL,
    current_step    TEXT    NOT NULL DEFAULT '',
    payload         TEXT,
    error_messages  TEXT    NOT NULL DEFAULT '[]',
    trace_id        TEXT    NOT NULL DEFAULT '',
    span_id         TEXT    NOT NULL DEFAULT '',
    updated_at      TEXT    NOT NULL
)";

// Per-saga history retrieval.
const CREATE_SAGA_ID_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_saga_logs_saga_id ON saga_logs(saga_id, updated_at)";

// Observability jump-in: find the saga for a trace.
const CREATE_TRACE_ID_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_saga_logs_trace_id ON saga_logs(trace_id)";

/// SQLite implementation of [`SagaLogStore`].
pub struct SqliteSagaLog {
    writer: SqlitePool,
    reader: SqlitePool,
}

impl SqliteSagaLog {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        let reader = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        for statement in [CREATE_TABLE, CREATE_SAGA_ID_INDEX, CREATE_TRACE_ID_INDEX] {
            sqlx::query(statement).execute(&writer).await?;
        }

        Ok(Self { writer, reader })
    }

    /// Closes both pools. Call before process exit.
    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
    }

    fn row_to_entry(row: SqliteRow) -> Result<SagaLogEntry> {
        let status_text: String = row.try_get("status")?;
        let status = SagaStatus::parse(&status_text)
            .ok_or(SagaLogError::InvalidStatus(status_text))?;

        let errors_text: String = row.try_get("error_messages")?;
        let error_messages: Vec<String> = serde_json::from_str(&errors_text)?;

        let updated_text: String = row.try_get("updated_at")?;
        let updated_at = parse_timestamp(&updated_text)?;

        Ok(SagaLogEntry {
            id: row.try_get("id")?,
            saga_id: row.try_get("saga_id")?,
            status,
            current_step: row.try_get("current_step")?,
            // NULL payloads read back as the empty string.
            payload: row
                .try_get::<Option<String>, _>("payload")?
                .unwrap_or_default(),
            error_messages,
            trace_id: row.try_get("trace_id")?,
            span_id: row.try_get("span_id")?,
            updated_at,
        })
    }
}

#[async_trait]
impl SagaLogStore for SqliteSagaLog {
    async fn save(&self, entry: &SagaLogEntry) -> Result<()> {
        // Empty payload is stored as NULL so non-STARTED rows stay compact.
        let payload = if entry.payload.is_empty() {
            None
        } else {
            Some(entry.payload.as_str())
        };
        let error_messages = serde_json::to_string(&entry.error_messages)?;

        sqlx::query(
            "INSERT INTO saga_logs \
             (saga_id, status, current_step, payload, error_messages, trace_id, span_id, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.saga_id)
        .bind(entry.status.as_str())
        .bind(&entry.current_step)
        .bind(payload)
        .bind(error_messages)
        .bind(&entry.trace_id)
        .bind(&entry.span_id)
        .bind(format_timestamp(&entry.updated_at))
        .execute(&self.writer)
        .await?;

        Ok(())
    }

    async fn get_latest(&self, saga_id: &str) -> Result<SagaLogEntry> {
        let row = sqlx::query(
            "SELECT id, saga_id, status, current_step, payload, error_messages, \
                    trace_id, span_id, updated_at \
             FROM saga_logs \
             WHERE saga_id = ? \
             ORDER BY updated_at DESC, id DESC \
             LIMIT 1",
        )
        .bind(saga_id)
        .fetch_optional(&self.reader)
        .await?;

        match row {
            Some(row) => Self::row_to_entry(row),
            None => Err(SagaLogError::NotFound(saga_id.to_string())),
        }
    }

    async fn history(&self, saga_id: &str) -> Result<Vec<SagaLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, saga_id, status, current_step, payload, error_messages, \
                    trace_id, span_id, updated_at \
             FROM saga_logs \
             WHERE saga_id = ? \
             ORDER BY updated_at ASC, id ASC",
        )
        .bind(saga_id)
        .fetch_all(&self.reader)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }
}

// RFC 3339 TEXT with nanosecond precision. Fixed width, so lexicographic
// order on the column matches chronological order.
fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| SagaLogError::InvalidTimestamp {
            value: s.to_string(),
            source,
        })
}
