//! Integration tests for the SQLite saga log store.

use chrono::{Duration, TimeZone, Utc};
use opentelemetry::Context;
use saga_log::{SagaLogEntry, SagaLogError, SagaLogStore, SagaStatus, SqliteSagaLog};

async fn open_store(dir: &tempfile::TempDir) -> SqliteSagaLog {
    let path = dir.path().join("saga.db");
    SqliteSagaLog::open(&path).await.expect("open saga log db")
}

fn sample_entry(saga_id: &str) -> SagaLogEntry {
    SagaLogEntry {
        id: 0,
        saga_id: saga_id.to_string(),
        status: SagaStatus::Started,
        current_step: String::new(),
        payload: r#"{"customer_id":"cust-1"}"#.to_string(),
        error_messages: vec![],
        trace_id: "4bf92f3577b34da6a3ce929d0e0e4736".to_string(),
        span_id: "00f067aa0ba902b7".to_string(),
        updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
            + Duration::nanoseconds(987_654_321),
    }
}

#[tokio::test]
async fn save_and_get_latest_round_trips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let entry = sample_entry("ord-1");
    store.save(&entry).await.unwrap();

    let read = store.get_latest("ord-1").await.unwrap();
    assert_eq!(read.saga_id, entry.saga_id);
    assert_eq!(read.status, entry.status);
    assert_eq!(read.current_step, entry.current_step);
    assert_eq!(read.payload, entry.payload);
    assert_eq!(read.error_messages, entry.error_messages);
    assert_eq!(read.trace_id, entry.trace_id);
    assert_eq!(read.span_id, entry.span_id);
    // Nanosecond precision survives the TEXT round trip.
    assert_eq!(read.updated_at, entry.updated_at);
    // Store-assigned id.
    assert!(read.id > 0);
}

#[tokio::test]
async fn empty_payload_stored_as_null_reads_back_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut entry = sample_entry("ord-2");
    entry.status = SagaStatus::StepDone;
    entry.current_step = "Inventory_Reservation_Step".to_string();
    entry.payload = String::new();
    store.save(&entry).await.unwrap();

    let read = store.get_latest("ord-2").await.unwrap();
    assert_eq!(read.payload, "");
    assert_eq!(read.current_step, "Inventory_Reservation_Step");
}

#[tokio::test]
async fn error_messages_round_trip_as_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut entry = sample_entry("ord-3");
    entry.status = SagaStatus::Failed;
    entry.current_step = "Payment_Charge_Step".to_string();
    entry.payload = String::new();
    entry.error_messages = vec![
        "payment declined for order ord-3".to_string(),
        "compensation of Inventory_Reservation_Step failed: timeout".to_string(),
    ];
    store.save(&entry).await.unwrap();

    let read = store.get_latest("ord-3").await.unwrap();
    assert_eq!(read.error_messages, entry.error_messages);
}

#[tokio::test]
async fn empty_trace_fields_are_permitted() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    // No active span: both hex fields empty. Saving must not fail.
    let entry = SagaLogEntry::record(&Context::new(), "ord-4", SagaStatus::Started, "", "", &[]);
    store.save(&entry).await.unwrap();

    let read = store.get_latest("ord-4").await.unwrap();
    assert_eq!(read.trace_id, "");
    assert_eq!(read.span_id, "");
}

#[tokio::test]
async fn get_latest_orders_by_updated_at_then_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let base = sample_entry("ord-5");

    let mut started = base.clone();
    started.status = SagaStatus::Started;
    store.save(&started).await.unwrap();

    let mut step_done = base.clone();
    step_done.status = SagaStatus::StepDone;
    step_done.current_step = "Inventory_Reservation_Step".to_string();
    step_done.payload = String::new();
    step_done.updated_at = base.updated_at + Duration::nanoseconds(1);
    store.save(&step_done).await.unwrap();

    // Same timestamp as step_done: the higher id must win.
    let mut completed = base.clone();
    completed.status = SagaStatus::Completed;
    completed.payload = String::new();
    completed.updated_at = step_done.updated_at;
    store.save(&completed).await.unwrap();

    let latest = store.get_latest("ord-5").await.unwrap();
    assert_eq!(latest.status, SagaStatus::Completed);
}

#[tokio::test]
async fn history_returns_causal_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    for (offset, (status, step)) in [
        (SagaStatus::Started, ""),
        (SagaStatus::StepDone, "Inventory_Reservation_Step"),
        (SagaStatus::Compensating, "Payment_Charge_Step"),
        (SagaStatus::Failed, "Payment_Charge_Step"),
    ]
    .into_iter()
    .enumerate()
    {
        let mut entry = sample_entry("ord-6");
        entry.status = status;
        entry.current_step = step.to_string();
        entry.payload = String::new();
        entry.updated_at = entry.updated_at + Duration::nanoseconds(offset as i64);
        store.save(&entry).await.unwrap();
    }

    let history = store.history("ord-6").await.unwrap();
    let statuses: Vec<SagaStatus> = history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            SagaStatus::Started,
            SagaStatus::StepDone,
            SagaStatus::Compensating,
            SagaStatus::Failed,
        ]
    );
    // Ids are monotone in insertion order.
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn unknown_saga_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let err = store.get_latest("ord-missing").await.unwrap_err();
    assert!(matches!(err, SagaLogError::NotFound(_)));
}

#[tokio::test]
async fn concurrent_writers_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(open_store(&dir).await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let saga_id = format!("ord-c{i}");
            let mut entry = sample_entry(&saga_id);
            entry.payload = String::new();
            store.save(&entry).await.unwrap();
            entry.status = SagaStatus::Completed;
            entry.updated_at = entry.updated_at + Duration::nanoseconds(1);
            store.save(&entry).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..8 {
        let latest = store.get_latest(&format!("ord-c{i}")).await.unwrap();
        assert_eq!(latest.status, SagaStatus::Completed);
    }
}
