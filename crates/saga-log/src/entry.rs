//! Saga log entry and status types.

use chrono::{DateTime, Utc};
use opentelemetry::Context;
use serde::{Deserialize, Serialize};

use crate::trace::extract_trace_info;

/// Lifecycle state of a saga execution at the moment a row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Started,
    StepDone,
    Compensating,
    Completed,
    Failed,
}

impl SagaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "STARTED",
            SagaStatus::StepDone => "STEP_DONE",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Failed => "FAILED",
        }
    }

    /// Parses the storage form. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STARTED" => Some(SagaStatus::Started),
            "STEP_DONE" => Some(SagaStatus::StepDone),
            "COMPENSATING" => Some(SagaStatus::Compensating),
            "COMPLETED" => Some(SagaStatus::Completed),
            "FAILED" => Some(SagaStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states end a saga; no further rows follow them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Failed)
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row in the saga log: a point-in-time snapshot of a saga execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaLogEntry {
    /// Store-assigned row id, monotone per store. Zero until persisted.
    pub id: i64,

    /// Saga identifier, typically the order id so rows can be joined
    /// with business data.
    pub saga_id: String,

    pub status: SagaStatus,

    /// Name of the step the transition is about; empty for saga-scoped
    /// transitions (STARTED, COMPLETED).
    pub current_step: String,

    /// JSON-serialised input that started the saga. Set once on the
    /// STARTED row, empty everywhere else.
    pub payload: String,

    /// Failure details accumulated so far, oldest first.
    pub error_messages: Vec<String>,

    /// W3C trace id (32 lowercase hex chars) of the span active when the
    /// row was built, or empty when none was.
    pub trace_id: String,

    /// W3C span id (16 lowercase hex chars), or empty.
    pub span_id: String,

    pub updated_at: DateTime<Utc>,
}

impl SagaLogEntry {
    /// Builds an entry for a transition happening now, capturing the
    /// trace identifiers active on `cx` at this moment.
    pub fn record(
        cx: &Context,
        saga_id: impl Into<String>,
        status: SagaStatus,
        current_step: impl Into<String>,
        payload: impl Into<String>,
        error_messages: &[String],
    ) -> Self {
        let trace = extract_trace_info(cx);
        Self {
            id: 0,
            saga_id: saga_id.into(),
            status,
            current_step: current_step.into(),
            payload: payload.into(),
            error_messages: error_messages.to_vec(),
            trace_id: trace.trace_id,
            span_id: trace.span_id,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };

    use super::*;

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            SagaStatus::Started,
            SagaStatus::StepDone,
            SagaStatus::Compensating,
            SagaStatus::Completed,
            SagaStatus::Failed,
        ] {
            assert_eq!(SagaStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SagaStatus::parse("RUNNING"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(!SagaStatus::Started.is_terminal());
        assert!(!SagaStatus::StepDone.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
    }

    #[test]
    fn record_without_active_span_leaves_trace_fields_empty() {
        let entry = SagaLogEntry::record(
            &Context::new(),
            "ord-1",
            SagaStatus::Started,
            "",
            "{}",
            &[],
        );
        assert_eq!(entry.trace_id, "");
        assert_eq!(entry.span_id, "");
        assert_eq!(entry.id, 0);
        assert_eq!(entry.payload, "{}");
    }

    #[test]
    fn record_captures_active_span_ids() {
        let span_context = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(span_context);

        let errors = vec!["boom".to_string()];
        let entry = SagaLogEntry::record(
            &cx,
            "ord-2",
            SagaStatus::Compensating,
            "Payment_Charge_Step",
            "",
            &errors,
        );
        assert_eq!(entry.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(entry.span_id, "00f067aa0ba902b7");
        assert_eq!(entry.error_messages, errors);
        assert_eq!(entry.current_step, "Payment_Charge_Step");
    }
}
