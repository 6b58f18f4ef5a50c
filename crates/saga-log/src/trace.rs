//! Trace-context extraction from the ambient request context.

use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;

/// Trace identifiers read from an ambient context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceInfo {
    /// W3C trace id, 32 lowercase hex chars. Empty when no span is active.
    pub trace_id: String,
    /// W3C span id, 16 lowercase hex chars. Empty when no span is active.
    pub span_id: String,
}

/// Reads the active span's identifiers from `cx`.
///
/// Pure and non-blocking. When the context carries no valid span (unit
/// tests, background work outside a trace) both fields come back empty
/// and the caller proceeds.
pub fn extract_trace_info(cx: &Context) -> TraceInfo {
    let span = cx.span();
    let span_context = span.span_context();
    if !span_context.is_valid() {
        return TraceInfo::default();
    }
    TraceInfo {
        trace_id: span_context.trace_id().to_string(),
        span_id: span_context.span_id().to_string(),
    }
}
