//! Metadata propagation across call boundaries.
//!
//! Two correlation tokens travel with every downstream call: the request
//! id and the idempotency key. They ride a string key/value [`Metadata`]
//! carrier together with the W3C `traceparent`/`tracestate` headers, which
//! the globally registered propagator injects and extracts through the
//! same carrier; this module never touches those headers itself.

use std::collections::HashMap;

use opentelemetry::global;
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::Context;

use crate::context;

/// Header carrying the per-request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Header carrying the client-supplied idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// String key/value pairs attached to an outgoing call, mirroring RPC
/// metadata. Keys are case-sensitive and stored as given.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: HashMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Injector for Metadata {
    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}

impl Extractor for Metadata {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// Writes the trace headers and both correlation tokens from `cx` into
/// `metadata`. Empty values are written as empty strings, never dropped.
pub fn inject(cx: &Context, metadata: &mut Metadata) {
    global::get_text_map_propagator(|propagator| propagator.inject_context(cx, metadata));
    metadata.insert(REQUEST_ID_HEADER, context::request_id(cx));
    metadata.insert(IDEMPOTENCY_KEY_HEADER, context::idempotency_key(cx));
}

/// Rebuilds an ambient context from `metadata`: the remote span context
/// from the trace headers plus both correlation tokens under their typed
/// keys. Missing tokens come back as empty strings.
pub fn extract(metadata: &Metadata) -> Context {
    let cx = global::get_text_map_propagator(|propagator| {
        propagator.extract_with_context(&Context::new(), metadata)
    });
    let request_id = metadata.get(REQUEST_ID_HEADER).unwrap_or_default();
    let idempotency_key = metadata.get(IDEMPOTENCY_KEY_HEADER).unwrap_or_default();
    context::with_correlation(&cx, request_id, idempotency_key)
}

/// A message paired with propagation metadata, the semantic stand-in for
/// an RPC request. Built client-side from the ambient context; opened
/// server-side back into one.
#[derive(Debug, Clone)]
pub struct Request<T> {
    metadata: Metadata,
    message: T,
}

impl<T> Request<T> {
    /// Wraps `message`, injecting trace and correlation metadata from `cx`.
    pub fn new(cx: &Context, message: T) -> Self {
        let mut metadata = Metadata::new();
        inject(cx, &mut metadata);
        Self { metadata, message }
    }

    /// Reinstates the ambient context this request carries.
    pub fn context(&self) -> Context {
        extract(&self.metadata)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn get_ref(&self) -> &T {
        &self.message
    }

    pub fn into_inner(self) -> T {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };
    use opentelemetry_sdk::propagation::TraceContextPropagator;

    use super::*;
    use crate::context::with_correlation;

    fn install_propagator() {
        global::set_text_map_propagator(TraceContextPropagator::new());
    }

    fn context_with_span() -> Context {
        let span_context = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn correlation_tokens_round_trip_through_metadata() {
        install_propagator();
        let cx = with_correlation(&Context::new(), "req-42", "idem-42");

        let mut metadata = Metadata::new();
        inject(&cx, &mut metadata);
        assert_eq!(metadata.get(REQUEST_ID_HEADER), Some("req-42"));
        assert_eq!(metadata.get(IDEMPOTENCY_KEY_HEADER), Some("idem-42"));

        let restored = extract(&metadata);
        assert_eq!(context::request_id(&restored), "req-42");
        assert_eq!(context::idempotency_key(&restored), "idem-42");
    }

    #[test]
    fn empty_idempotency_key_propagates_as_empty() {
        install_propagator();
        let cx = with_correlation(&Context::new(), "req-7", "");

        let mut metadata = Metadata::new();
        inject(&cx, &mut metadata);
        // Present with an empty value, not absent.
        assert_eq!(metadata.get(IDEMPOTENCY_KEY_HEADER), Some(""));

        let restored = extract(&metadata);
        assert_eq!(context::idempotency_key(&restored), "");
    }

    #[test]
    fn trace_context_travels_the_same_channel() {
        install_propagator();
        let cx = with_correlation(&context_with_span(), "req-9", "k");

        let mut metadata = Metadata::new();
        inject(&cx, &mut metadata);
        let traceparent = metadata.get("traceparent").expect("traceparent header");
        assert!(traceparent.contains("4bf92f3577b34da6a3ce929d0e0e4736"));

        let restored = extract(&metadata);
        let span_context = restored.span().span_context().clone();
        assert!(span_context.is_valid());
        assert_eq!(
            span_context.trace_id().to_string(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
    }

    #[test]
    fn request_carries_message_and_context() {
        install_propagator();
        let cx = with_correlation(&Context::new(), "req-1", "key-1");
        let request = Request::new(&cx, "payload");

        assert_eq!(*request.get_ref(), "payload");
        let server_cx = request.context();
        assert_eq!(context::request_id(&server_cx), "req-1");
        assert_eq!(request.into_inner(), "payload");
    }
}
