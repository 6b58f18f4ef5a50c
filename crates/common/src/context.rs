//! Correlation values carried on the ambient request context.
//!
//! The request id and idempotency key are stored on
//! [`opentelemetry::Context`] under the newtypes below. Context values are
//! keyed by `TypeId`, so a private-enough newtype is an unforgeable key:
//! no other crate can collide with it by accident the way a raw string
//! key could.

use opentelemetry::Context;

/// Request identifier generated once per inbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Client-supplied idempotency key. Empty when the client sent none; an
/// empty value still propagates, it is never dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(pub String);

/// Returns a context derived from `cx` carrying both correlation values.
pub fn with_correlation(
    cx: &Context,
    request_id: impl Into<String>,
    idempotency_key: impl Into<String>,
) -> Context {
    cx.with_value(RequestId(request_id.into()))
        .with_value(IdempotencyKey(idempotency_key.into()))
}

/// The request id stored on `cx`, or `""` when none was attached.
pub fn request_id(cx: &Context) -> &str {
    cx.get::<RequestId>().map(|id| id.0.as_str()).unwrap_or("")
}

/// The idempotency key stored on `cx`, or `""` when none was attached.
pub fn idempotency_key(cx: &Context) -> &str {
    cx.get::<IdempotencyKey>()
        .map(|key| key.0.as_str())
        .unwrap_or("")
}
