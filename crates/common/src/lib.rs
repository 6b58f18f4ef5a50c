//! Shared plumbing for the saga system.
//!
//! Everything the gateway, the orchestrator, and the downstream services
//! have in common lives here: the ambient-context correlation keys, the
//! metadata propagation channel, the idempotency cache contract with its
//! Redis and in-memory adapters, the telemetry bootstrap, and the order
//! domain types.

pub mod cache;
pub mod context;
pub mod propagation;
pub mod telemetry;
pub mod types;

/// The ambient request context carried through every call.
///
/// Holds the active span (for trace correlation) and correlation values
/// under typed keys. Re-exported so downstream crates share one type.
pub use opentelemetry::Context;

pub use cache::{Cache, CacheError, InMemoryCache, RedisCache, IDEMPOTENCY_TTL};
pub use context::{idempotency_key, request_id, with_correlation, IdempotencyKey, RequestId};
pub use propagation::{
    extract, inject, Metadata, Request, IDEMPOTENCY_KEY_HEADER, REQUEST_ID_HEADER,
};
pub use telemetry::{init_subscriber, init_tracer, TelemetryError};
pub use types::{Order, OrderItem, OrderStatus};
