//! HTTP gateway for the order saga system.
//!
//! Exposes order intake and status endpoints, wires the downstream
//! service backends and the saga log together, and runs each saga on a
//! detached task so a client disconnect never interrupts it. Structured
//! logging (tracing), distributed tracing (OpenTelemetry) and Prometheus
//! metrics are wired at bootstrap.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use common::{Cache, CacheError, InMemoryCache, RedisCache};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::services::{InMemoryInventory, InMemoryOrders, InMemoryPayments};
use saga_log::SagaLogStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use routes::orders::AppState;

/// One idempotency cache per downstream service, each with its own key
/// prefix.
pub struct ServiceCaches {
    pub order: Arc<dyn Cache>,
    pub inventory: Arc<dyn Cache>,
    pub payment: Arc<dyn Cache>,
}

impl ServiceCaches {
    /// In-process caches; the default when no Redis address is configured.
    pub fn in_memory() -> Self {
        Self {
            order: Arc::new(InMemoryCache::new("order-service")),
            inventory: Arc::new(InMemoryCache::new("inventory-service")),
            payment: Arc::new(InMemoryCache::new("payment-service")),
        }
    }

    /// Redis-backed caches sharing one server.
    pub async fn redis(addr: &str) -> Result<Self, CacheError> {
        Ok(Self {
            order: Arc::new(RedisCache::connect(addr, "order-service").await?),
            inventory: Arc::new(RedisCache::connect(addr, "inventory-service").await?),
            payment: Arc::new(RedisCache::connect(addr, "payment-service").await?),
        })
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/saga", get(routes::orders::saga_status))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with the in-process backends.
pub fn create_default_state(
    saga_log: Option<Arc<dyn SagaLogStore>>,
    caches: ServiceCaches,
) -> Arc<AppState> {
    Arc::new(AppState {
        orders: Arc::new(InMemoryOrders::new(caches.order)),
        inventory: Arc::new(InMemoryInventory::new(caches.inventory)),
        payments: Arc::new(InMemoryPayments::new(caches.payment)),
        saga_log,
    })
}
