//! Gateway server entry point.

use std::sync::Arc;

use api::{Config, ServiceCaches};
use saga_log::{SagaLogStore, SqliteSagaLog};
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Telemetry: tracer provider, W3C propagator, log subscriber.
    let provider = common::init_tracer(&config.service_name, &config.otel_endpoint)
        .expect("failed to initialise tracer");
    common::init_subscriber(&config.service_name, &provider);

    // 2. Prometheus metrics recorder.
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Durable saga log.
    if let Some(parent) = std::path::Path::new(&config.saga_db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).expect("failed to create saga log data directory");
        }
    }
    let saga_log = SqliteSagaLog::open(&config.saga_db_path)
        .await
        .expect("failed to open saga log DB");
    let saga_log: Arc<dyn SagaLogStore> = Arc::new(saga_log);
    tracing::info!(path = %config.saga_db_path, "saga log DB ready");

    // 4. Idempotency caches: Redis when configured, in-memory otherwise.
    let caches = match &config.redis_addr {
        Some(addr) => ServiceCaches::redis(addr)
            .await
            .expect("failed to connect to Redis"),
        None => ServiceCaches::in_memory(),
    };

    // 5. Application state and router.
    let state = api::create_default_state(Some(saga_log), caches);
    let app = api::create_app(state, metrics_handle);

    // 6. Serve.
    let addr = config.addr();
    tracing::info!(%addr, "API gateway (orchestrator) running");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Flush buffered spans before exiting.
    if let Err(err) = provider.shutdown() {
        tracing::warn!(error = %err, "tracer shutdown error");
    }
    tracing::info!("server shut down gracefully");
}
