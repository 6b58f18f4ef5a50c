//! Gateway configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8080`)
/// - `OTEL_SERVICE_NAME` — service name on exported spans (default: `"api-gateway"`)
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` — collector endpoint (default: `"localhost:4317"`)
/// - `SAGA_LOG_DB_PATH` — SQLite saga log path (default: `"./data/saga.db"`)
/// - `REDIS_ADDR` — idempotency cache address (default: none, in-memory cache)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub otel_endpoint: String,
    pub saga_db_path: String,
    pub redis_addr: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "api-gateway".to_string()),
            otel_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "localhost:4317".to_string()),
            saga_db_path: std::env::var("SAGA_LOG_DB_PATH")
                .unwrap_or_else(|_| "./data/saga.db".to_string()),
            redis_addr: std::env::var("REDIS_ADDR").ok(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            service_name: "api-gateway".to_string(),
            otel_endpoint: "localhost:4317".to_string(),
            saga_db_path: "./data/saga.db".to_string(),
            redis_addr: None,
        }
    }
}
