//! Process-wide telemetry bootstrap.
//!
//! Call [`init_tracer`] once at the top of `main`, then [`init_subscriber`]
//! to wire structured logging through the same provider. The provider and
//! the composite W3C propagator are registered globally and never replaced
//! afterwards; everything downstream (span creation, metadata injection)
//! reads them through `opentelemetry::global`.

use opentelemetry::global;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::SpanExporter;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Errors raised while wiring the OTLP exporter.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP span exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
}

/// Initialises the global tracer provider for `service_name`, exporting
/// spans over OTLP/gRPC to `endpoint`, and registers the W3C
/// TraceContext + Baggage composite propagator.
///
/// Keep the returned provider alive for the process lifetime and call
/// [`SdkTracerProvider::shutdown`] on it before exit to flush buffered
/// spans.
pub fn init_tracer(
    service_name: &str,
    endpoint: &str,
) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(normalize_endpoint(endpoint))
        .build()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider)
}

/// Installs the global `tracing` subscriber: `RUST_LOG` filtering, a fmt
/// layer, and the OpenTelemetry bridge so `tracing` spans become exported
/// spans with correct parentage.
pub fn init_subscriber(service_name: &str, provider: &SdkTracerProvider) {
    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();
}

// The tonic exporter wants a full URI; the OTel env convention allows a
// bare host:port.
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}
