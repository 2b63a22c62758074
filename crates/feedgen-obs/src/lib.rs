//! Observability utilities: tracing setup and service metrics

use once_cell::sync::Lazy;
use opentelemetry_otlp::WithExportConfig;
use prometheus::{Encoder, IntCounter, IntGauge, TextEncoder};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static GENERATE_REQUESTS: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("feedgen_generate_requests_total", "Total number of /generate requests").unwrap());
static ITEMS_GENERATED: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("feedgen_items_generated_total", "Feedback items produced").unwrap());
static INJECTED_FAILURES: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("feedgen_injected_failures_total", "Generate calls failed on purpose").unwrap());
static STORED_TOTAL: Lazy<IntGauge> = Lazy::new(|| prometheus::register_int_gauge!("feedgen_stored_items", "Items currently held by the service").unwrap());

pub fn init() {
    // Register everything up front so /metrics lists zeroed series.
    let _ = &*GENERATE_REQUESTS;
    let _ = &*ITEMS_GENERATED;
    let _ = &*INJECTED_FAILURES;
    let _ = &*STORED_TOTAL;
}

pub fn record_generate(items: u64, stored_total: u64) {
    GENERATE_REQUESTS.inc();
    ITEMS_GENERATED.inc_by(items);
    STORED_TOTAL.set(stored_total as i64);
}

pub fn record_injected_failure() {
    GENERATE_REQUESTS.inc();
    INJECTED_FAILURES.inc();
}

/// Text exposition of the default registry plus its content type.
pub fn render() -> prometheus::Result<(String, Vec<u8>)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .install_simple()
            .ok();
        if let Some(tracer) = tracer {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(OpenTelemetryLayer::new(tracer))
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
