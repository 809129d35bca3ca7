//! Logging and trace export setup.
//!
//! Configures structured logging with:
//! - Console output with structured format
//! - Environment-based filter (via RUST_LOG)
//! - Optional OTLP trace export, shared by dispatch spans and `tracing` spans

use opentelemetry::global;
use opentelemetry::trace::{TraceError, TracerProvider as _};
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the process tracer provider and install it globally.
///
/// Batches spans to an OTLP/gRPC collector when `otel_endpoint` is set;
/// otherwise spans are created and sampled but not exported.
pub fn init_tracer_provider(otel_endpoint: Option<&str>) -> Result<TracerProvider, TraceError> {
    let provider = match otel_endpoint {
        Some(endpoint) => {
            use opentelemetry_otlp::WithExportConfig;

            opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .install_batch(opentelemetry_sdk::runtime::Tokio)?
        }
        None => TracerProvider::builder().build(),
    };

    global::set_tracer_provider(provider.clone());
    Ok(provider)
}

/// Initialize logging.
///
/// This sets up:
/// - Console logging with structured format
/// - Environment-based filter (via RUST_LOG), falling back to `log_level`
/// - A `tracing-opentelemetry` layer when `provider` is given, so `tracing`
///   spans are exported next to dispatch spans
///
/// # Panics
///
/// Panics if tracing has already been initialized.
pub fn init_tracing(log_level: &str, provider: Option<&TracerProvider>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let otel_layer = provider.map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(env!("CARGO_PKG_NAME")))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    tracing::info!(log_level, "Tracing initialized");
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
