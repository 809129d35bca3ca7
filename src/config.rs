//! Configuration parsing for the demo binary.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::Parser;

use crate::options::{
    TelemetryOptions, TelemetryOptionsBuilder, DEFAULT_INSTRUMENTATION_NAME,
    DEFAULT_INSTRUMENTATION_VERSION,
};

/// mediator-otel: dispatches sample messages through an instrumented mediator.
#[derive(Parser, Debug, Clone)]
#[command(name = "mediator-otel")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Tracer and meter name
    #[arg(
        long,
        env = "MEDIATOR_OTEL_INSTRUMENTATION_NAME",
        default_value = DEFAULT_INSTRUMENTATION_NAME
    )]
    pub instrumentation_name: String,

    /// Tracer and meter version
    #[arg(
        long,
        env = "MEDIATOR_OTEL_INSTRUMENTATION_VERSION",
        default_value = DEFAULT_INSTRUMENTATION_VERSION
    )]
    pub instrumentation_version: String,

    /// Number of sample dispatches to run concurrently
    #[arg(short, long, env = "MEDIATOR_OTEL_DISPATCHES", default_value_t = 20)]
    pub dispatches: usize,

    /// Fail every Nth order placement (0 disables failures)
    #[arg(long, env = "MEDIATOR_OTEL_FAIL_EVERY", default_value_t = 5)]
    pub fail_every: u64,

    /// Message type names excluded from instrumentation
    #[arg(long, env = "MEDIATOR_OTEL_FILTER", value_delimiter = ',')]
    pub filter: Vec<String>,

    /// Record serialized responses on spans
    #[arg(long, env = "MEDIATOR_OTEL_RECORD_RESPONSE")]
    pub record_response: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// OpenTelemetry collector endpoint for trace and metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Instrumentation options described by this configuration.
    ///
    /// Response enrichment is left to the caller, which knows the response
    /// types it dispatches.
    pub fn options_builder(&self) -> TelemetryOptionsBuilder {
        let builder = TelemetryOptions::builder()
            .name(self.instrumentation_name.clone())
            .version(self.instrumentation_version.clone())
            .record_response(self.record_response);

        if self.filter.is_empty() {
            builder
        } else {
            builder.filter_names(self.filter.iter().cloned())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instrumentation_name: DEFAULT_INSTRUMENTATION_NAME.into(),
            instrumentation_version: DEFAULT_INSTRUMENTATION_VERSION.into(),
            dispatches: 20,
            fail_every: 5,
            filter: Vec::new(),
            record_response: false,
            log_level: "info".into(),
            otel_endpoint: None,
        }
    }
}
