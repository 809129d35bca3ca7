//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - Span and meter adapters over the OpenTelemetry API
//! - Structured logging with optional OTLP trace export
//! - Meter provider setup with optional OTLP metrics export

pub mod metrics;
pub mod spans;
pub mod tracing;
