//! mediator-otel: OpenTelemetry tracing and metrics for mediator pipelines.
//!
//! Installs a single pipeline behavior in front of every registered message
//! handler. For each dispatch it opens a span named after the message type,
//! tags it, times the downstream call, records the outcome, and hands back
//! exactly what the pipeline returned.
//!
//! # Architecture
//!
//! - **Explicit capabilities**: spans come from an injected [`SpanFactory`],
//!   metrics from an injected [`DispatchMeter`]; nothing reads a hidden global
//!   at dispatch time
//! - **Pass-through**: responses and errors are returned unchanged
//! - **Guaranteed closure**: spans are closed by an RAII guard on every exit path
//! - **Filterable**: a predicate can exempt message types from instrumentation
//!
//! # Modules
//!
//! - [`behavior`]: The instrumentation pipeline behavior
//! - [`config`]: CLI and environment configuration for the demo binary
//! - [`enrich`]: Request and response enrichment strategies
//! - [`error`]: Configuration errors
//! - [`meter`]: Dispatch metrics capability
//! - [`observability`]: OpenTelemetry adapters and subscriber setup
//! - [`options`]: Instrumentation options
//! - [`registration`]: Installing instrumentation on a mediator
//! - [`span`]: Span capability and the span guard
//! - [`tags`]: Tag keys and the per-dispatch tag set
//! - [`testing`]: Recording spies for spans and metrics

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // options::TelemetryOptions is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod behavior;
pub mod config;
pub mod enrich;
pub mod error;
pub mod meter;
pub mod observability;
pub mod options;
pub mod registration;
pub mod span;
pub mod tags;
pub mod testing;

pub use behavior::TelemetryBehavior;
pub use enrich::{EnrichDispatch, EnrichResponse, JsonResponse, MessageFilter};
pub use error::ConfigError;
pub use meter::{DispatchMeter, DispatchOutcome};
pub use options::{TelemetryOptions, TelemetryOptionsBuilder};
pub use registration::{Instrumentation, MediatorTelemetryExt};
pub use span::{ActiveSpan, NoopSpanFactory, SpanFactory, TelemetrySpan};
pub use tags::TagSet;

pub use mediator_core;
