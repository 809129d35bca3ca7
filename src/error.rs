//! Configuration errors.
//!
//! Dispatch failures travel on [`mediator_core::DispatchError`] untouched;
//! only setup problems get their own type.

use thiserror::Error;

/// Errors raised while building [`TelemetryOptions`](crate::TelemetryOptions).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The instrumentation name identifies the tracing source and cannot be blank.
    #[error("instrumentation name cannot be empty")]
    EmptyInstrumentationName,

    /// A version was given but is blank.
    #[error("instrumentation version cannot be empty (omit it instead)")]
    EmptyInstrumentationVersion,
}
