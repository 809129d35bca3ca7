//! Dispatch error types.

use thiserror::Error;

/// Error channel shared by handlers, behaviors and callers.
///
/// Behaviors must hand back the exact error they received from their
/// continuation so callers can still downcast it to the handler's own type.
pub type DispatchError = anyhow::Error;

/// Result of one dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised by the mediator itself rather than by a handler.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// No pipeline is registered for the message type and response pairing.
    #[error("no handler registered for message type {message_type} returning {response_type}")]
    HandlerNotFound {
        message_type: &'static str,
        response_type: &'static str,
    },
}
