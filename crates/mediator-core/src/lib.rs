//! Mediator core: in-process request/handler dispatch.
//!
//! A caller sends a [`Message`] through a [`Mediator`]; the mediator finds the
//! [`Pipeline`] registered for that message type and runs it. A pipeline is an
//! ordered list of [`PipelineBehavior`]s wrapped around one terminal
//! [`Handler`]. Each behavior receives a [`Next`] continuation that dispatches
//! the message through the rest of the pipeline.
//!
//! # Modules
//!
//! - [`error`]: Dispatch and routing errors
//! - [`mediator`]: Type-keyed pipeline registry and layers
//! - [`message`]: Message identity (type name and namespace)
//! - [`pipeline`]: Continuations, behaviors, handlers and pipelines

#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // pipeline::PipelineBehavior is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc       // Error docs can be verbose
)]

pub mod error;
pub mod mediator;
pub mod message;
pub mod pipeline;

pub use error::{DispatchError, DispatchResult, MediatorError};
pub use mediator::{Identity, Layer, Mediator, MediatorBuilder, Stack};
pub use message::{Message, MessageType, GLOBAL_NAMESPACE};
pub use pipeline::{handler_fn, FnHandler, Handler, Next, Pipeline, PipelineBehavior};

/// Cancellation signal forwarded untouched through every pipeline stage.
pub use tokio_util::sync::CancellationToken;
