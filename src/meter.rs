//! Dispatch metrics capability.
//!
//! Four instruments per dispatch: in-flight count, total count, failure
//! count and duration. The OpenTelemetry implementation lives in
//! [`observability::metrics`](crate::observability::metrics).

use mediator_core::MessageType;
use std::time::Duration;

use crate::tags::{TagSet, STATUS_ERROR, STATUS_SUCCESS};

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    Failure,
}

impl DispatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => STATUS_SUCCESS,
            Self::Failure => STATUS_ERROR,
        }
    }

    pub fn is_failure(self) -> bool {
        self == Self::Failure
    }
}

/// Records dispatch metrics.
///
/// `started` and `ended` always come in pairs, even when the dispatch future
/// is dropped before completing. `record` is called once per dispatch that
/// produced an outcome.
pub trait DispatchMeter: Send + Sync {
    /// A dispatch of `message_type` entered the downstream call.
    fn started(&self, message_type: &MessageType);

    /// A dispatch of `message_type` left the downstream call.
    fn ended(&self, message_type: &MessageType);

    /// A dispatch finished with `outcome` after `elapsed`.
    fn record(&self, tags: &TagSet, elapsed: Duration, outcome: DispatchOutcome);
}

/// Keeps the in-flight count balanced for the lifetime of a dispatch.
pub(crate) struct InFlight<'a> {
    meter: &'a dyn DispatchMeter,
    message_type: MessageType,
}

impl<'a> InFlight<'a> {
    pub(crate) fn start(meter: &'a dyn DispatchMeter, message_type: MessageType) -> Self {
        meter.started(&message_type);
        Self {
            meter,
            message_type,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.meter.ended(&self.message_type);
    }
}
