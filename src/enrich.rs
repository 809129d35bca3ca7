//! Request and response enrichment strategies.
//!
//! Each hook is a single-method trait. Closures are accepted through the
//! [`TelemetryOptionsBuilder`](crate::TelemetryOptionsBuilder) methods, which
//! wrap them in the private adapters below.

use mediator_core::{DispatchResult, MessageType};
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::marker::PhantomData;

use crate::span::ActiveSpan;
use crate::tags::{TagSet, MESSAGING_RESPONSE_BODY};

/// Decides which message types skip instrumentation.
pub trait MessageFilter: Send + Sync {
    /// `true` to dispatch `message_type` without a span, tags or metrics.
    fn should_filter(&self, message_type: &MessageType) -> bool;
}

/// Adds request context before the downstream call.
///
/// An error aborts the dispatch: it is returned to the caller and the
/// downstream pipeline never runs.
pub trait EnrichDispatch: Send + Sync {
    fn enrich(&self, span: &mut ActiveSpan, message: &dyn Any, tags: &mut TagSet)
        -> DispatchResult<()>;
}

/// Adds response context after a successful downstream call.
///
/// Only invoked when response recording is enabled and a span is present.
/// An error is returned to the caller in place of the response.
pub trait EnrichResponse: Send + Sync {
    fn enrich(&self, span: &mut ActiveSpan, response: &dyn Any) -> DispatchResult<()>;
}

pub(crate) struct FnFilter<F>(pub(crate) F);

impl<F> MessageFilter for FnFilter<F>
where
    F: Fn(&MessageType) -> bool + Send + Sync,
{
    fn should_filter(&self, message_type: &MessageType) -> bool {
        (self.0)(message_type)
    }
}

/// Filters message types by short name.
pub(crate) struct NameFilter {
    names: HashSet<String>,
}

impl NameFilter {
    pub(crate) fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl MessageFilter for NameFilter {
    fn should_filter(&self, message_type: &MessageType) -> bool {
        self.names.contains(message_type.name())
    }
}

pub(crate) struct FnEnrichDispatch<F>(pub(crate) F);

impl<F> EnrichDispatch for FnEnrichDispatch<F>
where
    F: Fn(&mut ActiveSpan, &dyn Any, &mut TagSet) -> DispatchResult<()> + Send + Sync,
{
    fn enrich(
        &self,
        span: &mut ActiveSpan,
        message: &dyn Any,
        tags: &mut TagSet,
    ) -> DispatchResult<()> {
        (self.0)(span, message, tags)
    }
}

pub(crate) struct FnEnrichResponse<F>(pub(crate) F);

impl<F> EnrichResponse for FnEnrichResponse<F>
where
    F: Fn(&mut ActiveSpan, &dyn Any) -> DispatchResult<()> + Send + Sync,
{
    fn enrich(&self, span: &mut ActiveSpan, response: &dyn Any) -> DispatchResult<()> {
        (self.0)(span, response)
    }
}

/// Records responses of type `R` as a JSON string tag.
///
/// Responses of any other type are skipped. Serialization failures are
/// returned like any other enrichment error.
pub struct JsonResponse<R> {
    key: &'static str,
    max_len: Option<usize>,
    _marker: PhantomData<fn(&R)>,
}

impl<R> JsonResponse<R> {
    /// Write to [`MESSAGING_RESPONSE_BODY`].
    pub fn new() -> Self {
        Self {
            key: MESSAGING_RESPONSE_BODY,
            max_len: None,
            _marker: PhantomData,
        }
    }

    /// Write to `key` instead.
    #[must_use]
    pub fn with_key(mut self, key: &'static str) -> Self {
        self.key = key;
        self
    }

    /// Truncate the body to at most `max_len` bytes (on a char boundary).
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

impl<R> Default for JsonResponse<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Serialize + 'static> EnrichResponse for JsonResponse<R> {
    fn enrich(&self, span: &mut ActiveSpan, response: &dyn Any) -> DispatchResult<()> {
        let Some(response) = response.downcast_ref::<R>() else {
            return Ok(());
        };

        let mut body = serde_json::to_string(response)?;
        if let Some(max) = self.max_len {
            if body.len() > max {
                let mut end = max;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
        }
        span.add_tag(self.key, body);
        Ok(())
    }
}
