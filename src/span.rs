//! Span capability and the span guard.
//!
//! [`SpanFactory`] and [`TelemetrySpan`] are the only tracing operations the
//! behavior needs. [`ActiveSpan`] wraps a possibly-absent span so that every
//! call is a no-op when the backend declined to create one, and closes the
//! span exactly once when dropped.

use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::{Context, Key, KeyValue, Value};
use std::error::Error;

/// One traced operation owned by a tracing backend.
pub trait TelemetrySpan: Send {
    fn add_tag(&mut self, tag: KeyValue);

    fn set_status(&mut self, status: Status);

    /// Attach an error as an exception record.
    fn record_exception(&mut self, error: &(dyn Error + 'static));

    /// End the span. Called once by [`ActiveSpan`].
    fn close(&mut self);

    /// Context with this span active, used as the parent of work done
    /// downstream. Backends without context propagation return `None`.
    fn context(&self) -> Option<Context> {
        None
    }
}

/// Creates spans for dispatches.
pub trait SpanFactory: Send + Sync {
    /// Start a span, or return `None` when the backend is disabled or the
    /// span is sampled out.
    fn start_span(&self, name: &'static str, kind: SpanKind) -> Option<Box<dyn TelemetrySpan>>;
}

/// Factory that never creates spans.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpanFactory;

impl SpanFactory for NoopSpanFactory {
    fn start_span(&self, _name: &'static str, _kind: SpanKind) -> Option<Box<dyn TelemetrySpan>> {
        None
    }
}

/// Scoped handle to the span of one dispatch.
pub struct ActiveSpan {
    inner: Option<Box<dyn TelemetrySpan>>,
}

impl ActiveSpan {
    /// Start a span through `factory`.
    pub fn start(factory: &dyn SpanFactory, name: &'static str, kind: SpanKind) -> Self {
        Self {
            inner: factory.start_span(name, kind),
        }
    }

    /// A handle with no span behind it.
    pub fn absent() -> Self {
        Self { inner: None }
    }

    /// Whether a span is being recorded.
    pub fn is_present(&self) -> bool {
        self.inner.is_some()
    }

    pub fn add_tag(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        if let Some(span) = self.inner.as_mut() {
            span.add_tag(KeyValue::new(key, value));
        }
    }

    pub fn set_status(&mut self, status: Status) {
        if let Some(span) = self.inner.as_mut() {
            span.set_status(status);
        }
    }

    pub fn record_exception(&mut self, error: &(dyn Error + 'static)) {
        if let Some(span) = self.inner.as_mut() {
            span.record_exception(error);
        }
    }

    /// Context to run downstream work under, if the backend has one.
    pub fn context(&self) -> Option<Context> {
        self.inner.as_ref().and_then(|span| span.context())
    }

    /// Direct access to the backend span, if any.
    pub fn inner_mut(&mut self) -> Option<&mut (dyn TelemetrySpan + 'static)> {
        self.inner.as_deref_mut()
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        if let Some(mut span) = self.inner.take() {
            span.close();
        }
    }
}

impl std::fmt::Debug for ActiveSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSpan")
            .field("present", &self.is_present())
            .finish()
    }
}
