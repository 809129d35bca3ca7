//! [`SpanFactory`] over an OpenTelemetry tracer.

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{Span, SpanKind, Status, TraceContextExt, Tracer, TracerProvider};
use opentelemetry::{Context, KeyValue};
use std::error::Error;

use crate::options::TelemetryOptions;
use crate::span::{SpanFactory, TelemetrySpan};

/// Creates dispatch spans with an OpenTelemetry [`Tracer`].
///
/// Spans that are not recording (sampled out, or a no-op provider) are
/// reported as absent.
#[derive(Debug)]
pub struct OtelSpanFactory<T> {
    tracer: T,
}

impl<T> OtelSpanFactory<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }

    /// Tracer named and versioned after `options`, taken from `provider`.
    pub fn from_provider<P>(provider: &P, options: &TelemetryOptions) -> Self
    where
        P: TracerProvider<Tracer = T>,
    {
        let mut builder = provider.tracer_builder(options.instrumentation_name());
        if let Some(version) = options.instrumentation_version() {
            builder = builder.with_version(version);
        }
        Self::new(builder.build())
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }
}

impl OtelSpanFactory<BoxedTracer> {
    /// Tracer from the process-wide provider installed with
    /// [`global::set_tracer_provider`].
    pub fn global(options: &TelemetryOptions) -> Self {
        Self::from_provider(&global::tracer_provider(), options)
    }
}

impl<T> SpanFactory for OtelSpanFactory<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    fn start_span(&self, name: &'static str, kind: SpanKind) -> Option<Box<dyn TelemetrySpan>> {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(kind)
            .start(&self.tracer);

        if !span.is_recording() {
            return None;
        }
        Some(Box::new(OtelSpan {
            cx: Context::current_with_span(span),
        }))
    }
}

/// Span held inside the context it is active in.
struct OtelSpan {
    cx: Context,
}

impl TelemetrySpan for OtelSpan {
    fn add_tag(&mut self, tag: KeyValue) {
        self.cx.span().set_attribute(tag);
    }

    fn set_status(&mut self, status: Status) {
        self.cx.span().set_status(status);
    }

    fn record_exception(&mut self, error: &(dyn Error + 'static)) {
        self.cx.span().record_error(error);
    }

    fn close(&mut self) {
        self.cx.span().end();
    }

    fn context(&self) -> Option<Context> {
        Some(self.cx.clone())
    }
}
