//! The instrumentation pipeline behavior.
//!
//! One [`TelemetryBehavior`] serves every message type. Per dispatch:
//!
//! ```text
//! filtered? ──yes──► next ──► return verbatim
//!    │ no
//!    ▼
//! span open ─► baseline tags ─► tag set ─► enrich ─► timed next
//!                                                      │
//!                        ┌─────────── ok ──────────────┴──────── err ───────────┐
//!                        ▼                                                      ▼
//!         response enrichment (if enabled) ──err──►         status error, exception,
//!         duration, status ok, success tag                  error=true, error tag
//!                        │                                                      │
//!                        └───────────────► span closed (guard) ◄────────────────┘
//! ```
//!
//! The outcome tag `messaging.operation.status` is written to the span and
//! to the tag set on both paths; the tag set then labels the dispatch
//! metrics.

use futures::future::BoxFuture;
use mediator_core::{
    CancellationToken, DispatchResult, Layer, Message, Next, Pipeline, PipelineBehavior,
};
use opentelemetry::trace::{FutureExt as _, SpanKind, Status};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::meter::{DispatchMeter, DispatchOutcome, InFlight};
use crate::options::TelemetryOptions;
use crate::span::{ActiveSpan, SpanFactory};
use crate::tags::{
    TagSet, ERROR, MESSAGING_OPERATION, MESSAGING_OPERATION_STATUS, MESSAGING_SYSTEM,
    MESSAGING_TIME_DURATION, OPERATION_PROCESS, STATUS_ERROR, STATUS_SUCCESS, SYSTEM_MEDIATOR,
};

/// Traces and times every dispatch it wraps.
#[derive(Clone)]
pub struct TelemetryBehavior {
    options: Arc<TelemetryOptions>,
    spans: Arc<dyn SpanFactory>,
    meter: Option<Arc<dyn DispatchMeter>>,
}

impl TelemetryBehavior {
    /// Behavior that traces through `spans` and records no metrics.
    pub fn new(options: Arc<TelemetryOptions>, spans: Arc<dyn SpanFactory>) -> Self {
        Self {
            options,
            spans,
            meter: None,
        }
    }

    /// Also record dispatch metrics through `meter`.
    #[must_use]
    pub fn with_meter(mut self, meter: Arc<dyn DispatchMeter>) -> Self {
        self.meter = Some(meter);
        self
    }

    pub fn options(&self) -> &TelemetryOptions {
        &self.options
    }

    pub fn records_metrics(&self) -> bool {
        self.meter.is_some()
    }

    async fn instrument<M, R>(
        &self,
        message: M,
        next: Next<M, R>,
        cancel: CancellationToken,
    ) -> DispatchResult<R>
    where
        M: Message,
        R: Send + 'static,
    {
        let message_type = M::message_type();
        if self.options.should_filter(&message_type) {
            return next.run(message, cancel).await;
        }

        let mut span =
            ActiveSpan::start(self.spans.as_ref(), message_type.name(), SpanKind::Internal);
        span.add_tag(MESSAGING_SYSTEM, SYSTEM_MEDIATOR);
        span.add_tag(MESSAGING_OPERATION, OPERATION_PROCESS);

        let mut tags = TagSet::for_message(&message_type);

        if let Some(enricher) = self.options.enricher() {
            enricher.enrich(&mut span, &message, &mut tags)?;
        }

        let in_flight = self
            .meter
            .as_deref()
            .map(|meter| InFlight::start(meter, message_type));
        let downstream = next.run(message, cancel);
        let start = Instant::now();
        let result = match span.context() {
            Some(cx) => downstream.with_context(cx).await,
            None => downstream.await,
        };
        let elapsed = start.elapsed();
        drop(in_flight);

        // A failing response enricher fails the dispatch.
        let result = result.and_then(|response| self.enrich_response(&mut span, response));

        match result {
            Ok(response) => {
                span.add_tag(MESSAGING_TIME_DURATION, elapsed.as_millis().to_string());
                span.set_status(Status::Ok);
                span.add_tag(MESSAGING_OPERATION_STATUS, STATUS_SUCCESS);
                tags.add(MESSAGING_OPERATION_STATUS, STATUS_SUCCESS);
                self.record(&tags, elapsed, DispatchOutcome::Success);

                tracing::debug!(
                    message_type = %message_type,
                    latency_ms = elapsed.as_secs_f64() * 1000.0,
                    "Message dispatched"
                );
                Ok(response)
            }
            Err(err) => {
                span.set_status(Status::error(err.to_string()));
                span.record_exception(&*err);
                span.add_tag(ERROR, true);
                span.add_tag(MESSAGING_OPERATION_STATUS, STATUS_ERROR);
                tags.add(MESSAGING_OPERATION_STATUS, STATUS_ERROR);
                self.record(&tags, elapsed, DispatchOutcome::Failure);

                tracing::debug!(
                    message_type = %message_type,
                    error = %err,
                    latency_ms = elapsed.as_secs_f64() * 1000.0,
                    "Message dispatch failed"
                );

                Err(err)
            }
        }
    }

    fn enrich_response<R: 'static>(&self, span: &mut ActiveSpan, response: R) -> DispatchResult<R> {
        if self.options.record_response() && span.is_present() {
            if let Some(enricher) = self.options.response_enricher() {
                enricher.enrich(span, &response)?;
            }
        }
        Ok(response)
    }

    fn record(&self, tags: &TagSet, elapsed: Duration, outcome: DispatchOutcome) {
        if let Some(meter) = self.meter.as_deref() {
            meter.record(tags, elapsed, outcome);
        }
    }
}

impl<M, R> PipelineBehavior<M, R> for TelemetryBehavior
where
    M: Message,
    R: Send + 'static,
{
    fn handle<'a>(
        &'a self,
        message: M,
        next: Next<M, R>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, DispatchResult<R>> {
        Box::pin(self.instrument(message, next, cancel))
    }
}

impl Layer for TelemetryBehavior {
    fn layer<M: Message, R: Send + 'static>(&self, pipeline: Pipeline<M, R>) -> Pipeline<M, R> {
        pipeline.wrap(Arc::new(self.clone()))
    }
}

impl std::fmt::Debug for TelemetryBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBehavior")
            .field("options", &self.options)
            .field("records_metrics", &self.records_metrics())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{CODE_NAMESPACE, MESSAGING_MESSAGE_TYPE};
    use crate::testing::{RecordingMeter, RecordingSpanFactory};
    use mediator_core::MessageType;
    use opentelemetry::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use thiserror::Error;

    struct Foo(u32);
    impl Message for Foo {
        fn message_type() -> MessageType {
            MessageType::named::<Self>("Foo", Some("Bar"))
        }
    }

    #[derive(Debug, Error, PartialEq)]
    #[error("boom")]
    struct Boom;

    fn behavior(options: TelemetryOptions, spans: &RecordingSpanFactory) -> TelemetryBehavior {
        TelemetryBehavior::new(Arc::new(options), Arc::new(spans.clone()))
    }

    fn ok_next(calls: Arc<AtomicUsize>) -> Next<Foo, u32> {
        Next::new(move |msg: Foo, _cancel| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(msg.0 * 2)
        })
    }

    fn failing_next() -> Next<Foo, u32> {
        Next::new(|_msg: Foo, _cancel| async { Err(Boom.into()) })
    }

    #[tokio::test]
    async fn test_success_tags_and_status() {
        let spans = RecordingSpanFactory::new();
        let behavior = behavior(TelemetryOptions::default(), &spans);

        let out = behavior
            .handle(Foo(21), ok_next(Arc::default()), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, 42);

        let record = spans.last().unwrap();
        assert_eq!(record.name, "Foo");
        assert_eq!(record.kind, SpanKind::Internal);
        assert_eq!(record.status, Status::Ok);
        assert_eq!(record.tag(MESSAGING_SYSTEM), Some(&Value::from("mediator")));
        assert_eq!(record.tag(MESSAGING_OPERATION), Some(&Value::from("process")));
        assert_eq!(record.tag(MESSAGING_OPERATION_STATUS), Some(&Value::from("success")));
        assert!(record.tag(MESSAGING_TIME_DURATION).is_some());
        assert!(record.tag(ERROR).is_none());
        assert_eq!(record.closed, 1);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_returned_unchanged() {
        let spans = RecordingSpanFactory::new();
        let meter = Arc::new(RecordingMeter::new());
        let behavior = behavior(TelemetryOptions::default(), &spans).with_meter(meter.clone());

        let err = behavior
            .handle(Foo(1), failing_next(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Boom>(), Some(&Boom));
        assert_eq!(err.to_string(), "boom");

        let record = spans.last().unwrap();
        assert_eq!(record.status, Status::error("boom"));
        assert_eq!(record.exceptions, vec!["boom".to_string()]);
        assert_eq!(record.tag(ERROR), Some(&Value::Bool(true)));
        assert_eq!(record.tag(MESSAGING_OPERATION_STATUS), Some(&Value::from("error")));
        assert!(record.tag(MESSAGING_TIME_DURATION).is_none());
        assert_eq!(record.closed, 1);

        let attributes = meter.attributes();
        let failed = attributes.last().unwrap();
        assert!(failed
            .iter()
            .any(|kv| kv.key.as_str() == MESSAGING_OPERATION_STATUS
                && kv.value == Value::from("error")));
        assert_eq!(meter.failed(), 1);
    }

    #[tokio::test]
    async fn test_filtered_message_bypasses_instrumentation() {
        let spans = RecordingSpanFactory::new();
        let meter = Arc::new(RecordingMeter::new());
        let enriched = Arc::new(AtomicUsize::new(0));
        let enriched_in_hook = Arc::clone(&enriched);
        let options = TelemetryOptions::builder()
            .filter(|ty| ty.is::<Foo>())
            .enrich(move |_, _, _| {
                enriched_in_hook.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();
        let behavior = behavior(options, &spans).with_meter(meter.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let out = behavior
            .handle(Foo(5), ok_next(Arc::clone(&calls)), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(spans.started(), 0);
        assert_eq!(enriched.load(Ordering::SeqCst), 0);
        assert_eq!(meter.total(), 0);
        assert_eq!(meter.started_count(), 0);
    }

    #[tokio::test]
    async fn test_filtered_failure_passes_through() {
        let spans = RecordingSpanFactory::new();
        let options = TelemetryOptions::builder()
            .filter(|_| true)
            .build()
            .unwrap();
        let behavior = behavior(options, &spans);

        let err = behavior
            .handle(Foo(5), failing_next(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is::<Boom>());
        assert_eq!(spans.started(), 0);
    }

    #[tokio::test]
    async fn test_enricher_sees_message_and_tag_set() {
        let spans = RecordingSpanFactory::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_in_hook = Arc::clone(&seen);
        let options = TelemetryOptions::builder()
            .enrich(move |span, message, tags| {
                let foo = message.downcast_ref::<Foo>().expect("message is Foo");
                span.add_tag("foo.value", i64::from(foo.0));
                tags.add("tenant", "acme");
                *seen_in_hook.lock().unwrap() = Some(tags.clone());
                Ok(())
            })
            .build()
            .unwrap();
        let behavior = behavior(options, &spans);

        behavior
            .handle(Foo(3), ok_next(Arc::default()), CancellationToken::new())
            .await
            .unwrap();

        let tags = seen.lock().unwrap().clone().unwrap();
        assert_eq!(tags.get(MESSAGING_MESSAGE_TYPE), Some(&Value::from("Foo")));
        assert_eq!(tags.get(CODE_NAMESPACE), Some(&Value::from("Bar")));
        assert_eq!(tags.get("tenant"), Some(&Value::from("acme")));
        assert_eq!(spans.last().unwrap().tag("foo.value"), Some(&Value::I64(3)));
    }

    #[tokio::test]
    async fn test_enricher_failure_aborts_before_next() {
        let spans = RecordingSpanFactory::new();
        let meter = Arc::new(RecordingMeter::new());
        let options = TelemetryOptions::builder()
            .enrich(|_, _, _| Err(Boom.into()))
            .build()
            .unwrap();
        let behavior = behavior(options, &spans).with_meter(meter.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let err = behavior
            .handle(Foo(1), ok_next(Arc::clone(&calls)), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is::<Boom>());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(spans.last().unwrap().closed, 1);
        assert_eq!(meter.started_count(), 0);
    }

    #[tokio::test]
    async fn test_absent_span_still_dispatches() {
        let spans = RecordingSpanFactory::sampled_out();
        let options = TelemetryOptions::builder()
            .record_response(true)
            .enrich_response(|_, _| panic!("no span, no response enrichment"))
            .build()
            .unwrap();
        let behavior = behavior(options, &spans);

        let out = behavior
            .handle(Foo(4), ok_next(Arc::default()), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, 8);

        let err = behavior
            .handle(Foo(4), failing_next(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is::<Boom>());

        assert_eq!(spans.started(), 2);
        assert!(spans.spans().is_empty());
    }

    #[tokio::test]
    async fn test_response_enrichment_gating() {
        let calls = Arc::new(AtomicUsize::new(0));
        let make = |record_response: bool| {
            let calls = Arc::clone(&calls);
            TelemetryOptions::builder()
                .record_response(record_response)
                .enrich_response(move |span, response| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let value = *response.downcast_ref::<u32>().expect("response is u32");
                    span.add_tag("response", i64::from(value));
                    Ok(())
                })
                .build()
                .unwrap()
        };

        // disabled
        let spans = RecordingSpanFactory::new();
        behavior(make(false), &spans)
            .handle(Foo(1), ok_next(Arc::default()), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // enabled, failure path
        behavior(make(true), &spans)
            .handle(Foo(1), failing_next(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // enabled, success path
        behavior(make(true), &spans)
            .handle(Foo(1), ok_next(Arc::default()), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(spans.last().unwrap().tag("response"), Some(&Value::I64(2)));
    }

    #[tokio::test]
    async fn test_response_enricher_failure_fails_dispatch() {
        let spans = RecordingSpanFactory::new();
        let meter = Arc::new(RecordingMeter::new());
        let options = TelemetryOptions::builder()
            .record_response(true)
            .enrich_response(|_, _| Err(Boom.into()))
            .build()
            .unwrap();

        let err = behavior(options, &spans)
            .with_meter(meter.clone())
            .handle(Foo(1), ok_next(Arc::default()), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is::<Boom>());

        let record = spans.last().unwrap();
        assert_eq!(record.closed, 1);
        assert_eq!(record.status, Status::error("boom"));
        assert_eq!(record.exceptions, vec!["boom".to_owned()]);
        assert_eq!(record.tag(ERROR), Some(&Value::Bool(true)));
        assert_eq!(record.tag(MESSAGING_OPERATION_STATUS), Some(&Value::from("error")));
        assert!(record.tag(MESSAGING_TIME_DURATION).is_none());

        assert_eq!(meter.total(), 1);
        assert_eq!(meter.failed(), 1);
        let attributes = meter.attributes();
        let status = attributes[0]
            .iter()
            .find(|kv| kv.key.as_str() == MESSAGING_OPERATION_STATUS)
            .map(|kv| kv.value.clone());
        assert_eq!(status, Some(Value::from("error")));
    }

    #[tokio::test]
    async fn test_nested_dispatch_is_child_span() {
        use crate::observability::spans::OtelSpanFactory;
        use opentelemetry::trace::TracerProvider as _;
        use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
        use opentelemetry_sdk::trace::TracerProvider;

        struct Inner(u32);
        impl Message for Inner {}

        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let spans = OtelSpanFactory::new(provider.tracer("nested"));
        let behavior =
            TelemetryBehavior::new(Arc::new(TelemetryOptions::default()), Arc::new(spans));

        let inner_behavior = behavior.clone();
        let next = Next::new(move |outer: Foo, cancel| async move {
            let inner_next = Next::new(|inner: Inner, _cancel| async move { Ok(inner.0 + 1) });
            inner_behavior.handle(Inner(outer.0), inner_next, cancel).await
        });
        let out = behavior
            .handle(Foo(1), next, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, 2);

        let finished = exporter.get_finished_spans().unwrap();
        assert_eq!(finished.len(), 2);
        let inner = finished.iter().find(|s| s.name == "Inner").unwrap();
        let outer = finished.iter().find(|s| s.name == "Foo").unwrap();
        assert_eq!(inner.parent_span_id, outer.span_context.span_id());
        assert_eq!(inner.span_context.trace_id(), outer.span_context.trace_id());
    }

    #[tokio::test]
    async fn test_metrics_on_success() {
        let spans = RecordingSpanFactory::new();
        let meter = Arc::new(RecordingMeter::new());
        let behavior = behavior(TelemetryOptions::default(), &spans).with_meter(meter.clone());
        assert!(behavior.records_metrics());

        for i in 0..3 {
            behavior
                .handle(Foo(i), ok_next(Arc::default()), CancellationToken::new())
                .await
                .unwrap();
        }

        assert_eq!(meter.total(), 3);
        assert_eq!(meter.failed(), 0);
        assert_eq!(meter.active(), 0);
        assert_eq!(meter.started_count(), 3);
        assert_eq!(meter.durations().len(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_token_forwarded() {
        let spans = RecordingSpanFactory::new();
        let behavior = behavior(TelemetryOptions::default(), &spans);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let next = Next::new(|_msg: Foo, cancel: CancellationToken| async move {
            Ok(u32::from(cancel.is_cancelled()))
        });
        let out = behavior.handle(Foo(0), next, cancel).await.unwrap();
        assert_eq!(out, 1);
    }

    #[tokio::test]
    async fn test_dropped_dispatch_balances_in_flight() {
        let spans = RecordingSpanFactory::new();
        let meter = Arc::new(RecordingMeter::new());
        let behavior = behavior(TelemetryOptions::default(), &spans).with_meter(meter.clone());

        let next = Next::new(|_msg: Foo, _cancel| {
            futures::future::pending::<DispatchResult<u32>>()
        });
        let dispatch = behavior.handle(Foo(0), next, CancellationToken::new());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), dispatch).await;

        assert!(timed_out.is_err());
        assert_eq!(meter.active(), 0);
        assert_eq!(meter.total(), 0);
        assert_eq!(spans.last().unwrap().closed, 1);
    }
}
