//! Test utilities for instrumentation tests.
//!
//! Provides:
//! - Fixture messages and handlers
//! - A mediator harness wired to recording spies

#![allow(dead_code)]

use mediator_otel::mediator_core::{
    handler_fn, CancellationToken, Mediator, Message, MessageType,
};
use mediator_otel::testing::{RecordingMeter, RecordingSpanFactory};
use mediator_otel::{DispatchMeter, Instrumentation, MediatorTelemetryExt, TelemetryOptions};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Message with a fixed identity: type `Foo` in namespace `Bar`.
#[derive(Debug, Clone)]
pub struct Foo(pub u32);

impl Message for Foo {
    fn message_type() -> MessageType {
        MessageType::named::<Self>("Foo", Some("Bar"))
    }
}

/// Message with no namespace.
pub struct Orphan;

impl Message for Orphan {
    fn message_type() -> MessageType {
        MessageType::named::<Self>("Orphan", None)
    }
}

/// Message whose handler always fails.
pub struct Explode(pub &'static str);
impl Message for Explode {}

/// Message excluded by [`filtered_options`].
pub struct Health;
impl Message for Health {}

/// Message whose handler sleeps before echoing its id.
pub struct Slow {
    pub id: usize,
    pub delay: Duration,
}
impl Message for Slow {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Doubled {
    pub value: u32,
}

#[derive(Debug, Error, PartialEq)]
#[error("handler exploded: {0}")]
pub struct HandlerFailed(pub &'static str);

/// Options that skip [`Health`].
pub fn filtered_options() -> TelemetryOptions {
    TelemetryOptions::builder()
        .filter_names(["Health"])
        .build()
        .expect("valid options")
}

/// Mediator instrumented with recording spies.
pub struct TestHarness {
    pub mediator: Arc<Mediator>,
    pub spans: RecordingSpanFactory,
    pub meter: Arc<RecordingMeter>,
}

impl TestHarness {
    pub fn new(options: TelemetryOptions) -> Self {
        Self::with_spans(options, RecordingSpanFactory::new())
    }

    /// Harness whose span factory never creates spans.
    pub fn sampled_out(options: TelemetryOptions) -> Self {
        Self::with_spans(options, RecordingSpanFactory::sampled_out())
    }

    fn with_spans(options: TelemetryOptions, spans: RecordingSpanFactory) -> Self {
        let meter = Arc::new(RecordingMeter::new());
        let instrumentation = Instrumentation::new(
            options,
            Arc::new(spans.clone()),
            Some(meter.clone() as Arc<dyn DispatchMeter>),
        );
        Self {
            mediator: Arc::new(fixture_mediator(&instrumentation)),
            spans,
            meter,
        }
    }

    pub async fn send<M, R>(&self, message: M) -> anyhow::Result<R>
    where
        M: Message,
        R: Send + 'static,
    {
        self.mediator.send(message, CancellationToken::new()).await
    }
}

/// Mediator with a handler for every fixture message.
pub fn fixture_mediator(instrumentation: &Instrumentation) -> Mediator {
    Mediator::builder()
        .with_telemetry(instrumentation)
        .handler(handler_fn(|foo: Foo, _cancel: CancellationToken| async move {
            Ok(Doubled { value: foo.0 * 2 })
        }))
        .handler(handler_fn(|_: Orphan, _cancel: CancellationToken| async { Ok(()) }))
        .handler(handler_fn(|msg: Explode, _cancel: CancellationToken| async move {
            Err::<(), anyhow::Error>(HandlerFailed(msg.0).into())
        }))
        .handler(handler_fn(|_: Health, _cancel: CancellationToken| async {
            Ok("healthy")
        }))
        .handler(handler_fn(|slow: Slow, _cancel: CancellationToken| async move {
            tokio::time::sleep(slow.delay).await;
            Ok(slow.id)
        }))
        .build()
}
