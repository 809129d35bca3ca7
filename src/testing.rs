//! Recording spies for spans and metrics.
//!
//! Useful for asserting what instrumentation recorded without running an
//! OpenTelemetry SDK.

use mediator_core::MessageType;
use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::{KeyValue, Value};
use std::error::Error;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::meter::{DispatchMeter, DispatchOutcome};
use crate::span::{SpanFactory, TelemetrySpan};
use crate::tags::TagSet;

/// Snapshot of one recorded span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub name: &'static str,
    pub kind: SpanKind,
    pub tags: Vec<KeyValue>,
    pub status: Status,
    /// Display text of each recorded exception.
    pub exceptions: Vec<String>,
    /// Number of times the span was closed.
    pub closed: u32,
}

impl SpanRecord {
    fn new(name: &'static str, kind: SpanKind) -> Self {
        Self {
            name,
            kind,
            tags: Vec::new(),
            status: Status::Unset,
            exceptions: Vec::new(),
            closed: 0,
        }
    }

    /// First value recorded under `key`.
    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}

#[derive(Debug, Default)]
struct SpanLog {
    started: AtomicUsize,
    records: Mutex<Vec<Arc<Mutex<SpanRecord>>>>,
}

/// [`SpanFactory`] that keeps every span it creates.
#[derive(Debug, Clone)]
pub struct RecordingSpanFactory {
    log: Arc<SpanLog>,
    sampled: bool,
}

impl Default for RecordingSpanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSpanFactory {
    /// Factory that creates a span for every request.
    pub fn new() -> Self {
        Self {
            log: Arc::default(),
            sampled: true,
        }
    }

    /// Factory that counts requests but never creates a span.
    pub fn sampled_out() -> Self {
        Self {
            log: Arc::default(),
            sampled: false,
        }
    }

    /// Number of `start_span` calls, sampled or not.
    pub fn started(&self) -> usize {
        self.log.started.load(Ordering::SeqCst)
    }

    /// Snapshots of all created spans, in creation order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.log
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.lock().unwrap().clone())
            .collect()
    }

    /// Snapshot of the most recently created span.
    pub fn last(&self) -> Option<SpanRecord> {
        self.spans().pop()
    }
}

impl SpanFactory for RecordingSpanFactory {
    fn start_span(&self, name: &'static str, kind: SpanKind) -> Option<Box<dyn TelemetrySpan>> {
        self.log.started.fetch_add(1, Ordering::SeqCst);
        if !self.sampled {
            return None;
        }

        let record = Arc::new(Mutex::new(SpanRecord::new(name, kind)));
        self.log.records.lock().unwrap().push(Arc::clone(&record));
        Some(Box::new(RecordingSpan { record }))
    }
}

struct RecordingSpan {
    record: Arc<Mutex<SpanRecord>>,
}

impl TelemetrySpan for RecordingSpan {
    fn add_tag(&mut self, tag: KeyValue) {
        self.record.lock().unwrap().tags.push(tag);
    }

    fn set_status(&mut self, status: Status) {
        self.record.lock().unwrap().status = status;
    }

    fn record_exception(&mut self, error: &(dyn Error + 'static)) {
        self.record.lock().unwrap().exceptions.push(error.to_string());
    }

    fn close(&mut self) {
        self.record.lock().unwrap().closed += 1;
    }
}

/// [`DispatchMeter`] that keeps counts, durations and attribute sets.
#[derive(Debug, Default)]
pub struct RecordingMeter {
    active: AtomicI64,
    started: AtomicUsize,
    total: AtomicUsize,
    failed: AtomicUsize,
    durations: Mutex<Vec<Duration>>,
    attributes: Mutex<Vec<Vec<KeyValue>>>,
}

impl RecordingMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches currently inside the downstream call.
    pub fn active(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Dispatches that entered the downstream call.
    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Dispatches that produced an outcome.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.durations.lock().unwrap().clone()
    }

    /// Attribute set of each recorded outcome, in order.
    pub fn attributes(&self) -> Vec<Vec<KeyValue>> {
        self.attributes.lock().unwrap().clone()
    }
}

impl DispatchMeter for RecordingMeter {
    fn started(&self, _message_type: &MessageType) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn ended(&self, _message_type: &MessageType) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn record(&self, tags: &TagSet, elapsed: Duration, outcome: DispatchOutcome) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if outcome.is_failure() {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.durations.lock().unwrap().push(elapsed);
        self.attributes.lock().unwrap().push(tags.as_slice().to_vec());
    }
}
