//! OpenTelemetry dispatch metrics.
//!
//! Instruments:
//! - mediator.messages.active: Up-down counter of dispatches in flight
//! - mediator.messages.total: Counter of completed dispatches
//! - mediator.messages.failed: Counter of failed dispatches
//! - mediator.messages.duration: Histogram of dispatch duration in seconds

use mediator_core::MessageType;
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider, UpDownCounter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::time::Duration;

use crate::meter::{DispatchMeter, DispatchOutcome};
use crate::options::TelemetryOptions;
use crate::tags::{TagSet, MESSAGING_MESSAGE_TYPE, MESSAGING_SYSTEM, SYSTEM_MEDIATOR};

/// [`DispatchMeter`] backed by OpenTelemetry instruments.
#[derive(Debug, Clone)]
pub struct OtelDispatchMeter {
    /// Dispatches currently inside the downstream call.
    pub active: UpDownCounter<i64>,
    /// Dispatches that produced an outcome.
    pub total: Counter<u64>,
    /// Dispatches that failed.
    pub failed: Counter<u64>,
    /// Dispatch duration in seconds.
    pub duration: Histogram<f64>,
}

impl OtelDispatchMeter {
    /// Create the instruments on `meter`.
    pub fn new(meter: &Meter) -> Self {
        Self {
            active: meter
                .i64_up_down_counter("mediator.messages.active")
                .with_description("Number of messages currently being handled")
                .with_unit("{message}")
                .init(),
            total: meter
                .u64_counter("mediator.messages.total")
                .with_description("Total number of handled messages")
                .with_unit("{message}")
                .init(),
            failed: meter
                .u64_counter("mediator.messages.failed")
                .with_description("Number of messages whose handling failed")
                .with_unit("{message}")
                .init(),
            duration: meter
                .f64_histogram("mediator.messages.duration")
                .with_description("Message handling duration")
                .with_unit("s")
                .init(),
        }
    }

    /// Meter named and versioned after `options`, taken from `provider`.
    pub fn from_provider<P>(provider: &P, options: &TelemetryOptions) -> Self
    where
        P: MeterProvider + ?Sized,
    {
        let meter = provider.versioned_meter(
            options.instrumentation_name(),
            options.instrumentation_version(),
            None,
            None,
        );
        Self::new(&meter)
    }

    /// Meter from the process-wide provider installed with
    /// [`global::set_meter_provider`].
    pub fn global(options: &TelemetryOptions) -> Self {
        Self::from_provider(&*global::meter_provider(), options)
    }

    fn active_attributes(message_type: &MessageType) -> [KeyValue; 2] {
        [
            KeyValue::new(MESSAGING_SYSTEM, SYSTEM_MEDIATOR),
            KeyValue::new(MESSAGING_MESSAGE_TYPE, message_type.name()),
        ]
    }
}

impl DispatchMeter for OtelDispatchMeter {
    fn started(&self, message_type: &MessageType) {
        self.active.add(1, &Self::active_attributes(message_type));
    }

    fn ended(&self, message_type: &MessageType) {
        self.active.add(-1, &Self::active_attributes(message_type));
    }

    fn record(&self, tags: &TagSet, elapsed: Duration, outcome: DispatchOutcome) {
        let attrs = tags.as_slice();
        self.total.add(1, attrs);
        if outcome.is_failure() {
            self.failed.add(1, attrs);
        }
        self.duration.record(elapsed.as_secs_f64(), attrs);
    }
}

/// Build the process meter provider and install it globally.
///
/// Exports over OTLP/gRPC every 10 seconds when `otel_endpoint` is set;
/// otherwise metrics are recorded against a manual reader and never exported.
pub fn init_meter_provider(otel_endpoint: Option<&str>) -> SdkMeterProvider {
    let provider = match otel_endpoint {
        Some(endpoint) => {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                    provider
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to create OTLP metrics exporter, metrics will not be exported"
                    );
                    manual_provider()
                }
            }
        }
        None => manual_provider(),
    };

    global::set_meter_provider(provider.clone());
    provider
}

/// Provider whose metrics are recorded but only read on demand.
pub fn manual_provider() -> SdkMeterProvider {
    let reader = ManualReader::builder().build();
    SdkMeterProvider::builder().with_reader(reader).build()
}
