//! Installing instrumentation on a mediator.
//!
//! ```ignore
//! let instrumentation =
//!     Instrumentation::from_providers(options, &tracer_provider, &meter_provider);
//! let mediator = Mediator::builder()
//!     .with_telemetry(&instrumentation)
//!     .handler(handler_fn(|q: GetQuote, _cancel| async move { Ok(quote(q)) }))
//!     .build();
//! ```
//!
//! The telemetry layer wraps every pipeline registered after it, in front of
//! the pipeline's own behaviors.

use mediator_core::{Layer, MediatorBuilder, Stack};
use opentelemetry::metrics::MeterProvider;
use opentelemetry::trace::{Tracer, TracerProvider};
use std::sync::Arc;

use crate::behavior::TelemetryBehavior;
use crate::error::ConfigError;
use crate::meter::DispatchMeter;
use crate::observability::metrics::OtelDispatchMeter;
use crate::observability::spans::OtelSpanFactory;
use crate::options::{TelemetryOptions, TelemetryOptionsBuilder};
use crate::span::SpanFactory;

/// A configured [`TelemetryBehavior`] ready to be installed.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    behavior: TelemetryBehavior,
}

impl Instrumentation {
    /// Instrumentation over explicit span and metric capabilities.
    pub fn new(
        options: TelemetryOptions,
        spans: Arc<dyn SpanFactory>,
        meter: Option<Arc<dyn DispatchMeter>>,
    ) -> Self {
        let mut behavior = TelemetryBehavior::new(Arc::new(options), spans);
        if let Some(meter) = meter {
            behavior = behavior.with_meter(meter);
        }
        Self { behavior }
    }

    /// Tracer and meter named after `options`, taken from explicit providers.
    ///
    /// No meter is created when `record_metrics` is off.
    pub fn from_providers<T, P>(
        options: TelemetryOptions,
        tracer_provider: &T,
        meter_provider: &P,
    ) -> Self
    where
        T: TracerProvider,
        T::Tracer: Send + Sync + 'static,
        <T::Tracer as Tracer>::Span: Send + Sync + 'static,
        P: MeterProvider + ?Sized,
    {
        let spans = Arc::new(OtelSpanFactory::from_provider(tracer_provider, &options));
        let meter = options.record_metrics().then(|| {
            Arc::new(OtelDispatchMeter::from_provider(meter_provider, &options))
                as Arc<dyn DispatchMeter>
        });
        Self::new(options, spans, meter)
    }

    /// Tracer and meter from the process-wide OpenTelemetry providers.
    ///
    /// Until providers are installed the global ones are no-ops, so spans are
    /// absent and metrics are dropped.
    pub fn global(options: TelemetryOptions) -> Self {
        let spans = Arc::new(OtelSpanFactory::global(&options));
        let meter = options
            .record_metrics()
            .then(|| Arc::new(OtelDispatchMeter::global(&options)) as Arc<dyn DispatchMeter>);
        Self::new(options, spans, meter)
    }

    pub fn behavior(&self) -> &TelemetryBehavior {
        &self.behavior
    }
}

/// Telemetry registration on [`MediatorBuilder`].
pub trait MediatorTelemetryExt<L>: Sized {
    /// Install `instrumentation` on every pipeline registered afterwards.
    fn with_telemetry(
        self,
        instrumentation: &Instrumentation,
    ) -> MediatorBuilder<Stack<L, TelemetryBehavior>>;

    /// Build options with `configure` and install instrumentation backed by
    /// the global providers.
    fn add_telemetry<F>(
        self,
        configure: F,
    ) -> Result<MediatorBuilder<Stack<L, TelemetryBehavior>>, ConfigError>
    where
        F: FnOnce(TelemetryOptionsBuilder) -> TelemetryOptionsBuilder;
}

impl<L: Layer> MediatorTelemetryExt<L> for MediatorBuilder<L> {
    fn with_telemetry(
        self,
        instrumentation: &Instrumentation,
    ) -> MediatorBuilder<Stack<L, TelemetryBehavior>> {
        tracing::debug!(
            instrumentation = instrumentation.behavior.options().instrumentation_name(),
            metrics = instrumentation.behavior.records_metrics(),
            "Telemetry layer installed"
        );
        self.layer(instrumentation.behavior.clone())
    }

    fn add_telemetry<F>(
        self,
        configure: F,
    ) -> Result<MediatorBuilder<Stack<L, TelemetryBehavior>>, ConfigError>
    where
        F: FnOnce(TelemetryOptionsBuilder) -> TelemetryOptionsBuilder,
    {
        let options = configure(TelemetryOptions::builder()).build()?;
        Ok(self.with_telemetry(&Instrumentation::global(options)))
    }
}
