//! Instrumentation options.
//!
//! Built once at startup with [`TelemetryOptions::builder`] and shared
//! read-only (behind an `Arc`) by every dispatch afterwards. The built value
//! has no setters.

use mediator_core::{DispatchResult, MessageType};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::enrich::{
    EnrichDispatch, EnrichResponse, FnEnrichDispatch, FnEnrichResponse, FnFilter, MessageFilter,
    NameFilter,
};
use crate::error::ConfigError;
use crate::span::ActiveSpan;
use crate::tags::TagSet;

/// Default tracing source name.
pub const DEFAULT_INSTRUMENTATION_NAME: &str = "Mediator";
/// Default tracing source version.
pub const DEFAULT_INSTRUMENTATION_VERSION: &str = "1.0.0";

/// Settings for [`TelemetryBehavior`](crate::TelemetryBehavior).
#[derive(Clone)]
pub struct TelemetryOptions {
    instrumentation_name: &'static str,
    instrumentation_version: Option<&'static str>,
    filter: Option<Arc<dyn MessageFilter>>,
    enricher: Option<Arc<dyn EnrichDispatch>>,
    response_enricher: Option<Arc<dyn EnrichResponse>>,
    record_response: bool,
    record_metrics: bool,
}

impl TelemetryOptions {
    pub fn builder() -> TelemetryOptionsBuilder {
        TelemetryOptionsBuilder::default()
    }

    /// Name of the tracing source and meter.
    pub fn instrumentation_name(&self) -> &'static str {
        self.instrumentation_name
    }

    pub fn instrumentation_version(&self) -> Option<&'static str> {
        self.instrumentation_version
    }

    /// Whether `message_type` skips instrumentation.
    pub fn should_filter(&self, message_type: &MessageType) -> bool {
        self.filter
            .as_ref()
            .is_some_and(|filter| filter.should_filter(message_type))
    }

    pub fn enricher(&self) -> Option<&dyn EnrichDispatch> {
        self.enricher.as_deref()
    }

    pub fn response_enricher(&self) -> Option<&dyn EnrichResponse> {
        self.response_enricher.as_deref()
    }

    /// Whether responses are passed to the response enricher.
    pub fn record_response(&self) -> bool {
        self.record_response
    }

    /// Whether dispatch metrics are recorded.
    pub fn record_metrics(&self) -> bool {
        self.record_metrics
    }
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            instrumentation_name: DEFAULT_INSTRUMENTATION_NAME,
            instrumentation_version: Some(DEFAULT_INSTRUMENTATION_VERSION),
            filter: None,
            enricher: None,
            response_enricher: None,
            record_response: false,
            record_metrics: true,
        }
    }
}

impl fmt::Debug for TelemetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryOptions")
            .field("instrumentation_name", &self.instrumentation_name)
            .field("instrumentation_version", &self.instrumentation_version)
            .field("filter", &self.filter.is_some())
            .field("enricher", &self.enricher.is_some())
            .field("response_enricher", &self.response_enricher.is_some())
            .field("record_response", &self.record_response)
            .field("record_metrics", &self.record_metrics)
            .finish()
    }
}

/// Builder for [`TelemetryOptions`].
pub struct TelemetryOptionsBuilder {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
    options: TelemetryOptions,
}

impl Default for TelemetryOptionsBuilder {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed(DEFAULT_INSTRUMENTATION_NAME),
            version: Some(Cow::Borrowed(DEFAULT_INSTRUMENTATION_VERSION)),
            options: TelemetryOptions::default(),
        }
    }
}

impl TelemetryOptionsBuilder {
    /// Tracing source name. Must not be blank.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Publish the tracing source without a version.
    #[must_use]
    pub fn no_version(mut self) -> Self {
        self.version = None;
        self
    }

    /// Skip instrumentation for message types matching `filter`.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&MessageType) -> bool + Send + Sync + 'static,
    {
        self.options.filter = Some(Arc::new(FnFilter(filter)));
        self
    }

    /// Skip instrumentation for message types with these short names.
    #[must_use]
    pub fn filter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.filter = Some(Arc::new(NameFilter::new(names)));
        self
    }

    #[must_use]
    pub fn filter_with(mut self, filter: impl MessageFilter + 'static) -> Self {
        self.options.filter = Some(Arc::new(filter));
        self
    }

    /// Run `enrich` before each instrumented downstream call.
    #[must_use]
    pub fn enrich<F>(mut self, enrich: F) -> Self
    where
        F: Fn(&mut ActiveSpan, &dyn Any, &mut TagSet) -> DispatchResult<()> + Send + Sync + 'static,
    {
        self.options.enricher = Some(Arc::new(FnEnrichDispatch(enrich)));
        self
    }

    #[must_use]
    pub fn enrich_with(mut self, enricher: impl EnrichDispatch + 'static) -> Self {
        self.options.enricher = Some(Arc::new(enricher));
        self
    }

    /// Run `enrich` with each successful response when response recording is on.
    #[must_use]
    pub fn enrich_response<F>(mut self, enrich: F) -> Self
    where
        F: Fn(&mut ActiveSpan, &dyn Any) -> DispatchResult<()> + Send + Sync + 'static,
    {
        self.options.response_enricher = Some(Arc::new(FnEnrichResponse(enrich)));
        self
    }

    #[must_use]
    pub fn enrich_response_with(mut self, enricher: impl EnrichResponse + 'static) -> Self {
        self.options.response_enricher = Some(Arc::new(enricher));
        self
    }

    #[must_use]
    pub fn record_response(mut self, enabled: bool) -> Self {
        self.options.record_response = enabled;
        self
    }

    #[must_use]
    pub fn record_metrics(mut self, enabled: bool) -> Self {
        self.options.record_metrics = enabled;
        self
    }

    /// Validate and freeze the options.
    ///
    /// Runtime-supplied names are leaked here: OpenTelemetry meters are keyed
    /// by `&'static str`, and options are built once per process.
    pub fn build(self) -> Result<TelemetryOptions, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyInstrumentationName);
        }
        if self.version.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ConfigError::EmptyInstrumentationVersion);
        }
        Ok(TelemetryOptions {
            instrumentation_name: into_static(self.name),
            instrumentation_version: self.version.map(into_static),
            ..self.options
        })
    }
}

fn into_static(value: Cow<'static, str>) -> &'static str {
    match value {
        Cow::Borrowed(value) => value,
        Cow::Owned(value) => Box::leak(value.into_boxed_str()),
    }
}
