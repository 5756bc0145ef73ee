//! Tracer provider: OTLP span export and W3C context propagation.

use std::sync::Arc;

use common::ObservabilityError;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use tracing::debug;

use super::{resource::service_resource, ProviderCell};
use crate::config::ObservabilityConfig;

/// Builds and registers the global [`SdkTracerProvider`].
pub struct TracingInitializer {
    config: Arc<ObservabilityConfig>,
    cell: ProviderCell<SdkTracerProvider>,
}

impl TracingInitializer {
    pub fn new(config: Arc<ObservabilityConfig>, seed: Option<SdkTracerProvider>) -> Self {
        Self {
            config,
            cell: ProviderCell::new(seed),
        }
    }

    /// Build the provider on first call and register it globally.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::Exporter`] if the OTLP span exporter
    /// cannot be built.
    pub fn initialize(&self) -> Result<SdkTracerProvider, ObservabilityError> {
        self.cell.get_or_try_init(
            || build_tracer_provider(&self.config),
            |provider| {
                global::set_tracer_provider(provider.clone());
                global::set_text_map_propagator(TraceContextPropagator::new());
                debug!(otlp = self.config.is_otlp_enabled(), "tracer provider installed");
            },
        )
    }

    /// The provider, if [`initialize`](Self::initialize) has succeeded.
    pub fn provider(&self) -> Option<SdkTracerProvider> {
        self.cell.get()
    }
}

/// Build a tracer provider with the exporters `config` asks for.
///
/// # Errors
///
/// Returns [`ObservabilityError::Exporter`] if the OTLP exporter cannot be built.
pub fn build_tracer_provider(
    config: &ObservabilityConfig,
) -> Result<SdkTracerProvider, ObservabilityError> {
    let mut builder = SdkTracerProvider::builder()
        .with_resource(service_resource(config))
        .with_sampler(Sampler::AlwaysOn);

    if let Some(endpoint) = config.export_endpoint().filter(|_| config.is_otlp_enabled()) {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| {
                ObservabilityError::Exporter(format!("failed to build OTLP span exporter: {e}"))
            })?;
        builder = builder.with_batch_exporter(exporter);
    }
    if config.is_console_enabled() {
        builder = builder.with_simple_exporter(opentelemetry_stdout::SpanExporter::default());
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::trace::InMemorySpanExporter;

    #[test]
    fn builds_without_exporters_when_otlp_disabled() {
        let cfg = ObservabilityConfig::new("svc", "cmp");
        let provider = build_tracer_provider(&cfg).unwrap();
        provider.tracer("noop").in_span("span", |_| {});
        assert!(provider.shutdown().is_ok());
    }

    #[test]
    fn seeded_provider_is_adopted() {
        let exporter = InMemorySpanExporter::default();
        let seeded = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let init = TracingInitializer::new(
            Arc::new(ObservabilityConfig::new("svc", "cmp")),
            Some(seeded),
        );
        assert!(init.provider().is_none());

        let provider = init.initialize().unwrap();
        provider.tracer("seeded").in_span("adopted", |_| {});

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "adopted");
        assert!(init.provider().is_some());
    }
}
