//! Meter provider: periodic OTLP metric export.

use std::sync::Arc;

use common::ObservabilityError;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use tracing::debug;

use super::{resource::service_resource, ProviderCell};
use crate::config::ObservabilityConfig;

/// Builds and registers the global [`SdkMeterProvider`].
pub struct MetricsInitializer {
    config: Arc<ObservabilityConfig>,
    cell: ProviderCell<SdkMeterProvider>,
}

impl MetricsInitializer {
    pub fn new(config: Arc<ObservabilityConfig>, seed: Option<SdkMeterProvider>) -> Self {
        Self {
            config,
            cell: ProviderCell::new(seed),
        }
    }

    /// Build the provider on first call and register it globally.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::Exporter`] if the OTLP metric exporter
    /// cannot be built.
    pub fn initialize(&self) -> Result<SdkMeterProvider, ObservabilityError> {
        self.cell.get_or_try_init(
            || build_meter_provider(&self.config),
            |provider| {
                global::set_meter_provider(provider.clone());
                debug!(
                    interval_ms = self.config.metric_export_interval_ms,
                    "meter provider installed"
                );
            },
        )
    }

    pub fn provider(&self) -> Option<SdkMeterProvider> {
        self.cell.get()
    }
}

/// Build a meter provider with one periodic reader per export target.
///
/// # Errors
///
/// Returns [`ObservabilityError::Exporter`] if the OTLP exporter cannot be built.
pub fn build_meter_provider(
    config: &ObservabilityConfig,
) -> Result<SdkMeterProvider, ObservabilityError> {
    let interval = config.metric_export_interval();
    let mut builder = SdkMeterProvider::builder().with_resource(service_resource(config));

    if let Some(endpoint) = config.export_endpoint().filter(|_| config.is_otlp_enabled()) {
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| {
                ObservabilityError::Exporter(format!("failed to build OTLP metric exporter: {e}"))
            })?;
        builder = builder.with_reader(PeriodicReader::builder(exporter).with_interval(interval).build());
    }
    if config.is_console_enabled() {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        builder = builder.with_reader(PeriodicReader::builder(exporter).with_interval(interval).build());
    }

    Ok(builder.build())
}
