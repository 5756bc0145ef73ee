//! Logger provider and the process-wide `tracing` subscriber.
//!
//! Installing the subscriber wires three outputs together:
//! - a `fmt` layer for local output (JSON, or pretty when console debug is on),
//! - a [`tracing_opentelemetry`] layer turning `tracing` spans into OTel spans,
//! - the `opentelemetry-appender-tracing` bridge turning `tracing` events into
//!   OTel log records.
//!
//! `RUST_LOG` takes precedence over the configured level.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use common::ObservabilityError;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{logs::SdkLoggerProvider, trace::SdkTracerProvider};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::{resource::service_resource, ProviderCell};
use crate::config::ObservabilityConfig;

/// Targets never forwarded to the log bridge. Exporting these would feed the
/// exporter's own diagnostics back into itself.
const BRIDGE_DENYLIST: &str = "hyper=off,h2=off,tonic=off,tower=off,reqwest=off,opentelemetry=off";

/// Builds the [`SdkLoggerProvider`] and installs the `tracing` subscriber.
pub struct LoggingInitializer {
    config: Arc<ObservabilityConfig>,
    cell: ProviderCell<SdkLoggerProvider>,
    subscriber_installed: AtomicBool,
}

impl LoggingInitializer {
    pub fn new(config: Arc<ObservabilityConfig>, seed: Option<SdkLoggerProvider>) -> Self {
        Self {
            config,
            cell: ProviderCell::new(seed),
            subscriber_installed: AtomicBool::new(false),
        }
    }

    /// Build the provider on first call and install the subscriber.
    ///
    /// The subscriber's span layer exports through `tracer_provider`.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::Exporter`] if the OTLP log exporter
    /// cannot be built.
    pub fn initialize(
        &self,
        tracer_provider: &SdkTracerProvider,
    ) -> Result<SdkLoggerProvider, ObservabilityError> {
        self.cell.get_or_try_init(
            || build_logger_provider(&self.config),
            |provider| {
                let installed = install_subscriber(&self.config, provider, tracer_provider);
                self.subscriber_installed.store(installed, Ordering::Release);
                if !installed {
                    debug!("tracing subscriber already installed; keeping the existing one");
                }
            },
        )
    }

    pub fn provider(&self) -> Option<SdkLoggerProvider> {
        self.cell.get()
    }

    /// Whether this initialiser owns the process-wide subscriber.
    pub fn owns_subscriber(&self) -> bool {
        self.subscriber_installed.load(Ordering::Acquire)
    }
}

/// Build a logger provider with the exporters `config` asks for.
///
/// # Errors
///
/// Returns [`ObservabilityError::Exporter`] if the OTLP exporter cannot be built.
pub fn build_logger_provider(
    config: &ObservabilityConfig,
) -> Result<SdkLoggerProvider, ObservabilityError> {
    let mut builder = SdkLoggerProvider::builder().with_resource(service_resource(config));

    if let Some(endpoint) = config.export_endpoint().filter(|_| config.is_otlp_enabled()) {
        let exporter = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| {
                ObservabilityError::Exporter(format!("failed to build OTLP log exporter: {e}"))
            })?;
        builder = builder.with_batch_exporter(exporter);
    }
    if config.is_console_enabled() {
        builder = builder.with_simple_exporter(opentelemetry_stdout::LogExporter::default());
    }

    Ok(builder.build())
}

/// Install the global subscriber. Returns `false` if one was already set.
fn install_subscriber(
    config: &ObservabilityConfig,
    logger_provider: &SdkLoggerProvider,
    tracer_provider: &SdkTracerProvider,
) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let console = config.enable_console_debug;
    let json_layer = (!console).then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let pretty_layer = console.then(|| tracing_subscriber::fmt::layer().pretty());

    let tracer = tracer_provider.tracer(config.app_name.clone());
    let span_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let bridge = OpenTelemetryTracingBridge::new(logger_provider)
        .with_filter(EnvFilter::new(format!("trace,{BRIDGE_DENYLIST}")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(span_layer)
        .with(bridge)
        .try_init()
        .is_ok()
}
