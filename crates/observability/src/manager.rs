//! The [`ObservabilityManager`]: one owner for the three signal providers
//! and the loggers, meters and tracers handed out from them.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;
use common::ObservabilityError;
use opentelemetry::{
    logs::LoggerProvider as _,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as _,
    InstrumentationScope,
};
use opentelemetry_sdk::trace::SdkTracer;
use tracing::{info, warn};

use crate::{
    config::ObservabilityConfig,
    logger::Logger,
    providers::{LoggingInitializer, MetricsInitializer, Providers, TracingInitializer},
};

/// Version recorded on meters and tracers when the caller has none.
pub const DEFAULT_INSTRUMENTATION_VERSION: &str = "1.0.0";

/// Copy-on-write map of handles keyed by scope.
///
/// Lookups are lock-free; inserts clone the map. Handles are created rarely
/// and read on every call site, so the trade suits this use.
struct InstrumentCache<T> {
    entries: ArcSwap<HashMap<String, T>>,
}

impl<T: Clone> InstrumentCache<T> {
    fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Return the handle under `key`, creating it with `make` if missing.
    ///
    /// When two callers race, both get the handle that landed in the map.
    fn get_or_insert_with(&self, key: &str, make: impl FnOnce() -> T) -> T {
        if let Some(existing) = self.entries.load().get(key) {
            return existing.clone();
        }
        let fresh = make();
        let mut stored = None;
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            let entry = next
                .entry(key.to_owned())
                .or_insert_with(|| fresh.clone())
                .clone();
            stored = Some(entry);
            next
        });
        stored.unwrap_or(fresh)
    }

    fn clear(&self) {
        self.entries.store(Arc::new(HashMap::new()));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.load().len()
    }
}

/// Owns the tracer, meter and logger providers for one service component.
///
/// Providers are built lazily: asking for a logger initialises logging (and
/// tracing, which the log pipeline correlates with), asking for a meter
/// initialises metrics, and so on. [`initialize_all`](Self::initialize_all)
/// does all three up front.
pub struct ObservabilityManager {
    config: Arc<ObservabilityConfig>,
    tracing: TracingInitializer,
    metrics: MetricsInitializer,
    logging: LoggingInitializer,
    loggers: InstrumentCache<Logger>,
    meters: InstrumentCache<Meter>,
    tracers: InstrumentCache<SdkTracer>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for ObservabilityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservabilityManager")
            .field("config", &self.config)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ObservabilityManager {
    pub fn new(config: ObservabilityConfig) -> Self {
        Self::with_providers(config, Providers::default())
    }

    /// Build a manager from `OTEL_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::InvalidConfig`] if the environment does
    /// not describe a valid configuration.
    pub fn from_env() -> Result<Self, ObservabilityError> {
        ObservabilityConfig::from_env().map(Self::new)
    }

    /// Build a manager that adopts the given providers instead of building
    /// its own. Providers left as `None` are built from `config`.
    pub fn with_providers(config: ObservabilityConfig, providers: Providers) -> Self {
        let config = Arc::new(config);
        Self {
            tracing: TracingInitializer::new(config.clone(), providers.tracer),
            metrics: MetricsInitializer::new(config.clone(), providers.meter),
            logging: LoggingInitializer::new(config.clone(), providers.logger),
            config,
            loggers: InstrumentCache::new(),
            meters: InstrumentCache::new(),
            tracers: InstrumentCache::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ObservabilityConfig {
        &self.config
    }

    /// Initialise tracing, metrics and logging, in that order.
    ///
    /// # Errors
    ///
    /// Returns the first initialisation failure, or
    /// [`ObservabilityError::AlreadyShutdown`].
    pub fn initialize_all(&self) -> Result<(), ObservabilityError> {
        self.ensure_running()?;
        let tracer_provider = self.tracing.initialize()?;
        self.metrics.initialize()?;
        self.logging.initialize(&tracer_provider)?;
        info!(
            service = %self.config.app_name,
            component = %self.config.component,
            otlp = self.config.is_otlp_enabled(),
            endpoint = self.config.export_endpoint().as_deref().unwrap_or("-"),
            "observability initialised"
        );
        Ok(())
    }

    /// Logger named `name`, cached by name.
    ///
    /// # Errors
    ///
    /// Fails if logging cannot be initialised or the manager is shut down.
    pub fn get_logger(&self, name: &str) -> Result<Logger, ObservabilityError> {
        self.ensure_running()?;
        let tracer_provider = self.tracing.initialize()?;
        let provider = self.logging.initialize(&tracer_provider)?;
        Ok(self.loggers.get_or_insert_with(name, || {
            Logger::new(name, self.config.log_level, provider.logger(name.to_owned()))
        }))
    }

    /// Meter for `name` at `version`, cached by both.
    ///
    /// # Errors
    ///
    /// Fails if metrics cannot be initialised or the manager is shut down.
    pub fn get_meter(&self, name: &str, version: &str) -> Result<Meter, ObservabilityError> {
        self.ensure_running()?;
        let provider = self.metrics.initialize()?;
        Ok(self.meters.get_or_insert_with(&scope_key(name, version), || {
            provider.meter_with_scope(scope(name, version))
        }))
    }

    /// Tracer for `name` at `version`, cached by both.
    ///
    /// # Errors
    ///
    /// Fails if tracing cannot be initialised or the manager is shut down.
    pub fn get_tracer(&self, name: &str, version: &str) -> Result<SdkTracer, ObservabilityError> {
        self.ensure_running()?;
        let provider = self.tracing.initialize()?;
        Ok(self.tracers.get_or_insert_with(&scope_key(name, version), || {
            provider.tracer_with_scope(scope(name, version))
        }))
    }

    /// Monotonic `u64` counter on `meter`.
    pub fn create_counter(
        &self,
        meter: &Meter,
        name: &str,
        unit: &str,
        description: &str,
    ) -> Counter<u64> {
        meter
            .u64_counter(name.to_owned())
            .with_unit(unit.to_owned())
            .with_description(description.to_owned())
            .build()
    }

    /// `f64` histogram on `meter`.
    pub fn create_histogram(
        &self,
        meter: &Meter,
        name: &str,
        unit: &str,
        description: &str,
    ) -> Histogram<f64> {
        meter
            .f64_histogram(name.to_owned())
            .with_unit(unit.to_owned())
            .with_description(description.to_owned())
            .build()
    }

    pub fn is_otlp_enabled(&self) -> bool {
        self.config.is_otlp_enabled()
    }

    /// Flush every provider that has been initialised.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::Flush`] listing every provider that
    /// failed; the remaining providers are still flushed.
    pub fn force_flush(&self) -> Result<(), ObservabilityError> {
        let mut failures = Vec::new();
        if let Some(provider) = self.tracing.provider() {
            if let Err(e) = provider.force_flush() {
                failures.push(format!("traces: {e}"));
            }
        }
        if let Some(provider) = self.metrics.provider() {
            if let Err(e) = provider.force_flush() {
                failures.push(format!("metrics: {e}"));
            }
        }
        if let Some(provider) = self.logging.provider() {
            if let Err(e) = provider.force_flush() {
                failures.push(format!("logs: {e}"));
            }
        }
        into_result(failures, ObservabilityError::Flush)
    }

    /// Shut down the tracer, meter and logger providers, then drop every
    /// cached handle. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::Shutdown`] listing every provider that
    /// failed; the remaining providers are still shut down.
    pub fn shutdown(&self) -> Result<(), ObservabilityError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut failures = Vec::new();
        if let Some(provider) = self.tracing.provider() {
            if let Err(e) = provider.shutdown() {
                failures.push(format!("traces: {e}"));
            }
        }
        if let Some(provider) = self.metrics.provider() {
            if let Err(e) = provider.shutdown() {
                failures.push(format!("metrics: {e}"));
            }
        }
        if let Some(provider) = self.logging.provider() {
            if let Err(e) = provider.shutdown() {
                failures.push(format!("logs: {e}"));
            }
        }
        self.loggers.clear();
        self.meters.clear();
        self.tracers.clear();

        if !failures.is_empty() {
            warn!(?failures, "observability shutdown incomplete");
        }
        into_result(failures, ObservabilityError::Shutdown)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Number of cached loggers, meters and tracers.
    #[cfg(test)]
    pub(crate) fn cache_sizes(&self) -> (usize, usize, usize) {
        (self.loggers.len(), self.meters.len(), self.tracers.len())
    }

    fn ensure_running(&self) -> Result<(), ObservabilityError> {
        if self.is_shut_down() {
            return Err(ObservabilityError::AlreadyShutdown);
        }
        Ok(())
    }
}

fn scope_key(name: &str, version: &str) -> String {
    format!("{name}:{version}")
}

fn scope(name: &str, version: &str) -> InstrumentationScope {
    InstrumentationScope::builder(name.to_owned())
        .with_version(version.to_owned())
        .build()
}

fn into_result(
    failures: Vec<String>,
    wrap: fn(String) -> ObservabilityError,
) -> Result<(), ObservabilityError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(wrap(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::{
        logs::{InMemoryLogExporter, SdkLoggerProvider},
        metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider},
        trace::{InMemorySpanExporter, SdkTracerProvider},
    };

    fn config() -> ObservabilityConfig {
        ObservabilityConfig::new("test-service", "test-component")
    }

    fn in_memory_manager() -> (ObservabilityManager, InMemorySpanExporter, InMemoryLogExporter) {
        let spans = InMemorySpanExporter::default();
        let logs = InMemoryLogExporter::default();
        let providers = Providers {
            tracer: Some(
                SdkTracerProvider::builder()
                    .with_simple_exporter(spans.clone())
                    .build(),
            ),
            meter: Some(
                SdkMeterProvider::builder()
                    .with_reader(PeriodicReader::builder(InMemoryMetricExporter::default()).build())
                    .build(),
            ),
            logger: Some(
                SdkLoggerProvider::builder()
                    .with_simple_exporter(logs.clone())
                    .build(),
            ),
        };
        (ObservabilityManager::with_providers(config(), providers), spans, logs)
    }

    #[test]
    fn loggers_are_cached_by_name() {
        let manager = ObservabilityManager::new(config());
        let a = manager.get_logger("test.module").unwrap();
        let b = manager.get_logger("test.module").unwrap();
        let other = manager.get_logger("other.module").unwrap();

        assert_eq!(a.name(), b.name());
        assert_eq!(other.name(), "other.module");
        assert_eq!(manager.cache_sizes().0, 2);
    }

    #[test]
    fn meters_are_cached_by_name_and_version() {
        let manager = ObservabilityManager::new(config());
        manager.get_meter("test.meter", DEFAULT_INSTRUMENTATION_VERSION).unwrap();
        manager.get_meter("test.meter", DEFAULT_INSTRUMENTATION_VERSION).unwrap();
        manager.get_meter("test.meter", "2.0.0").unwrap();

        assert_eq!(manager.cache_sizes().1, 2);
    }

    #[test]
    fn tracers_are_cached_by_name_and_version() {
        let manager = ObservabilityManager::new(config());
        manager.get_tracer("test.tracer", "1.0.0").unwrap();
        manager.get_tracer("test.tracer", "1.0.0").unwrap();
        manager.get_tracer("test.tracer", "2.0.0").unwrap();

        assert_eq!(manager.cache_sizes().2, 2);
    }

    #[test]
    fn counter_and_histogram_accept_measurements() {
        let manager = ObservabilityManager::new(config());
        let meter = manager.get_meter("test.meter", "1.0.0").unwrap();

        let counter = manager.create_counter(&meter, "test_counter", "1", "Test counter");
        counter.add(1, &[]);
        let histogram = manager.create_histogram(&meter, "test_histogram", "s", "");
        histogram.record(0.5, &[]);
    }

    #[test]
    fn otlp_follows_endpoint_and_exporter_type() {
        assert!(!ObservabilityManager::new(config()).is_otlp_enabled());
        assert!(
            ObservabilityManager::new(config().with_endpoint("localhost:4317")).is_otlp_enabled()
        );
        assert!(!ObservabilityManager::new(
            config()
                .with_endpoint("localhost:4317")
                .with_exporter_type(crate::config::ExporterType::None)
        )
        .is_otlp_enabled());
    }

    #[test]
    fn tracer_exports_through_adopted_provider() {
        let (manager, spans, _logs) = in_memory_manager();
        manager.initialize_all().unwrap();
        let tracer = manager.get_tracer("test.tracer", "1.0.0").unwrap();
        tracer.in_span("test_operation", |_| {});

        let finished = spans.get_finished_spans().unwrap();
        let span = finished.iter().find(|s| s.name == "test_operation").unwrap();
        assert_eq!(span.instrumentation_scope.name(), "test.tracer");
        assert_eq!(span.instrumentation_scope.version(), Some("1.0.0"));
    }

    #[test]
    fn shutdown_clears_caches_and_is_idempotent() {
        let (manager, _spans, _logs) = in_memory_manager();
        manager.get_logger("test.logger").unwrap();
        manager.get_meter("test.meter", "1.0.0").unwrap();
        manager.get_tracer("test.tracer", "1.0.0").unwrap();
        assert_eq!(manager.cache_sizes(), (1, 1, 1));

        manager.force_flush().unwrap();
        manager.shutdown().unwrap();
        assert_eq!(manager.cache_sizes(), (0, 0, 0));
        assert!(manager.shutdown().is_ok());
    }

    #[test]
    fn accessors_fail_after_shutdown() {
        let manager = ObservabilityManager::new(config());
        manager.shutdown().ok();

        assert!(manager.is_shut_down());
        assert!(matches!(
            manager.get_logger("late"),
            Err(ObservabilityError::AlreadyShutdown)
        ));
        assert!(matches!(
            manager.get_tracer("late", "1.0.0"),
            Err(ObservabilityError::AlreadyShutdown)
        ));
        assert!(matches!(
            manager.initialize_all(),
            Err(ObservabilityError::AlreadyShutdown)
        ));
    }

    #[test]
    fn shutdown_before_any_use_touches_nothing() {
        let manager = ObservabilityManager::new(config());
        assert!(manager.shutdown().is_ok());
        assert!(manager.force_flush().is_ok());
    }

    #[test]
    fn cache_keeps_first_inserted_handle() {
        let cache = InstrumentCache::new();
        assert_eq!(cache.get_or_insert_with("k", || 1), 1);
        assert_eq!(cache.get_or_insert_with("k", || 2), 1);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
