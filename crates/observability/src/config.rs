//! Configuration loading and validation for the observability wrapper.
//!
//! Values come either from code (builder setters) or from `OTEL_*`
//! environment variables read through the `config` crate.

use std::{fmt, str::FromStr, time::Duration};

use common::ObservabilityError;
use opentelemetry::logs::Severity;
use serde::Deserialize;

/// Prefix shared by every environment variable this crate reads.
pub const ENV_PREFIX: &str = "OTEL";

/// Minimum level a record needs to be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Matching OpenTelemetry log severity.
    pub fn severity(self) -> Severity {
        match self {
            LogLevel::Trace => Severity::Trace,
            LogLevel::Debug => Severity::Debug,
            LogLevel::Info => Severity::Info,
            LogLevel::Warn => Severity::Warn,
            LogLevel::Error => Severity::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ObservabilityError::InvalidConfig(format!(
                "unknown log level {other:?}"
            ))),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ObservabilityError;

    fn try_from(value: String) -> Result<Self, ObservabilityError> {
        value.parse()
    }
}

/// Where telemetry is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ExporterType {
    /// OTLP over gRPC to `otlp_endpoint`.
    #[default]
    Otlp,
    /// Pretty-printed to stdout.
    Console,
    /// Providers are built without exporters.
    None,
}

impl FromStr for ExporterType {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "otlp" => Ok(ExporterType::Otlp),
            "console" | "stdout" => Ok(ExporterType::Console),
            "none" => Ok(ExporterType::None),
            other => Err(ObservabilityError::InvalidConfig(format!(
                "unknown exporter type {other:?}"
            ))),
        }
    }
}

impl TryFrom<String> for ExporterType {
    type Error = ObservabilityError;

    fn try_from(value: String) -> Result<Self, ObservabilityError> {
        value.parse()
    }
}

/// Validated observability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Reported as `service.name` on every signal.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Reported as `service.component` on every signal.
    #[serde(default = "default_component", alias = "component_name")]
    pub component: String,

    /// Collector address, `host:port` or a full URL. OTLP export stays off
    /// while this is unset.
    #[serde(default, alias = "grpc_url")]
    pub otlp_endpoint: Option<String>,

    /// Use plaintext gRPC for a bare `host:port` endpoint.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// Mirror every signal to stdout as well.
    #[serde(default, alias = "console_debug")]
    pub enable_console_debug: bool,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub exporter_type: ExporterType,

    #[serde(default = "default_service_version")]
    pub service_version: String,

    /// How often the periodic metric reader exports.
    #[serde(default = "default_metric_export_interval_ms")]
    pub metric_export_interval_ms: u64,
}

fn default_app_name() -> String {
    "unknown_service".into()
}
fn default_component() -> String {
    "default".into()
}
fn default_insecure() -> bool {
    true
}
fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}
fn default_metric_export_interval_ms() -> u64 {
    5000
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            component: default_component(),
            otlp_endpoint: None,
            insecure: default_insecure(),
            enable_console_debug: false,
            log_level: LogLevel::default(),
            exporter_type: ExporterType::default(),
            service_version: default_service_version(),
            metric_export_interval_ms: default_metric_export_interval_ms(),
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration for `app_name` / `component` with defaults for
    /// everything else.
    pub fn new(app_name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            component: component.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_console_debug(mut self, enabled: bool) -> Self {
        self.enable_console_debug = enabled;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_exporter_type(mut self, exporter_type: ExporterType) -> Self {
        self.exporter_type = exporter_type;
        self
    }

    pub fn with_service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_metric_export_interval(mut self, interval: Duration) -> Self {
        self.metric_export_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Load and validate configuration from `OTEL_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ObservabilityError::InvalidConfig`] if a variable cannot be
    /// parsed or a value fails validation.
    pub fn from_env() -> Result<Self, ObservabilityError> {
        Self::load(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Same as [`from_env`](Self::from_env) but reads from `vars` instead of
    /// the process environment.
    pub fn from_env_map(
        vars: config::Map<String, String>,
    ) -> Result<Self, ObservabilityError> {
        Self::load(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(Some(vars)),
        )
    }

    fn load(source: config::Environment) -> Result<Self, ObservabilityError> {
        let cfg = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| {
                ObservabilityError::InvalidConfig(format!(
                    "failed to build configuration from environment: {e}"
                ))
            })?;

        let c: ObservabilityConfig = cfg.try_deserialize().map_err(|e| {
            ObservabilityError::InvalidConfig(format!("failed to deserialise configuration: {e}"))
        })?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<(), ObservabilityError> {
        ensure_non_empty(&self.app_name, "OTEL_APP_NAME")?;
        ensure_non_empty(&self.component, "OTEL_COMPONENT_NAME")?;

        if let Some(endpoint) = &self.otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_GRPC_URL")?;
            if endpoint.trim().contains(char::is_whitespace) {
                return Err(ObservabilityError::InvalidConfig(format!(
                    "OTEL_GRPC_URL must not contain whitespace: {endpoint:?}"
                )));
            }
        }
        if self.metric_export_interval_ms == 0 {
            return Err(ObservabilityError::InvalidConfig(
                "OTEL_METRIC_EXPORT_INTERVAL_MS must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Whether signals are exported to a collector over OTLP.
    pub fn is_otlp_enabled(&self) -> bool {
        self.exporter_type == ExporterType::Otlp && self.otlp_endpoint.is_some()
    }

    /// Whether signals are mirrored to stdout.
    pub fn is_console_enabled(&self) -> bool {
        self.enable_console_debug || self.exporter_type == ExporterType::Console
    }

    /// Endpoint URL handed to the OTLP exporters.
    ///
    /// A bare `host:port` is given `http://` when `insecure` is set and
    /// `https://` otherwise. An explicit scheme is kept as written.
    pub fn export_endpoint(&self) -> Option<String> {
        let endpoint = self.otlp_endpoint.as_deref()?.trim();
        if endpoint.contains("://") {
            return Some(endpoint.to_owned());
        }
        let scheme = if self.insecure { "http" } else { "https" };
        Some(format!("{scheme}://{endpoint}"))
    }

    pub fn metric_export_interval(&self) -> Duration {
        Duration::from_millis(self.metric_export_interval_ms)
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<(), ObservabilityError> {
    if value.trim().is_empty() {
        return Err(ObservabilityError::InvalidConfig(format!(
            "{name} is required and must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn defaults_are_correct() {
        let cfg = ObservabilityConfig::default();
        assert_eq!(cfg.app_name, "unknown_service");
        assert_eq!(cfg.component, "default");
        assert!(cfg.otlp_endpoint.is_none());
        assert!(cfg.insecure);
        assert!(!cfg.enable_console_debug);
        assert_eq!(cfg.log_level, LogLevel::Info);
        assert_eq!(cfg.exporter_type, ExporterType::Otlp);
        assert_eq!(cfg.metric_export_interval(), Duration::from_secs(5));
    }

    #[test]
    fn from_env_map_reads_documented_variables() {
        let cfg = ObservabilityConfig::from_env_map(vars(&[
            ("OTEL_APP_NAME", "test-service"),
            ("OTEL_COMPONENT_NAME", "test-component"),
            ("OTEL_GRPC_URL", "localhost:4317"),
            ("OTEL_INSECURE", "false"),
            ("OTEL_LOG_LEVEL", "DEBUG"),
            ("OTEL_CONSOLE_DEBUG", "true"),
            ("OTEL_METRIC_EXPORT_INTERVAL_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(cfg.app_name, "test-service");
        assert_eq!(cfg.component, "test-component");
        assert_eq!(cfg.otlp_endpoint.as_deref(), Some("localhost:4317"));
        assert!(!cfg.insecure);
        assert!(cfg.enable_console_debug);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.metric_export_interval_ms, 250);
        assert!(cfg.is_otlp_enabled());
    }

    #[test]
    fn from_env_map_falls_back_to_defaults() {
        let cfg = ObservabilityConfig::from_env_map(vars(&[])).unwrap();
        assert_eq!(cfg.app_name, "unknown_service");
        assert!(!cfg.is_otlp_enabled());
    }

    #[test]
    fn from_env_map_rejects_unknown_log_level() {
        let err = ObservabilityConfig::from_env_map(vars(&[("OTEL_LOG_LEVEL", "loud")]))
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn validate_rejects_empty_app_name() {
        let cfg = ObservabilityConfig::new("  ", "test-component");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_endpoint() {
        let cfg = ObservabilityConfig::new("svc", "cmp").with_endpoint("");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_metric_interval() {
        let cfg = ObservabilityConfig::new("svc", "cmp").with_metric_export_interval(Duration::ZERO);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn otlp_requires_endpoint_and_exporter_type() {
        let base = ObservabilityConfig::new("svc", "cmp");
        assert!(!base.is_otlp_enabled());
        assert!(base.clone().with_endpoint("localhost:4317").is_otlp_enabled());
        assert!(!base
            .with_endpoint("localhost:4317")
            .with_exporter_type(ExporterType::Console)
            .is_otlp_enabled());
    }

    #[test]
    fn export_endpoint_applies_scheme_from_insecure_flag() {
        let insecure = ObservabilityConfig::new("svc", "cmp").with_endpoint("localhost:4317");
        assert_eq!(insecure.export_endpoint().as_deref(), Some("http://localhost:4317"));

        let secure = insecure.clone().with_insecure(false);
        assert_eq!(secure.export_endpoint().as_deref(), Some("https://localhost:4317"));

        let explicit = secure.with_endpoint("http://collector:4317");
        assert_eq!(explicit.export_endpoint().as_deref(), Some("http://collector:4317"));
    }

    #[test]
    fn log_level_parsing() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" Error ".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert!(LogLevel::Debug < LogLevel::Info);
    }

    #[test]
    fn exporter_type_parsing() {
        assert_eq!("OTLP".parse::<ExporterType>().unwrap(), ExporterType::Otlp);
        assert_eq!("stdout".parse::<ExporterType>().unwrap(), ExporterType::Console);
        assert!("zipkin".parse::<ExporterType>().is_err());
    }
}
