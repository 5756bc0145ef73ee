//! Named logger handles that emit OpenTelemetry log records directly.
//!
//! Unlike `tracing` macros, a [`Logger`] accepts structured fields whose keys
//! are only known at runtime, which is what callers passing ad-hoc `extra`
//! maps need. Records inherit the trace context of the active span.

use std::{error::Error, sync::Arc, time::SystemTime};

use opentelemetry::{
    logs::{AnyValue, LogRecord as _, Logger as _},
    KeyValue, Value,
};
use opentelemetry_sdk::logs::SdkLogger;
use opentelemetry_semantic_conventions::attribute::{EXCEPTION_MESSAGE, EXCEPTION_TYPE};

use crate::config::LogLevel;

/// Attribute carrying the logger's name on every record.
pub const LOGGER_NAME_KEY: &str = "logger.name";

/// Attribute listing the `source()` chain of a logged error, outermost first.
pub const EXCEPTION_CAUSES_KEY: &str = "exception.causes";

/// Cheaply cloneable handle for emitting log records under one name.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    min_level: LogLevel,
    inner: Arc<SdkLogger>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub(crate) fn new(name: &str, min_level: LogLevel, inner: SdkLogger) -> Self {
        Self {
            name: Arc::from(name),
            min_level,
            inner: Arc::new(inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether records at `level` pass this logger's threshold.
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message, &[]);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, &[]);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message, &[]);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, &[]);
    }

    pub fn debug_with(&self, message: impl Into<String>, fields: &[KeyValue]) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info_with(&self, message: impl Into<String>, fields: &[KeyValue]) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warn_with(&self, message: impl Into<String>, fields: &[KeyValue]) {
        self.log(LogLevel::Warn, message, fields);
    }

    pub fn error_with(&self, message: impl Into<String>, fields: &[KeyValue]) {
        self.log(LogLevel::Error, message, fields);
    }

    /// Emit one record with `fields` attached as attributes.
    ///
    /// Records below the threshold are dropped before reaching the SDK.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, fields: &[KeyValue]) {
        if !self.is_enabled(level) {
            return;
        }
        let mut record = self.inner.create_log_record();
        let now = SystemTime::now();
        record.set_timestamp(now);
        record.set_observed_timestamp(now);
        record.set_severity_number(level.severity());
        record.set_severity_text(severity_text(level));
        record.set_target(self.name.to_string());
        record.set_body(AnyValue::from(message.into()));
        record.add_attribute(LOGGER_NAME_KEY, self.name.to_string());
        for field in fields {
            record.add_attribute(field.key.clone(), to_any_value(&field.value));
        }
        self.inner.emit(record);
    }

    /// Emit an ERROR record describing `error`.
    ///
    /// The record carries `exception.type`, `exception.message`, and the
    /// error's `source()` chain.
    pub fn exception<E>(&self, message: impl Into<String>, error: &E)
    where
        E: Error + ?Sized,
    {
        let mut fields = vec![
            KeyValue::new(EXCEPTION_TYPE, std::any::type_name::<E>()),
            KeyValue::new(EXCEPTION_MESSAGE, error.to_string()),
        ];
        let causes: Vec<String> = std::iter::successors(error.source(), |&e| e.source())
            .map(ToString::to_string)
            .collect();
        if !causes.is_empty() {
            fields.push(KeyValue::new(EXCEPTION_CAUSES_KEY, causes.join(": ")));
        }
        self.log(LogLevel::Error, message, &fields);
    }
}

fn severity_text(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "TRACE",
        LogLevel::Debug => "DEBUG",
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn to_any_value(value: &Value) -> AnyValue {
    match value {
        Value::Bool(b) => AnyValue::Boolean(*b),
        Value::I64(i) => AnyValue::Int(*i),
        Value::F64(f) => AnyValue::Double(*f),
        Value::String(s) => AnyValue::String(s.clone()),
        other => AnyValue::String(other.to_string().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::logs::{LoggerProvider as _, Severity};
    use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLoggerProvider};

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    #[derive(Debug, thiserror::Error)]
    #[error("export failed")]
    struct ExportFailed(#[source] Refused);

    fn logger(level: LogLevel) -> (Logger, InMemoryLogExporter) {
        let exporter = InMemoryLogExporter::default();
        let provider = SdkLoggerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let logger = Logger::new("test.module", level, provider.logger("test.module"));
        (logger, exporter)
    }

    fn attribute<'a>(
        record: &'a opentelemetry_sdk::logs::SdkLogRecord,
        key: &str,
    ) -> Option<&'a AnyValue> {
        record
            .attributes_iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    #[test]
    fn drops_records_below_threshold() {
        let (logger, exporter) = logger(LogLevel::Info);
        logger.debug("hidden");
        logger.info("shown");
        logger.warn("shown");
        logger.error("shown");

        let logs = exporter.get_emitted_logs().unwrap();
        assert_eq!(logs.len(), 3);
        assert!(!logger.is_enabled(LogLevel::Debug));
    }

    #[test]
    fn structured_fields_become_attributes() {
        let (logger, exporter) = logger(LogLevel::Debug);
        logger.info_with(
            "Structured log test",
            &[
                KeyValue::new("user_id", "test-user-123"),
                KeyValue::new("duration_ms", 150_i64),
            ],
        );

        let logs = exporter.get_emitted_logs().unwrap();
        let record = &logs[0].record;
        assert_eq!(
            record.body(),
            Some(&AnyValue::from("Structured log test".to_string()))
        );
        assert!(matches!(record.severity_number(), Some(Severity::Info)));
        assert_eq!(attribute(record, "duration_ms"), Some(&AnyValue::Int(150)));
        assert_eq!(
            attribute(record, LOGGER_NAME_KEY),
            Some(&AnyValue::from("test.module".to_string()))
        );
    }

    #[test]
    fn exception_records_error_details_and_causes() {
        let (logger, exporter) = logger(LogLevel::Info);
        logger.exception("Test error occurred", &ExportFailed(Refused));

        let logs = exporter.get_emitted_logs().unwrap();
        let record = &logs[0].record;
        assert!(matches!(record.severity_number(), Some(Severity::Error)));
        assert_eq!(
            attribute(record, EXCEPTION_MESSAGE),
            Some(&AnyValue::from("export failed".to_string()))
        );
        assert_eq!(
            attribute(record, EXCEPTION_CAUSES_KEY),
            Some(&AnyValue::from("connection refused".to_string()))
        );
    }

    #[test]
    fn debug_output_names_the_logger() {
        let (logger, _exporter) = logger(LogLevel::Info);
        assert!(format!("{logger:?}").contains("test.module"));
        assert_eq!(logger.name(), "test.module");
    }

    #[test]
    fn records_inside_a_span_carry_its_trace_context() {
        use opentelemetry::trace::{TraceContextExt as _, Tracer as _, TracerProvider as _};
        use opentelemetry_sdk::trace::SdkTracerProvider;

        let (logger, exporter) = logger(LogLevel::Info);
        let tracer = SdkTracerProvider::builder().build().tracer("test.module");
        let span_context = tracer.in_span("work", |cx| {
            logger.info("inside");
            cx.span().span_context().clone()
        });
        logger.clone().info("outside");

        let logs = exporter.get_emitted_logs().unwrap();
        assert_eq!(logs.len(), 2);
        let inside = logs[0].record.trace_context().unwrap();
        assert_eq!(inside.trace_id, span_context.trace_id());
        assert_eq!(inside.span_id, span_context.span_id());
        assert!(logs[1].record.trace_context().is_none());
    }
}
