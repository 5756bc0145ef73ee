//! The fixed telemetry sequence sent to the collector.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use opentelemetry::{
    metrics::{Counter, Histogram},
    trace::{FutureExt as _, TraceContextExt as _, Tracer as _},
    Context, KeyValue,
};
use opentelemetry_sdk::trace::SdkTracer;
use otel_observability::{
    logged_async, traced_async, Logger, ObservabilityError, ObservabilityManager,
    DEFAULT_INSTRUMENTATION_VERSION,
};
use serde_json::{json, Map, Value};
use tokio::time::sleep;
use uuid::Uuid;

/// Meter and tracer scope used by the harness.
pub const SCOPE_NAME: &str = "otel-collector-test";

/// Logger name used by the harness.
pub const LOGGER_NAME: &str = module_path!();

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Observability(#[from] ObservabilityError),

    /// Raised on purpose to exercise error logging.
    #[error("{0}")]
    Synthetic(&'static str),
}

/// Drives every signal through one [`ObservabilityManager`].
pub struct CollectorTester {
    manager: Arc<ObservabilityManager>,
    logger: Logger,
    tracer: SdkTracer,
    request_counter: Counter<u64>,
    response_time_histogram: Histogram<f64>,
    flush_wait: Duration,
    run_id: String,
}

impl CollectorTester {
    /// Fetch the harness logger, meter and tracer and create its instruments.
    ///
    /// # Errors
    ///
    /// Fails if the manager cannot initialise a signal.
    pub fn new(
        manager: Arc<ObservabilityManager>,
        flush_wait: Duration,
    ) -> Result<Self, ObservabilityError> {
        let logger = manager.get_logger(LOGGER_NAME)?;
        let meter = manager.get_meter(SCOPE_NAME, DEFAULT_INSTRUMENTATION_VERSION)?;
        let tracer = manager.get_tracer(SCOPE_NAME, DEFAULT_INSTRUMENTATION_VERSION)?;

        let request_counter = manager.create_counter(
            &meter,
            "test_requests_total",
            "1",
            "Total number of test requests",
        );
        let response_time_histogram = manager.create_histogram(
            &meter,
            "test_response_time_seconds",
            "s",
            "Response time for test operations",
        );

        Ok(Self {
            manager,
            logger,
            tracer,
            request_counter,
            response_time_histogram,
            flush_wait,
            run_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn test_logging(&self, message: &str) {
        println!("Testing logging with message: {message}");

        self.logger.debug(format!("DEBUG: {message}"));
        self.logger.info(format!("INFO: {message}"));
        self.logger.warn(format!("WARNING: {message}"));
        self.logger.error(format!("ERROR: {message}"));

        self.logger.info_with(
            "Structured log test",
            &[
                KeyValue::new("user_id", "test-user-123"),
                KeyValue::new("action", "test_operation"),
                KeyValue::new("duration_ms", 150_i64),
                KeyValue::new("test.run_id", self.run_id.clone()),
            ],
        );
    }

    pub fn test_metrics(&self) {
        println!("Testing metrics...");

        let requests: [(u64, &str, &str); 3] =
            [(1, "GET", "200"), (2, "POST", "201"), (1, "GET", "404")];
        for (count, method, status) in requests {
            self.request_counter.add(
                count,
                &[
                    KeyValue::new("endpoint", "/test"),
                    KeyValue::new("method", method),
                    KeyValue::new("status", status),
                ],
            );
        }

        let labels = [
            KeyValue::new("endpoint", "/test"),
            KeyValue::new("method", "GET"),
        ];
        for response_time in [0.1, 0.2, 0.15, 0.3, 0.25] {
            self.response_time_histogram.record(response_time, &labels);
        }

        println!("Metrics recorded successfully");
    }

    pub async fn test_tracing(&self) {
        println!("Testing tracing...");

        let span = self
            .tracer
            .span_builder("test_operation")
            .with_attributes([
                KeyValue::new("test.attribute", "test_value"),
                KeyValue::new("user.id", "test-user-456"),
                KeyValue::new("test.run_id", self.run_id.clone()),
            ])
            .start(&self.tracer);
        let cx = Context::current_with_span(span);

        async {
            sleep(Duration::from_millis(100)).await;

            let child = self
                .tracer
                .span_builder("child_operation")
                .with_attributes([KeyValue::new("child.attribute", "child_value")])
                .start(&self.tracer);
            let child_cx = Context::current_with_span(child);
            sleep(Duration::from_millis(50))
                .with_context(child_cx.clone())
                .await;
            child_cx.span().end();

            Context::current()
                .span()
                .add_event("operation_completed", vec![KeyValue::new("result", "success")]);
        }
        .with_context(cx.clone())
        .await;

        cx.span().end();
    }

    /// Process `data` under a span and execution logging; returns `data`
    /// merged with `"processed": true`.
    pub async fn test_decorators(&self, data: Value) -> Result<Value, HarnessError> {
        traced_async(
            &self.tracer,
            "test_decorators",
            logged_async(&self.logger, "test_decorators", async {
                self.logger
                    .info(format!("Processing data with decorators: {data}"));
                sleep(Duration::from_millis(100)).await;

                let mut processed = Map::new();
                processed.insert("processed".into(), Value::Bool(true));
                match data {
                    Value::Object(fields) => processed.extend(fields),
                    other => {
                        processed.insert("data".into(), other);
                    }
                }
                Ok(Value::Object(processed))
            }),
        )
        .await
    }

    pub fn test_error_logging(&self) {
        if let Err(e) = fail_on_purpose() {
            self.logger.exception("Test error occurred", &e);
        }
    }

    async fn run_sequence(&self) -> Result<(), HarnessError> {
        println!("\n1. Testing Logging...");
        self.test_logging("Initial test message");

        println!("\n2. Testing Metrics...");
        self.test_metrics();

        println!("\n3. Testing Tracing...");
        self.test_tracing().await;

        println!("\n4. Testing Decorators...");
        let result = self
            .test_decorators(json!({"input": "test_data", "value": 42}))
            .await?;
        println!("Decorator test result: {result}");

        println!("\n5. Testing Error Logging...");
        self.test_error_logging();

        self.manager.force_flush()?;
        Ok(())
    }

    /// Run every step in order. Returns `false` if any step failed.
    pub async fn run_comprehensive_test(&self) -> bool {
        let config = self.manager.config();
        let rule = "=".repeat(60);
        println!("\n{rule}");
        println!("Starting OTEL Collector Test");
        println!("Service: {}", config.app_name);
        println!(
            "Endpoint: {}",
            config.otlp_endpoint.as_deref().unwrap_or("(none)")
        );
        println!("Insecure: {}", config.insecure);
        println!("Run id: {}", self.run_id);
        println!("{rule}\n");

        let started = Instant::now();
        if let Err(e) = self.run_sequence().await {
            self.logger.exception("Test failed with error", &e);
            println!("\nTest failed: {e}");
            return false;
        }

        println!("\n{rule}");
        println!("Test completed successfully!");
        println!("Total duration: {:.2} seconds", started.elapsed().as_secs_f64());
        println!("Check your OTEL collector for received telemetry data");
        println!("{rule}");

        println!("\nWaiting for metrics export...");
        sleep(self.flush_wait).await;
        true
    }

    /// Shut the manager down, flushing whatever is still buffered.
    pub fn shutdown(&self) -> Result<(), ObservabilityError> {
        println!("\nShutting down observability...");
        self.manager.shutdown()
    }

    /// Guard that calls [`shutdown`](Self::shutdown) when dropped, unwinding
    /// included.
    pub fn shutdown_guard(&self) -> ShutdownGuard<'_> {
        ShutdownGuard(self)
    }
}

pub struct ShutdownGuard<'a>(&'a CollectorTester);

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.0.shutdown() {
            eprintln!("ERROR: {e}");
        }
    }
}

fn fail_on_purpose() -> Result<(), HarnessError> {
    Err(HarnessError::Synthetic("This is a test error for observability"))
}
