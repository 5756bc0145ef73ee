//! Command-line arguments, each with an `OTEL_*` environment fallback.

use std::time::Duration;

use clap::{ArgAction, Parser};
use otel_observability::{LogLevel, ObservabilityConfig, ObservabilityError};

/// Send a fixed sequence of logs, metrics and traces to an OTLP collector.
#[derive(Debug, Parser)]
#[command(name = "otel-collector-test", version)]
pub struct Args {
    /// Reported as `service.name`.
    #[arg(long, env = "OTEL_APP_NAME", default_value = "otel-collector-test")]
    pub service_name: String,

    /// Reported as `service.component`.
    #[arg(long, env = "OTEL_COMPONENT_NAME", default_value = "test-component")]
    pub component: String,

    /// Collector `host:port` or URL.
    #[arg(long, env = "OTEL_GRPC_URL", default_value = "localhost:4317")]
    pub endpoint: String,

    /// Plaintext gRPC. `--insecure false` turns TLS on.
    #[arg(
        long,
        env = "OTEL_INSECURE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub insecure: bool,

    #[arg(long, env = "OTEL_LOG_LEVEL", default_value_t = LogLevel::Debug)]
    pub log_level: LogLevel,

    /// Also print every signal to stdout.
    #[arg(
        long,
        env = "OTEL_CONSOLE_DEBUG",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub console_debug: bool,

    /// Seconds to wait after the sequence so periodic exporters can run.
    #[arg(long, default_value_t = 2)]
    pub flush_wait_secs: u64,
}

impl Args {
    /// Validated observability configuration for these arguments.
    pub fn to_config(&self) -> Result<ObservabilityConfig, ObservabilityError> {
        let config = ObservabilityConfig::new(&self.service_name, &self.component)
            .with_endpoint(&self.endpoint)
            .with_insecure(self.insecure)
            .with_console_debug(self.console_debug)
            .with_log_level(self.log_level);
        config.validate()?;
        Ok(config)
    }

    pub fn flush_wait(&self) -> Duration {
        Duration::from_secs(self.flush_wait_secs)
    }
}
