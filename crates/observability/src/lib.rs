//! Unified OpenTelemetry logging, metrics and tracing.
//!
//! An [`ObservabilityManager`] owns one provider per signal, exporting over
//! OTLP/gRPC to a collector and optionally mirroring to stdout. Loggers,
//! meters and tracers are handed out by name and cached.
//!
//! ```no_run
//! use otel_observability::{ObservabilityConfig, ObservabilityError, ObservabilityManager};
//!
//! # fn main() -> Result<(), ObservabilityError> {
//! let config = ObservabilityConfig::new("checkout", "api").with_endpoint("localhost:4317");
//! let manager = ObservabilityManager::new(config);
//! manager.initialize_all()?;
//!
//! let logger = manager.get_logger("checkout.api")?;
//! logger.info("ready");
//!
//! manager.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod global;
pub mod instrument;
pub mod logger;
pub mod manager;
pub mod propagation;
pub mod providers;

pub use common::{Carrier, ObservabilityError};
pub use config::{ExporterType, LogLevel, ObservabilityConfig};
pub use global::{get_logger, get_metrics, get_traces, initialize_observability};
pub use instrument::{logged, logged_async, traced, traced_async, with_remote_parent};
pub use logger::Logger;
pub use manager::{ObservabilityManager, DEFAULT_INSTRUMENTATION_VERSION};
pub use providers::Providers;
