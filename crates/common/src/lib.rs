//! Common types, trace-carrier definitions, and errors shared across the
//! `otel-observability` crates.

pub mod error;
pub mod protocol;

pub use error::ObservabilityError;
pub use protocol::{Carrier, TRACEPARENT_KEY, TRACESTATE_KEY};
