//! Signal initialisers: one per OpenTelemetry signal.
//!
//! Each initialiser builds its SDK provider at most once. The first call to
//! `initialize` builds (or adopts a seeded provider), registers it with the
//! process-wide OpenTelemetry globals, and caches it; every later call hands
//! back a clone of the cached handle.
//!
//! # Export targets
//!
//! - OTLP/gRPC to the collector when [`ObservabilityConfig::is_otlp_enabled`].
//! - stdout when [`ObservabilityConfig::is_console_enabled`].
//! - Neither: providers still work, records are simply dropped.

pub mod logs;
pub mod metrics;
pub mod resource;
pub mod traces;

pub use logs::LoggingInitializer;
pub use metrics::MetricsInitializer;
pub use resource::service_resource;
pub use traces::TracingInitializer;

use std::sync::{Mutex, MutexGuard, PoisonError};

use common::ObservabilityError;
use opentelemetry_sdk::{logs::SdkLoggerProvider, metrics::SdkMeterProvider, trace::SdkTracerProvider};

#[cfg(doc)]
use crate::config::ObservabilityConfig;

/// Pre-built providers handed to the manager instead of building them from
/// configuration. Any provider left as `None` is built as usual.
#[derive(Debug, Default)]
pub struct Providers {
    pub tracer: Option<SdkTracerProvider>,
    pub meter: Option<SdkMeterProvider>,
    pub logger: Option<SdkLoggerProvider>,
}

struct Slot<P> {
    seed: Option<P>,
    active: Option<P>,
}

/// Build-once holder for a provider handle.
pub(crate) struct ProviderCell<P> {
    inner: Mutex<Slot<P>>,
}

impl<P: Clone> ProviderCell<P> {
    pub(crate) fn new(seed: Option<P>) -> Self {
        Self {
            inner: Mutex::new(Slot { seed, active: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<P>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the active provider, activating it first if needed.
    ///
    /// A seeded provider is adopted instead of calling `build`. `install`
    /// runs exactly once, right after activation.
    pub(crate) fn get_or_try_init(
        &self,
        build: impl FnOnce() -> Result<P, ObservabilityError>,
        install: impl FnOnce(&P),
    ) -> Result<P, ObservabilityError> {
        let mut slot = self.lock();
        if let Some(active) = &slot.active {
            return Ok(active.clone());
        }
        let provider = match slot.seed.take() {
            Some(seeded) => seeded,
            None => build()?,
        };
        install(&provider);
        slot.active = Some(provider.clone());
        Ok(provider)
    }

    /// The active provider, if one has been activated.
    pub(crate) fn get(&self) -> Option<P> {
        self.lock().active.clone()
    }
}
