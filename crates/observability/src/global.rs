//! Process-wide manager and the shorthand accessors built on it.

use std::sync::{Arc, OnceLock};

use common::ObservabilityError;
use opentelemetry::metrics::Meter;
use opentelemetry_sdk::trace::SdkTracer;

use crate::{logger::Logger, manager::ObservabilityManager};

static MANAGER: OnceLock<Arc<ObservabilityManager>> = OnceLock::new();

/// Make `manager` the process-wide instance.
///
/// The first install wins; later calls get the already installed manager
/// back and `manager` is dropped.
pub fn install(manager: ObservabilityManager) -> Arc<ObservabilityManager> {
    let candidate = Arc::new(manager);
    MANAGER.get_or_init(|| candidate.clone()).clone()
}

/// The process-wide manager, built from the environment on first use.
///
/// # Errors
///
/// Returns [`ObservabilityError::InvalidConfig`] if nothing was installed
/// and the environment is not a valid configuration.
pub fn manager() -> Result<Arc<ObservabilityManager>, ObservabilityError> {
    if let Some(existing) = MANAGER.get() {
        return Ok(existing.clone());
    }
    ObservabilityManager::from_env().map(install)
}

/// Logger named `name` from the process-wide manager.
pub fn get_logger(name: &str) -> Result<Logger, ObservabilityError> {
    manager()?.get_logger(name)
}

/// Meter for `name`/`version` from the process-wide manager.
pub fn get_metrics(name: &str, version: &str) -> Result<Meter, ObservabilityError> {
    manager()?.get_meter(name, version)
}

/// Tracer for `name`/`version` from the process-wide manager.
pub fn get_traces(name: &str, version: &str) -> Result<SdkTracer, ObservabilityError> {
    manager()?.get_tracer(name, version)
}

/// Initialise every signal on the process-wide manager.
pub fn initialize_observability() -> Result<Arc<ObservabilityManager>, ObservabilityError> {
    let manager = manager()?;
    manager.initialize_all()?;
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObservabilityConfig;

    #[test]
    fn first_install_wins() {
        let first = install(ObservabilityManager::new(ObservabilityConfig::new(
            "global-test",
            "first",
        )));
        let second = install(ObservabilityManager::new(ObservabilityConfig::new(
            "global-test",
            "second",
        )));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &manager().unwrap()));

        let logger = get_logger("global.logger").unwrap();
        assert_eq!(logger.name(), "global.logger");
        get_metrics("global.meter", "1.0.0").unwrap();
        get_traces("global.tracer", "1.0.0").unwrap();
        assert!(initialize_observability().is_ok());
    }
}
