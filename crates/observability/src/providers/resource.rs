//! The OpenTelemetry resource describing this service.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};

use crate::config::ObservabilityConfig;

/// Resource attribute carrying the component name.
pub const SERVICE_COMPONENT: &str = "service.component";

/// Build the resource attached to every provider.
pub fn service_resource(config: &ObservabilityConfig) -> Resource {
    Resource::builder()
        .with_attributes(vec![
            KeyValue::new(SERVICE_NAME, config.app_name.clone()),
            KeyValue::new(SERVICE_VERSION, config.service_version.clone()),
            KeyValue::new(SERVICE_COMPONENT, config.component.clone()),
        ])
        .build()
}
