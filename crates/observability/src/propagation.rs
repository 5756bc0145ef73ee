//! W3C trace-context extraction and injection over a [`Carrier`].

use common::Carrier;
use opentelemetry::{propagation::TextMapPropagator, Context};
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Continue the trace described by `carrier` on top of the current context.
///
/// A carrier without a valid `traceparent` leaves the current context as is.
pub fn extract_context(carrier: &Carrier) -> Context {
    TraceContextPropagator::new().extract_with_context(&Context::current(), carrier)
}

/// Write the span context of `cx` into `carrier`.
pub fn inject_context(cx: &Context, carrier: &mut Carrier) {
    TraceContextPropagator::new().inject_context(cx, carrier);
}

/// A carrier holding the current span context.
pub fn current_carrier() -> Carrier {
    let mut carrier = Carrier::new();
    inject_context(&Context::current(), &mut carrier);
    carrier
}
