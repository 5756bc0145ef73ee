//! Wrappers that add tracing or execution logging around a unit of work.
//!
//! These play the role function decorators play elsewhere: wrap a closure or
//! future, record its outcome, and hand the result back untouched.

use std::{borrow::Cow, error::Error, future::Future};

use common::Carrier;
use opentelemetry::{
    trace::{FutureExt as _, SpanRef, Status, TraceContextExt as _, Tracer as _},
    Context,
};
use opentelemetry_sdk::trace::SdkTracer;

use crate::{logger::Logger, propagation::extract_context};

/// Run `f` inside a new current span named `span_name`.
///
/// `Ok` marks the span OK. `Err` records the error as an exception event,
/// marks the span ERROR with the error message, and is returned as is.
pub fn traced<T, E, F>(tracer: &SdkTracer, span_name: impl Into<Cow<'static, str>>, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: Error,
{
    tracer.in_span(span_name, |cx| {
        let result = f();
        record_outcome(&cx.span(), &result);
        result
    })
}

/// Async counterpart of [`traced`]: `fut` is polled with the span current.
pub async fn traced_async<T, E, Fut>(
    tracer: &SdkTracer,
    span_name: impl Into<Cow<'static, str>>,
    fut: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: Error,
{
    let cx = Context::current_with_span(tracer.start(span_name));
    let result = fut.with_context(cx.clone()).await;
    let span = cx.span();
    record_outcome(&span, &result);
    span.end();
    result
}

/// Log the start and the outcome of `f` under `operation`.
///
/// DEBUG before and after; on failure an ERROR record with the exception
/// details, and the error is returned as is.
pub fn logged<T, E, F>(logger: &Logger, operation: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: Error,
{
    logger.debug(format!("Executing {operation}"));
    log_outcome(logger, operation, f())
}

/// Async counterpart of [`logged`].
pub async fn logged_async<T, E, Fut>(logger: &Logger, operation: &str, fut: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: Error,
{
    logger.debug(format!("Executing {operation}"));
    log_outcome(logger, operation, fut.await)
}

/// Run `f` in a span that continues the trace carried by `carrier`.
///
/// When `carrier` holds no `traceparent`, the span nests under the current
/// context instead. The extracted context is detached once `f` returns.
pub fn with_remote_parent<T, F>(
    tracer: &SdkTracer,
    carrier: Option<&Carrier>,
    span_name: impl Into<Cow<'static, str>>,
    f: F,
) -> T
where
    F: FnOnce(Context) -> T,
{
    let parent = match carrier.filter(|c| c.has_parent()) {
        Some(carrier) => extract_context(carrier),
        None => Context::current(),
    };
    let _guard = parent.attach();
    tracer.in_span(span_name, f)
}

fn record_outcome<T, E: Error>(span: &SpanRef<'_>, result: &Result<T, E>) {
    match result {
        Ok(_) => span.set_status(Status::Ok),
        Err(e) => {
            span.record_error(e);
            span.set_status(Status::error(e.to_string()));
        }
    }
}

fn log_outcome<T, E: Error>(logger: &Logger, operation: &str, result: Result<T, E>) -> Result<T, E> {
    match &result {
        Ok(_) => logger.debug(format!("Successfully executed {operation}")),
        Err(e) => logger.exception(format!("Error in {operation}"), e),
    }
    result
}
