//! Access to the span-bearing context from handlers.

use {
    http::Request,
    opentelemetry::{Context, trace::TraceContextExt},
};

/// The context [`TraceService`](crate::TraceService) stored on the request.
#[must_use]
pub fn request_context<B>(request: &Request<B>) -> Option<&Context> {
    request.extensions().get::<Context>()
}

/// Trace id of the active span, if any.
///
/// Handlers can report it to clients so a failing request can be looked up
/// in the tracing backend.
#[must_use]
pub fn current_trace_id() -> Option<String> {
    let cx = Context::current();
    let span = cx.span();
    let span_context = span.span_context();
    span_context
        .is_valid()
        .then(|| span_context.trace_id().to_string())
}
