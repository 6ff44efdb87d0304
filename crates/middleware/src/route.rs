//! Route pattern hand-off between the router and the interceptor.
//!
//! The matched route template is only known once the router has dispatched
//! the request. The interceptor puts a [`RouteSlot`] into the request
//! extensions before calling downstream; the router side fills it, and the
//! interceptor reads it back after the response is produced.

use {
    axum::{
        extract::{MatchedPath, Request},
        middleware::Next,
        response::Response,
    },
    std::sync::{Arc, OnceLock},
    tracing::trace,
};

/// Per-request, write-once slot holding the matched route template.
#[derive(Debug, Clone, Default)]
pub struct RouteSlot {
    pattern: Arc<OnceLock<String>>,
}

impl RouteSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the matched route. Returns `false` if one was already recorded.
    pub fn record(&self, pattern: impl Into<String>) -> bool {
        self.pattern.set(pattern.into()).is_ok()
    }

    /// The recorded route, or `None` if routing has not matched anything.
    #[must_use]
    pub fn get(&self) -> Option<&str> {
        self.pattern.get().map(String::as_str)
    }
}

/// Axum middleware that copies [`MatchedPath`] into the request's [`RouteSlot`].
///
/// Install with `Router::route_layer(axum::middleware::from_fn(record_matched_path))`
/// so it only runs for requests that matched a route.
pub async fn record_matched_path(request: Request, next: Next) -> Response {
    if let (Some(slot), Some(matched)) = (
        request.extensions().get::<RouteSlot>(),
        request.extensions().get::<MatchedPath>(),
    ) {
        trace!(route = matched.as_str(), "recorded matched route");
        slot.record(matched.as_str());
    }
    next.run(request).await
}
