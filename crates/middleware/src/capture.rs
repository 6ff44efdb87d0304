//! Response status capture.

use http::StatusCode;

/// Records the status code sent downstream without touching the response.
///
/// Only the first observed status counts. Until one is observed the captured
/// status is 200, matching a handler that writes a body without setting one.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCapture {
    status: Option<StatusCode>,
}

impl StatusCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `status` unless one was already recorded.
    pub fn observe(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
    }

    /// Observe the status of `response` and hand it back unchanged.
    pub fn inspect<B>(&mut self, response: http::Response<B>) -> http::Response<B> {
        self.observe(response.status());
        response
    }

    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.status.is_some()
    }

    #[must_use]
    pub fn captured(&self) -> u16 {
        self.status.map_or(StatusCode::OK.as_u16(), |s| s.as_u16())
    }
}
