//! Per-request span guard.
//!
//! [`RequestSpan`] owns the deferred part of the span's life: once the
//! downstream service is done it applies the route-aware name, the HTTP server
//! attributes and the mapped status, then ends the span. Both steps run from
//! `Drop`, so they happen exactly once whether the response future completes,
//! fails, panics or is dropped early.

use {
    http::StatusCode,
    opentelemetry::{
        Context,
        trace::{Status, TraceContextExt},
    },
    routespan_config::StatusPolicy,
    tracing::{debug, trace},
};

use crate::{
    attributes::{RequestFacts, server_attributes, span_name, status_code_attributes},
    capture::StatusCapture,
    route::RouteSlot,
    status::{span_status, to_otel_status},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Started,
    Enriched,
    Ended,
}

pub(crate) struct RequestSpan {
    cx: Context,
    facts: RequestFacts,
    route: RouteSlot,
    capture: StatusCapture,
    policy: StatusPolicy,
    phase: Phase,
}

impl RequestSpan {
    pub(crate) fn started(
        cx: Context,
        facts: RequestFacts,
        route: RouteSlot,
        policy: StatusPolicy,
    ) -> Self {
        trace!(
            trace_id = %cx.span().span_context().trace_id(),
            method = %facts.method,
            target = %facts.target,
            "request span started"
        );
        Self {
            cx,
            facts,
            route,
            capture: StatusCapture::new(),
            policy,
            phase: Phase::Started,
        }
    }

    pub(crate) fn context(&self) -> &Context {
        &self.cx
    }

    pub(crate) fn capture_mut(&mut self) -> &mut StatusCapture {
        &mut self.capture
    }

    /// Apply the final name, attributes and status.
    fn enrich(&mut self) {
        if self.phase != Phase::Started {
            return;
        }

        let route = self.route.get();
        let status = self.capture.captured();
        let name = span_name(self.facts.method.as_str(), route);
        let (class, description) = span_status(status, self.policy);

        let span = self.cx.span();
        span.set_attributes(
            server_attributes(&self.facts, route)
                .into_iter()
                .chain(status_code_attributes(status)),
        );
        span.update_name(name.clone());
        let otel_status = to_otel_status(class, description);
        if otel_status != Status::Unset {
            span.set_status(otel_status);
        }

        debug!(
            trace_id = %span.span_context().trace_id(),
            span = %name,
            status,
            ?class,
            "request span enriched"
        );
        self.phase = Phase::Enriched;
    }

    fn end(&mut self) {
        if self.phase == Phase::Ended {
            return;
        }
        self.cx.span().end();
        self.phase = Phase::Ended;
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        // A panicking handler never produced a response; report it as one.
        if std::thread::panicking() && !self.capture.is_observed() {
            debug!("request span closing while unwinding");
            self.capture.observe(StatusCode::INTERNAL_SERVER_ERROR);
        }
        self.enrich();
        self.end();
    }
}
