//! OpenTelemetry server spans for tower and axum HTTP services.
//!
//! [`TraceLayer`] wraps a service so that every request produces exactly one
//! server-kind span. The span joins any upstream trace found in the request
//! headers, is named after the matched route once routing has finished, and is
//! classified from the final response status.
//!
//! # Usage
//!
//! ```rust,ignore
//! use {axum::{Router, routing::get}, routespan_middleware::TraceLayer};
//!
//! let app = Router::new()
//!     .route("/posts/{id}", get(show_post))
//!     .layer(TraceLayer::global());
//! ```
//!
//! Peer attributes (`net.peer.ip`, `net.peer.port`) come from axum's
//! `ConnectInfo<SocketAddr>`, so serve the app with connect info enabled;
//! without it spans carry no peer address:
//!
//! ```rust,ignore
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```
//!
//! When the layer wraps the router from the outside instead, add
//! [`record_matched_path`] as a route layer so the route pattern reaches the
//! span:
//!
//! ```rust,ignore
//! use axum::middleware::from_fn;
//!
//! let router = Router::new()
//!     .route("/posts/{id}", get(show_post))
//!     .route_layer(from_fn(routespan_middleware::record_matched_path));
//! let app = TraceLayer::new(provider).layer(router);
//! ```

pub mod attributes;
pub mod capture;
pub mod carrier;
pub mod context;
pub mod error;
pub mod layer;
mod lifecycle;
pub mod resolver;
pub mod route;
pub mod semconv;
pub mod status;
pub mod telemetry;

pub use {
    capture::StatusCapture,
    carrier::{HeaderCarrier, HeaderCarrierMut},
    context::{current_trace_id, request_context},
    error::{Error, Result},
    layer::{Propagation, ResponseFuture, TraceLayer, TraceService},
    resolver::{ActiveProvider, GlobalProvider, ResolvedTracer, TracerResolver},
    route::{RouteSlot, record_matched_path},
    routespan_config::{StatusPolicy, TracingConfig},
    status::{SpanClass, span_status},
};

/// Instrumentation scope name reported on every span.
pub const INSTRUMENTATION_NAME: &str = "routespan";

/// Instrumentation scope version reported on every span.
pub const INSTRUMENTATION_VERSION: &str = env!("CARGO_PKG_VERSION");
