//! Tower layer and service producing one server span per request.

use std::{
    fmt,
    future::Future,
    path::Path,
    pin::Pin,
    sync::Arc,
    task::{Context as TaskContext, Poll, ready},
};

use {
    axum::extract::MatchedPath,
    http::{HeaderMap, Request, Response},
    opentelemetry::{
        Context, global,
        propagation::{Extractor, TextMapPropagator},
        trace::{SpanKind, TraceContextExt, Tracer, TracerProvider},
    },
    routespan_config::{StatusPolicy, TracingConfig},
    tower::{Layer, Service},
    tracing::debug,
};

use crate::{
    attributes::{RequestFacts, enduser_attributes, network_attributes},
    carrier::{HeaderCarrier, HeaderCarrierMut},
    lifecycle::RequestSpan,
    resolver::{ActiveProvider, GlobalProvider, ResolvedTracer, TracerResolver},
    route::RouteSlot,
};

// ── Propagation ─────────────────────────────────────────────────────────────

/// Source of the propagation codec used to extract upstream context.
#[derive(Clone, Default)]
pub enum Propagation {
    /// The process-wide propagator registered with [`opentelemetry::global`].
    #[default]
    Global,
    Custom(Arc<dyn TextMapPropagator + Send + Sync>),
}

impl Propagation {
    /// Extract upstream context on top of `cx`. Missing or malformed headers
    /// leave `cx` unchanged, so the request starts a new root trace.
    pub fn extract(&self, cx: &Context, carrier: &dyn Extractor) -> Context {
        match self {
            Self::Global => {
                global::get_text_map_propagator(|p| p.extract_with_context(cx, carrier))
            },
            Self::Custom(p) => p.extract_with_context(cx, carrier),
        }
    }

    /// Write `cx` into outbound request headers.
    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        let mut carrier = HeaderCarrierMut::new(headers);
        match self {
            Self::Global => global::get_text_map_propagator(|p| p.inject_context(cx, &mut carrier)),
            Self::Custom(p) => p.inject_context(cx, &mut carrier),
        }
    }
}

impl fmt::Debug for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("Global"),
            Self::Custom(p) => f.debug_tuple("Custom").field(p).finish(),
        }
    }
}

// ── TraceLayer ──────────────────────────────────────────────────────────────

/// Layer that wraps a service with [`TraceService`].
///
/// The tracer provider and propagator are injected. [`TraceLayer::global`]
/// is the convenience for applications that register both with
/// [`opentelemetry::global`]; both are looked up per request, so the layer may
/// be built before they are installed.
#[derive(Debug, Clone)]
pub struct TraceLayer<P = GlobalProvider> {
    resolver: TracerResolver<P>,
    propagation: Propagation,
    config: Arc<TracingConfig>,
}

impl TraceLayer<GlobalProvider> {
    #[must_use]
    pub fn global() -> Self {
        Self::new(GlobalProvider)
    }
}

impl<P> TraceLayer<P>
where
    P: TracerProvider + Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            resolver: TracerResolver::new(provider),
            propagation: Propagation::Global,
            config: Arc::new(TracingConfig::default()),
        }
    }

    /// Use `propagator` instead of the global one.
    #[must_use]
    pub fn with_propagator<T>(mut self, propagator: T) -> Self
    where
        T: TextMapPropagator + Send + Sync + 'static,
    {
        self.propagation = Propagation::Custom(Arc::new(propagator));
        self
    }

    /// Build a layer configured from a `routespan.{toml,json}` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_config_file(provider: P, path: &Path) -> crate::Result<Self> {
        let config = routespan_config::load_config(path)?;
        Ok(Self::new(provider).with_config(config))
    }

    #[must_use]
    pub fn with_config(mut self, config: TracingConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    #[must_use]
    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        Arc::make_mut(&mut self.config).status_policy = policy;
        self
    }

    #[must_use]
    pub fn propagation(&self) -> &Propagation {
        &self.propagation
    }

    #[must_use]
    pub fn config(&self) -> &TracingConfig {
        &self.config
    }
}

impl<S, P: Clone> Layer<S> for TraceLayer<P> {
    type Service = TraceService<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService {
            inner,
            resolver: self.resolver.clone(),
            propagation: self.propagation.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

// ── TraceService ────────────────────────────────────────────────────────────

/// Service that traces each request passing through it.
#[derive(Debug, Clone)]
pub struct TraceService<S, P = GlobalProvider> {
    inner: S,
    resolver: TracerResolver<P>,
    propagation: Propagation,
    config: Arc<TracingConfig>,
}

impl<S, P, ReqBody, ResBody> Service<Request<ReqBody>> for TraceService<S, P>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    P: TracerProvider + Clone + Send + Sync + 'static,
    <P::Tracer as Tracer>::Span: Send + Sync + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // An enclosing interceptor hands its span-bearing context down through
        // the extensions; otherwise use whatever is attached to this thread.
        let incoming = request
            .extensions()
            .get::<Context>()
            .cloned()
            .unwrap_or_else(Context::current);
        let ResolvedTracer {
            provider,
            tracer,
            inherited,
        } = self.resolver.resolve(&incoming);
        let parent = self
            .propagation
            .extract(&incoming, &HeaderCarrier::new(request.headers()));

        let mut attributes = network_attributes(&request);
        if self.config.record_enduser {
            attributes.extend(enduser_attributes(request.headers()));
        }
        let span = tracer
            .span_builder(request.method().as_str().to_string())
            .with_kind(SpanKind::Server)
            .with_attributes(attributes)
            .start_with_context(&tracer, &parent);
        let cx = parent
            .with_span(span)
            .with_value(ActiveProvider(provider));

        debug!(
            trace_id = %cx.span().span_context().trace_id(),
            remote_parent = parent.span().span_context().is_remote(),
            inherited,
            "starting request span"
        );

        let facts = RequestFacts::from_request(&request, &self.config);
        let route = request
            .extensions()
            .get::<RouteSlot>()
            .cloned()
            .unwrap_or_default();
        // Installed through `Router::layer`, the router has already matched.
        if let Some(matched) = request.extensions().get::<MatchedPath>() {
            route.record(matched.as_str());
        }
        request.extensions_mut().insert(route.clone());
        request.extensions_mut().insert(cx.clone());

        let span = RequestSpan::started(cx, facts, route, self.config.status_policy);
        let inner = {
            let _attached = span.context().clone().attach();
            self.inner.call(request)
        };

        ResponseFuture {
            inner,
            span: Some(span),
        }
    }
}

// ── ResponseFuture ──────────────────────────────────────────────────────────

pin_project_lite::pin_project! {
    /// Response future of [`TraceService`].
    ///
    /// Polls the downstream future with the request's context attached and
    /// observes the response status on completion. The span is finished when
    /// the future completes or is dropped.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        span: Option<RequestSpan>,
    }
}

impl<F, ResBody, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _attached = this.span.as_ref().map(|s| s.context().clone().attach());

        let result = ready!(this.inner.poll(cx));
        let Some(mut span) = this.span.take() else {
            return Poll::Ready(result);
        };
        let result = match result {
            Ok(response) => Ok(span.capture_mut().inspect(response)),
            Err(e) => {
                debug!("downstream service failed without a response");
                Err(e)
            },
        };
        drop(span);
        Poll::Ready(result)
    }
}
