#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{net::SocketAddr, time::Duration};

use {
    axum::{
        Router,
        body::Body,
        extract::ConnectInfo,
        http::{Request, Response, StatusCode, header::HOST},
        middleware::from_fn,
        routing::get,
    },
    opentelemetry::{
        Value,
        trace::{SpanId, SpanKind, Status, TraceId},
    },
    opentelemetry_sdk::{
        propagation::TraceContextPropagator,
        trace::{InMemorySpanExporter, SdkTracerProvider, SpanData},
    },
    routespan_middleware::{
        StatusPolicy, TraceLayer, current_trace_id, record_matched_path, request_context,
    },
    tower::{Layer, ServiceExt, service_fn},
};

fn setup() -> (SdkTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (provider, exporter)
}

fn routes() -> Router {
    Router::new()
        .route(
            "/posts/{id}",
            get(|| async { StatusCode::OK }).put(|| async { StatusCode::ACCEPTED }),
        )
        .route("/error", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/denied", get(|| async { StatusCode::FORBIDDEN }))
        .route("/moved", get(|| async { StatusCode::MOVED_PERMANENTLY }))
}

/// Interceptor installed inside the router.
fn inner_app(provider: &SdkTracerProvider) -> Router {
    routes().layer(TraceLayer::new(provider.clone()))
}

/// Interceptor wrapping the whole router, route recorded after dispatch.
fn outer_app(
    provider: &SdkTracerProvider,
) -> routespan_middleware::TraceService<Router, SdkTracerProvider> {
    TraceLayer::new(provider.clone()).layer(routes().route_layer(from_fn(record_matched_path)))
}

fn request(method: &str, target: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(target)
        .header(HOST, "example.com")
        .body(Body::empty())
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 1234))));
    request
}

fn attr<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

fn assert_span(span: &SpanData, method: &str, target: &str, route: &str, status: Status, code: i64) {
    let expected_name = if route.is_empty() {
        format!("{method} route not found")
    } else {
        format!("{method} {route}")
    };
    assert_eq!(span.name, expected_name);
    assert_eq!(span.span_kind, SpanKind::Server);
    assert_eq!(span.status, status);

    assert_eq!(attr(span, "http.method"), Some(&Value::from(method.to_string())));
    assert_eq!(attr(span, "http.target"), Some(&Value::from(target.to_string())));
    assert_eq!(attr(span, "http.route"), Some(&Value::from(route.to_string())));
    assert_eq!(attr(span, "http.scheme"), Some(&Value::from("http")));
    assert_eq!(attr(span, "http.flavor"), Some(&Value::from("1.1")));
    assert_eq!(attr(span, "http.status_code"), Some(&Value::I64(code)));
    assert_eq!(attr(span, "net.transport"), Some(&Value::from("ip_tcp")));

    for key in ["http.host", "net.peer.ip", "net.peer.port", "net.host.name"] {
        assert!(attr(span, key).is_some(), "missing {key}");
    }
}

#[tokio::test]
async fn scenarios_with_layer_inside_router() {
    let cases = [
        ("GET", "/posts/123", "/posts/{id}", Status::Unset, 200),
        ("PUT", "/posts/123", "/posts/{id}", Status::Unset, 202),
        ("GET", "/error", "/error", Status::error(""), 500),
        ("GET", "/denied", "/denied", Status::Unset, 403),
        ("GET", "/moved", "/moved", Status::Unset, 301),
    ];

    for (method, target, route, status, code) in cases {
        let (provider, exporter) = setup();
        let response = inner_app(&provider)
            .oneshot(request(method, target))
            .await
            .unwrap();
        assert_eq!(i64::from(response.status().as_u16()), code);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1, "{method} {target}");
        assert_span(&spans[0], method, target, route, status, code);
    }
}

#[tokio::test]
async fn scenarios_with_layer_around_router() {
    let cases = [
        ("GET", "/posts/123", "/posts/{id}", Status::Unset, 200),
        ("PUT", "/posts/123", "/posts/{id}", Status::Unset, 202),
        ("GET", "/error", "/error", Status::error(""), 500),
    ];

    for (method, target, route, status, code) in cases {
        let (provider, exporter) = setup();
        outer_app(&provider)
            .oneshot(request(method, target))
            .await
            .unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1, "{method} {target}");
        assert_span(&spans[0], method, target, route, status, code);
    }
}

#[tokio::test]
async fn unmatched_route_uses_fallback_label() {
    let (provider, exporter) = setup();
    let response = outer_app(&provider)
        .oneshot(request("GET", "/unknown"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_span(&spans[0], "GET", "/unknown", "", Status::error(""), 404);
}

#[tokio::test]
async fn unmatched_route_through_explicit_fallback() {
    let (provider, exporter) = setup();
    let app = routes()
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(TraceLayer::new(provider.clone()).with_status_policy(StatusPolicy::ServerErrors));

    app.oneshot(request("GET", "/unknown")).await.unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_span(&spans[0], "GET", "/unknown", "", Status::Unset, 404);
}

#[tokio::test]
async fn joins_upstream_trace_from_headers() {
    let (provider, exporter) = setup();
    let app = routes().layer(
        TraceLayer::new(provider.clone()).with_propagator(TraceContextPropagator::new()),
    );

    let mut req = request("GET", "/posts/7");
    req.headers_mut().insert(
        "traceparent",
        "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
            .parse()
            .unwrap(),
    );
    app.oneshot(req).await.unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(
        spans[0].span_context.trace_id(),
        TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
    );
    assert_eq!(
        spans[0].parent_span_id,
        SpanId::from_hex("00f067aa0ba902b7").unwrap()
    );
}

#[tokio::test]
async fn malformed_upstream_header_starts_root_trace() {
    let (provider, exporter) = setup();
    let app = routes().layer(
        TraceLayer::new(provider.clone()).with_propagator(TraceContextPropagator::new()),
    );

    let mut req = request("GET", "/posts/7");
    req.headers_mut()
        .insert("traceparent", "garbage".parse().unwrap());
    app.oneshot(req).await.unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].parent_span_id, SpanId::INVALID);
    assert!(spans[0].span_context.is_valid());
}

#[tokio::test]
async fn nested_interceptor_shares_parent_provider() {
    let (outer_provider, outer_exporter) = setup();
    let (inner_provider, inner_exporter) = setup();

    let app = TraceLayer::new(outer_provider.clone()).layer(inner_app(&inner_provider));
    app.oneshot(request("GET", "/posts/1")).await.unwrap();

    assert!(inner_exporter.get_finished_spans().unwrap().is_empty());
    let spans = outer_exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 2);

    // The inner span ends first.
    let (inner, outer) = (&spans[0], &spans[1]);
    assert_eq!(inner.parent_span_id, outer.span_context.span_id());
    assert_eq!(inner.span_context.trace_id(), outer.span_context.trace_id());
    assert_eq!(inner.name, "GET /posts/{id}");
    assert_eq!(outer.name, "GET /posts/{id}");
}

#[tokio::test]
async fn handler_sees_span_context() {
    let (provider, exporter) = setup();
    let app = Router::new()
        .route(
            "/whoami",
            get(|request: Request<Body>| async move {
                assert!(request_context(&request).is_some());
                current_trace_id().unwrap_or_default()
            }),
        )
        .layer(TraceLayer::new(provider.clone()));

    let response = app.oneshot(request("GET", "/whoami")).await.unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(
        String::from_utf8(body.to_vec()).unwrap(),
        spans[0].span_context.trace_id().to_string()
    );
}

#[tokio::test]
async fn response_passes_through_unchanged() {
    let (provider, _exporter) = setup();
    let app = Router::new()
        .route(
            "/teapot",
            get(|| async {
                Response::builder()
                    .status(StatusCode::IM_A_TEAPOT)
                    .header("x-brew", "earl grey")
                    .body(Body::from("short and stout"))
                    .unwrap()
            }),
        )
        .layer(TraceLayer::new(provider.clone()));

    let response = app.oneshot(request("GET", "/teapot")).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers()["x-brew"], "earl grey");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"short and stout");
}

#[tokio::test]
async fn service_error_still_ends_span() {
    let (provider, exporter) = setup();
    let service = TraceLayer::new(provider.clone()).layer(service_fn(|_: Request<Body>| async {
        Err::<Response<Body>, std::io::Error>(std::io::Error::other("backend unavailable"))
    }));

    assert!(service.oneshot(request("POST", "/jobs")).await.is_err());

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "POST route not found");
}

#[tokio::test]
async fn panicking_handler_still_ends_span() {
    let (provider, exporter) = setup();
    let app = Router::new()
        .route(
            "/panic",
            get(|| async {
                if std::hint::black_box(true) {
                    panic!("handler exploded");
                }
                StatusCode::OK
            }),
        )
        .layer(TraceLayer::new(provider.clone()));

    let joined = tokio::spawn(app.oneshot(request("GET", "/panic"))).await;
    assert!(joined.unwrap_err().is_panic());

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "GET /panic");
    assert_eq!(spans[0].status, Status::error(""));
    assert_eq!(attr(&spans[0], "http.status_code"), Some(&Value::I64(500)));
}

#[tokio::test]
async fn dropped_request_still_ends_span() {
    let (provider, exporter) = setup();
    let app = Router::new()
        .route(
            "/slow",
            get(|| async {
                std::future::pending::<()>().await;
                StatusCode::OK
            }),
        )
        .layer(TraceLayer::new(provider.clone()));

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        app.oneshot(request("GET", "/slow")),
    )
    .await;
    assert!(timed_out.is_err());

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "GET /slow");
}

#[tokio::test]
async fn concurrent_requests_get_separate_spans() {
    let (provider, exporter) = setup();
    let app = inner_app(&provider);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move { app.oneshot(request("GET", &format!("/posts/{i}"))).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 16);
    let mut ids: Vec<_> = spans.iter().map(|s| s.span_context.span_id()).collect();
    ids.sort_unstable_by_key(|id| id.to_bytes());
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert!(spans.iter().all(|s| s.name == "GET /posts/{id}"));
}
