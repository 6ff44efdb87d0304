//! Span names and attributes derived from the HTTP exchange.
//!
//! Network and end-user attributes are known when the request arrives and go
//! on the span at start. HTTP server attributes need the matched route and the
//! final status, so they are computed from a [`RequestFacts`] snapshot once the
//! response is known.

use {
    axum::extract::ConnectInfo,
    base64::{Engine, engine::general_purpose::STANDARD},
    http::{
        HeaderMap, Method, Request, Version,
        header::{AUTHORIZATION, CONTENT_LENGTH, HOST, USER_AGENT},
    },
    opentelemetry::KeyValue,
    routespan_config::TracingConfig,
    std::net::{IpAddr, SocketAddr},
};

use crate::semconv::{enduser, http as http_attr, net};

/// Label used in the span name when no route matched.
pub const ROUTE_NOT_FOUND: &str = "route not found";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Span name: the method, followed by the route or [`ROUTE_NOT_FOUND`].
#[must_use]
pub fn span_name(method: &str, route: Option<&str>) -> String {
    let route = route.filter(|r| !r.is_empty()).unwrap_or(ROUTE_NOT_FOUND);
    format!("{method} {route}")
}

/// Request details captured at entry, used for the HTTP server attributes.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub method: Method,
    pub target: String,
    pub scheme: String,
    pub flavor: Option<&'static str>,
    pub host: Option<String>,
    pub server_name: Option<String>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    pub content_length: Option<i64>,
}

impl RequestFacts {
    pub fn from_request<B>(request: &Request<B>, config: &TracingConfig) -> Self {
        let headers = request.headers();
        let uri = request.uri();

        Self {
            method: request.method().clone(),
            target: uri
                .path_and_query()
                .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string()),
            scheme: uri.scheme_str().unwrap_or("http").to_string(),
            flavor: flavor(request.version()),
            host: host(request).map(str::to_string),
            server_name: config.server_name.clone(),
            user_agent: config
                .record_user_agent
                .then(|| header_str(headers, USER_AGENT.as_str()))
                .flatten()
                .map(str::to_string),
            client_ip: config
                .record_client_ip
                .then(|| client_ip(headers))
                .flatten()
                .map(str::to_string),
            content_length: header_str(headers, CONTENT_LENGTH.as_str())
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|len| *len > 0),
        }
    }
}

/// HTTP server attributes. An unmatched route is recorded as an empty string.
#[must_use]
pub fn server_attributes(facts: &RequestFacts, route: Option<&str>) -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new(http_attr::METHOD, facts.method.as_str().to_string()),
        KeyValue::new(http_attr::TARGET, facts.target.clone()),
        KeyValue::new(http_attr::SCHEME, facts.scheme.clone()),
        KeyValue::new(http_attr::ROUTE, route.unwrap_or_default().to_string()),
    ];

    if let Some(flavor) = facts.flavor {
        attrs.push(KeyValue::new(http_attr::FLAVOR, flavor));
    }
    let optional = [
        (http_attr::HOST, &facts.host),
        (http_attr::SERVER_NAME, &facts.server_name),
        (http_attr::USER_AGENT, &facts.user_agent),
        (http_attr::CLIENT_IP, &facts.client_ip),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            attrs.push(KeyValue::new(key, value.clone()));
        }
    }
    if let Some(len) = facts.content_length {
        attrs.push(KeyValue::new(http_attr::REQUEST_CONTENT_LENGTH, len));
    }

    attrs
}

#[must_use]
pub fn status_code_attributes(code: u16) -> Vec<KeyValue> {
    vec![KeyValue::new(http_attr::STATUS_CODE, i64::from(code))]
}

/// Transport, peer and host attributes.
///
/// The peer comes from axum's `ConnectInfo<SocketAddr>` extension and is
/// omitted when the app is not served with connect info. The host comes from
/// the `Host` header, falling back to the URI authority.
#[must_use]
pub fn network_attributes<B>(request: &Request<B>) -> Vec<KeyValue> {
    let mut attrs = vec![KeyValue::new(net::TRANSPORT, net::TRANSPORT_TCP)];

    if let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        attrs.push(KeyValue::new(net::PEER_IP, peer.ip().to_string()));
        attrs.push(KeyValue::new(net::PEER_PORT, i64::from(peer.port())));
    }

    if let Some((name, port)) = host(request).map(split_host_port) {
        if name.parse::<IpAddr>().is_ok() {
            attrs.push(KeyValue::new(net::HOST_IP, name.to_string()));
        } else if !name.is_empty() {
            attrs.push(KeyValue::new(net::HOST_NAME, name.to_string()));
        }
        if let Some(port) = port {
            attrs.push(KeyValue::new(net::HOST_PORT, i64::from(port)));
        }
    }

    attrs
}

/// `enduser.id` from HTTP basic credentials, when present and well formed.
#[must_use]
pub fn enduser_attributes(headers: &HeaderMap) -> Vec<KeyValue> {
    basic_auth_user(headers)
        .map(|user| vec![KeyValue::new(enduser::ID, user)])
        .unwrap_or_default()
}

fn basic_auth_user(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, AUTHORIZATION.as_str())?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (user, _) = credentials.split_once(':')?;
    (!user.is_empty()).then(|| user.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn host<B>(request: &Request<B>) -> Option<&str> {
    header_str(request.headers(), HOST.as_str())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .filter(|h| !h.is_empty())
}

fn client_ip(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

fn flavor(version: Version) -> Option<&'static str> {
    match version {
        Version::HTTP_09 => Some("0.9"),
        Version::HTTP_10 => Some("1.0"),
        Version::HTTP_11 => Some("1.1"),
        Version::HTTP_2 => Some("2.0"),
        Version::HTTP_3 => Some("QUIC"),
        _ => None,
    }
}

/// Split `host[:port]`, handling bracketed IPv6 literals.
fn split_host_port(host: &str) -> (&str, Option<u16>) {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((addr, tail)) => (addr, tail.strip_prefix(':').and_then(|p| p.parse().ok())),
            None => (host, None),
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') => (name, port.parse().ok()),
        _ => (host, None),
    }
}
