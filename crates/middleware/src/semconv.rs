//! Attribute keys and values from the OpenTelemetry semantic conventions.
//!
//! Keys follow schema version 1.10.0, the revision the span names and status
//! mapping in this crate are aligned with.

/// Schema URL reported with the instrumentation scope.
pub const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.10.0";

/// HTTP server attributes
pub mod http {
    /// Request method, e.g. `GET`
    pub const METHOD: &str = "http.method";
    /// Request target: path and query
    pub const TARGET: &str = "http.target";
    /// Matched route template, e.g. `/posts/{id}`
    pub const ROUTE: &str = "http.route";
    /// URI scheme, `http` or `https`
    pub const SCHEME: &str = "http.scheme";
    /// Protocol version, e.g. `1.1`
    pub const FLAVOR: &str = "http.flavor";
    /// Value of the `Host` header
    pub const HOST: &str = "http.host";
    /// Configured server name
    pub const SERVER_NAME: &str = "http.server_name";
    pub const USER_AGENT: &str = "http.user_agent";
    /// Originating client address from `X-Forwarded-For`
    pub const CLIENT_IP: &str = "http.client_ip";
    pub const REQUEST_CONTENT_LENGTH: &str = "http.request_content_length";
    /// Final response status code
    pub const STATUS_CODE: &str = "http.status_code";
}

/// Network attributes
pub mod net {
    pub const TRANSPORT: &str = "net.transport";
    pub const PEER_IP: &str = "net.peer.ip";
    pub const PEER_PORT: &str = "net.peer.port";
    pub const HOST_IP: &str = "net.host.ip";
    pub const HOST_NAME: &str = "net.host.name";
    pub const HOST_PORT: &str = "net.host.port";

    /// `net.transport` value for TCP
    pub const TRANSPORT_TCP: &str = "ip_tcp";
}

/// End-user attributes
pub mod enduser {
    pub const ID: &str = "enduser.id";
}
