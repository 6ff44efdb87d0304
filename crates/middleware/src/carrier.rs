//! Header carriers handed to the propagation codec.

use {
    http::{HeaderMap, HeaderName, HeaderValue},
    opentelemetry::propagation::{Extractor, Injector},
};

/// Read-only view over request headers.
#[derive(Debug, Clone, Copy)]
pub struct HeaderCarrier<'a> {
    headers: &'a HeaderMap,
}

impl<'a> HeaderCarrier<'a> {
    #[must_use]
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self { headers }
    }

    /// Visit every header whose value is valid UTF-8.
    pub fn for_each(&self, mut f: impl FnMut(&str, &str)) {
        for (name, value) in self.headers {
            if let Ok(value) = value.to_str() {
                f(name.as_str(), value);
            }
        }
    }
}

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(HeaderName::as_str).collect()
    }
}

/// Mutable view over headers, for injecting context into outbound requests.
#[derive(Debug)]
pub struct HeaderCarrierMut<'a> {
    headers: &'a mut HeaderMap,
}

impl<'a> HeaderCarrierMut<'a> {
    #[must_use]
    pub fn new(headers: &'a mut HeaderMap) -> Self {
        Self { headers }
    }
}

impl Extractor for HeaderCarrierMut<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(HeaderName::as_str).collect()
    }
}

impl Injector for HeaderCarrierMut<'_> {
    /// Invalid header names or values are dropped.
    fn set(&mut self, key: &str, value: String) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) else {
            return;
        };
        self.headers.insert(name, value);
    }
}
