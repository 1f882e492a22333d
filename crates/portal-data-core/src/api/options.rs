use serde_json::Value;

use crate::cache::CacheKey;

/// Per-call options for [`DataClient::request`](super::DataClient::request).
///
/// A TTL of zero means the response is not cached.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: String,
    pub cache_ttl_ms: u64,
    pub cache_key: Option<CacheKey>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            cache_ttl_ms: 0,
            cache_key: None,
            headers: Vec::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self::default().method("POST").body(body)
    }

    pub fn put(body: Value) -> Self {
        Self::default().method("PUT").body(body)
    }

    pub fn patch(body: Value) -> Self {
        Self::default().method("PATCH").body(body)
    }

    pub fn delete() -> Self {
        Self::default().method("DELETE")
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.cache_ttl_ms = ttl_ms;
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(CacheKey::custom(key));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}
