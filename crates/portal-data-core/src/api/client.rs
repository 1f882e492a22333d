//! Data client for communicating with the portal JSON API.
//!
//! This module provides the `DataClient` struct that every page module uses to
//! read and write server state. It applies the response cache policy, reuses
//! stale entries on `304 Not Modified`, clears the cache on every successful
//! write and charges each network attempt to the current route.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use super::{ApiError, ReqwestTransport, RequestOptions, Transport, TransportRequest};
use crate::cache::{CacheKey, CacheStore};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::perf::PerfCounter;

// ============================================================================
// Constants
// ============================================================================

/// Status returned when a conditional request found the resource unchanged.
const STATUS_NOT_MODIFIED: u16 = 304;

/// Route charged for requests issued before any navigation.
const INITIAL_ROUTE: &str = "/";

struct ClientState {
    transport: Arc<dyn Transport>,
    cache: CacheStore,
    perf: PerfCounter,
    config: ClientConfig,
    route: Mutex<String>,
}

/// Cached, instrumented access to the portal API.
/// Clone is cheap - clones share the same cache, counters and transport.
#[derive(Clone)]
pub struct DataClient {
    state: Arc<ClientState>,
}

pub struct DataClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl DataClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the client, creating a `reqwest` transport if none was supplied.
    pub fn build(self) -> Result<DataClient, ApiError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.config.request_timeout_secs)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        Ok(DataClient {
            state: Arc::new(ClientState {
                transport,
                cache: CacheStore::new(Arc::clone(&clock)),
                perf: PerfCounter::new(clock, self.config.debug_requests),
                config: self.config,
                route: Mutex::new(INITIAL_ROUTE.to_string()),
            }),
        })
    }
}

impl DataClient {
    pub fn builder() -> DataClientBuilder {
        DataClientBuilder {
            config: ClientConfig::default(),
            transport: None,
            clock: None,
        }
    }

    /// Client over HTTP with the system clock.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.state.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.state.cache
    }

    pub fn perf(&self) -> &PerfCounter {
        &self.state.perf
    }

    fn route_slot(&self) -> MutexGuard<'_, String> {
        self.state.route.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route that subsequent network requests are charged to.
    pub fn set_route(&self, pathname: &str) {
        *self.route_slot() = pathname.to_string();
    }

    pub fn current_route(&self) -> String {
        self.route_slot().clone()
    }

    /// Drop every cached response, e.g. after sign-out.
    pub fn invalidate_all(&self) {
        self.state.cache.clear();
    }

    // ===== Dispatch =====

    /// Issue one API call and return its parsed JSON body.
    ///
    /// Cacheable GETs (`cache_ttl_ms > 0`) are answered from the cache while
    /// fresh. A `304` reuses whatever entry exists for the key regardless of
    /// age. Bodies that are not JSON become `{}`. Any successful non-GET
    /// clears the entire cache. Nothing is retried.
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let method = options.method.to_ascii_uppercase();
        let key = options
            .cache_key
            .clone()
            .unwrap_or_else(|| CacheKey::derive(&method, url));
        let is_get = method == "GET";
        let cacheable = is_get && options.cache_ttl_ms > 0;

        if cacheable {
            if let Some(payload) = self.state.cache.get_fresh(&key, options.cache_ttl_ms) {
                debug!(key = %key, "Cache hit");
                return Ok(payload);
            }
            debug!(key = %key, "Cache miss");
        }

        let request = self.prepare(&method, url, &options)?;

        // Attempts are counted, not just successes
        let route = self.current_route();
        self.state.perf.record(&route);

        let response = self.state.transport.send(request).await?;

        if response.status == STATUS_NOT_MODIFIED {
            return Ok(self.reuse_not_modified(key));
        }

        let payload = parse_body(&response.body, url);

        if !(200..=299).contains(&response.status) {
            return Err(ApiError::from_status(response.status, &payload));
        }

        if cacheable {
            self.state.cache.set(key, payload.clone());
        } else if !is_get {
            self.state.cache.clear();
        }

        Ok(payload)
    }

    /// Speculative read that never fails.
    ///
    /// Uses the configured default TTL when the options carry none, and turns
    /// every error into `None`. A success status with a body that is not JSON
    /// is still a success and yields `Some({})`; only transport failures and
    /// failure statuses (whatever their body) yield `None`.
    pub async fn prefetch(&self, url: &str, mut options: RequestOptions) -> Option<Value> {
        if options.cache_ttl_ms == 0 {
            options.cache_ttl_ms = self.state.config.default_prefetch_ttl_ms;
        }

        match self.request(url, options).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(url = url, error = %e, "Prefetch failed");
                None
            }
        }
    }

    /// Re-stamp and return the prior entry for `key`, or `null` if there is none.
    fn reuse_not_modified(&self, key: CacheKey) -> Value {
        match self.state.cache.get(&key) {
            Some(entry) => {
                debug!(key = %key, "Not modified, reusing cached payload");
                self.state.cache.set(key, entry.payload.clone());
                entry.payload
            }
            None => {
                debug!(key = %key, "Not modified with no cached payload");
                Value::Null
            }
        }
    }

    fn prepare(
        &self,
        method: &str,
        url: &str,
        options: &RequestOptions,
    ) -> Result<TransportRequest, ApiError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ApiError::InvalidRequest(format!("unsupported method {}", method)))?;

        let body = match &options.body {
            Some(body) => Some(
                serde_json::to_vec(body)
                    .map_err(|e| ApiError::InvalidRequest(format!("unserializable body: {}", e)))?,
            ),
            None => None,
        };

        Ok(TransportRequest {
            method,
            url: self.resolve_url(url)?,
            headers: merge_headers(&options.headers)?,
            body,
            with_credentials: true,
        })
    }

    fn resolve_url(&self, url: &str) -> Result<String, ApiError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        if !url.starts_with('/') {
            return Err(ApiError::InvalidUrl(url.to_string()));
        }

        match self.state.config.base_url.as_deref() {
            Some(base) => Ok(format!("{}{}", base.trim_end_matches('/'), url)),
            None => Err(ApiError::InvalidUrl(format!(
                "{} (relative URL with no base URL configured)",
                url
            ))),
        }
    }
}

/// JSON content type plus caller headers; the caller wins on conflict.
fn merge_headers(extra: &[(String, String)]) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ApiError::InvalidRequest(format!("invalid header name {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ApiError::InvalidRequest(format!("invalid value for header {}", name)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Parse a response body, treating anything that is not JSON as `{}`.
fn parse_body(body: &str, url: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(url = url, error = %e, "Response body is not JSON, using empty object");
            Value::Object(Default::default())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{ScriptedTransport, BASE_URL};
    use crate::clock::ManualClock;
    use serde_json::json;
    use tokio::sync::Barrier;

    fn setup() -> (DataClient, Arc<ScriptedTransport>, Arc<ManualClock>) {
        setup_with(ScriptedTransport::new())
    }

    fn setup_with(
        transport: ScriptedTransport,
    ) -> (DataClient, Arc<ScriptedTransport>, Arc<ManualClock>) {
        let transport = Arc::new(transport);
        let clock = Arc::new(ManualClock::new(0));
        let client = DataClient::builder()
            .base_url(BASE_URL)
            .transport(transport.clone())
            .clock(clock.clone())
            .build()
            .expect("client builds");
        (client, transport, clock)
    }

    #[tokio::test]
    async fn test_cached_get_within_ttl_hits_network_once() {
        let (client, transport, clock) = setup();
        transport.reply("GET", "/api/widgets", 200, r#"{"items": [1, 2]}"#);

        let first = client
            .request("/api/widgets", RequestOptions::get().ttl_ms(20_000))
            .await
            .unwrap();
        clock.set(10_000);
        let second = client
            .request("/api/widgets", RequestOptions::get().ttl_ms(20_000))
            .await
            .unwrap();

        assert_eq!(first, json!({"items": [1, 2]}));
        assert_eq!(second, first);
        assert_eq!(transport.calls("GET", "/api/widgets"), 1);

        clock.set(25_000);
        client
            .request("/api/widgets", RequestOptions::get().ttl_ms(20_000))
            .await
            .unwrap();
        assert_eq!(transport.calls("GET", "/api/widgets"), 2);
    }

    #[tokio::test]
    async fn test_max_ttl_is_served_from_cache() {
        let (client, transport, clock) = setup();

        client
            .request("/api/widgets", RequestOptions::get().ttl_ms(u64::MAX))
            .await
            .unwrap();
        client
            .request("/api/widgets", RequestOptions::get().ttl_ms(u64::MAX))
            .await
            .unwrap();
        clock.set(365 * 86_400_000);
        client
            .request("/api/widgets", RequestOptions::get().ttl_ms(u64::MAX))
            .await
            .unwrap();

        assert_eq!(transport.calls("GET", "/api/widgets"), 1);
    }

    #[test]
    fn test_new_builds_http_client() {
        let client = DataClient::new(ClientConfig::default()).expect("client builds");
        assert!(client.cache().is_empty());
        assert_eq!(client.current_route(), "/");
    }

    #[tokio::test]
    async fn test_cache_hit_is_not_counted() {
        let (client, _transport, _clock) = setup();
        client.set_route("/employees");

        for _ in 0..3 {
            client
                .request("/api/employees", RequestOptions::get().ttl_ms(30_000))
                .await
                .unwrap();
        }

        assert_eq!(client.perf().requests_for("/employees"), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_cached() {
        let (client, transport, _clock) = setup();

        client.request("/api/me", RequestOptions::get()).await.unwrap();
        client.request("/api/me", RequestOptions::get()).await.unwrap();

        assert_eq!(transport.calls("GET", "/api/me"), 2);
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_lowercase_get_is_cacheable() {
        let (client, transport, _clock) = setup();
        let opts = RequestOptions::get().method("get").ttl_ms(10_000);

        client.request("/api/shifts", opts.clone()).await.unwrap();
        client.request("/api/shifts", opts).await.unwrap();

        assert_eq!(transport.calls("GET", "/api/shifts"), 1);
    }

    #[tokio::test]
    async fn test_write_clears_every_cached_read() {
        let (client, transport, _clock) = setup();
        let cached = || RequestOptions::get().ttl_ms(30_000);

        client.request("/api/a", cached()).await.unwrap();
        client.request("/api/b", cached()).await.unwrap();
        assert_eq!(client.cache().len(), 2);

        client
            .request("/api/widgets", RequestOptions::post(json!({"name": "gear"})))
            .await
            .unwrap();
        assert!(client.cache().is_empty());

        client.request("/api/a", cached()).await.unwrap();
        client.request("/api/b", cached()).await.unwrap();
        assert_eq!(transport.calls("GET", "/api/a"), 2);
        assert_eq!(transport.calls("GET", "/api/b"), 2);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cache() {
        let (client, transport, _clock) = setup();
        client
            .request("/api/a", RequestOptions::get().ttl_ms(30_000))
            .await
            .unwrap();
        transport.reply("DELETE", "/api/widgets/4", 403, r#"{"error": "Forbidden"}"#);

        let err = client
            .request("/api/widgets/4", RequestOptions::delete())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert_eq!(client.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_not_modified_reuses_expired_entry() {
        let (client, transport, clock) = setup();
        transport.reply("GET", "/api/roles", 200, r#"{"roles": ["lead"]}"#);
        transport.reply("GET", "/api/roles", 304, "");

        client
            .request("/api/roles", RequestOptions::get().ttl_ms(1_000))
            .await
            .unwrap();

        clock.set(60_000);
        let reused = client
            .request("/api/roles", RequestOptions::get().ttl_ms(1_000))
            .await
            .unwrap();

        assert_eq!(reused, json!({"roles": ["lead"]}));
        assert_eq!(transport.calls("GET", "/api/roles"), 2);

        // Re-stamped as freshly retrieved
        let key = CacheKey::derive("GET", "/api/roles");
        assert_eq!(client.cache().get(&key).unwrap().stored_at_ms, 60_000);
    }

    #[tokio::test]
    async fn test_not_modified_without_entry_is_null() {
        let (client, transport, _clock) = setup();
        transport.reply("GET", "/api/roles", 304, "");

        let result = client
            .request("/api/roles", RequestOptions::get().ttl_ms(1_000))
            .await
            .unwrap();

        assert_eq!(result, Value::Null);
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_becomes_empty_object() {
        let (client, transport, _clock) = setup();
        transport.reply("GET", "/api/report", 200, "<html>oops</html>");
        transport.reply("GET", "/api/empty", 200, "");

        let report = client.request("/api/report", RequestOptions::get()).await.unwrap();
        let empty = client.request("/api/empty", RequestOptions::get()).await.unwrap();

        assert_eq!(report, json!({}));
        assert_eq!(empty, json!({}));
    }

    #[tokio::test]
    async fn test_http_failure_carries_server_message() {
        let (client, transport, _clock) = setup();
        transport.reply("POST", "/api/shifts", 409, r#"{"error": "Shift overlaps"}"#);
        transport.reply("GET", "/api/shifts", 502, "Bad Gateway");

        let conflict = client
            .request("/api/shifts", RequestOptions::post(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            conflict,
            ApiError::RequestFailed { status: 409, ref message } if message == "Shift overlaps"
        ));

        let gateway = client
            .request("/api/shifts", RequestOptions::get().ttl_ms(5_000))
            .await
            .unwrap_err();
        assert_eq!(gateway.to_string(), "Request failed: 502");
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_propagates_and_is_counted() {
        let (client, transport, _clock) = setup();
        transport.fail("GET", "/api/me", "offline");

        let err = client.request("/api/me", RequestOptions::get()).await.unwrap_err();

        assert!(err.is_network_failure());
        assert_eq!(client.perf().requests_for("/"), 1);
    }

    #[tokio::test]
    async fn test_no_implicit_retry() {
        let (client, transport, _clock) = setup();
        transport.reply("GET", "/api/me", 503, "{}");

        assert!(client.request("/api/me", RequestOptions::get()).await.is_err());
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_prefetch_swallows_every_failure() {
        let (client, transport, _clock) = setup();
        transport.fail("GET", "/api/a", "offline");
        transport.reply("GET", "/api/b", 500, r#"{"error": "boom"}"#);
        transport.reply("GET", "/api/c", 200, "not json");

        assert_eq!(client.prefetch("/api/a", RequestOptions::get()).await, None);
        assert_eq!(client.prefetch("/api/b", RequestOptions::get()).await, None);
        // A 2xx body that is not JSON is an empty success, not a failure
        assert_eq!(
            client.prefetch("/api/c", RequestOptions::get()).await,
            Some(json!({}))
        );
        assert_eq!(client.prefetch("relative/path", RequestOptions::get()).await, None);
    }

    #[tokio::test]
    async fn test_prefetch_populates_cache_with_default_ttl() {
        let (client, transport, clock) = setup();

        client.prefetch("/api/employees", RequestOptions::get()).await;
        clock.set(29_000);
        client
            .request("/api/employees", RequestOptions::get().ttl_ms(30_000))
            .await
            .unwrap();

        assert_eq!(transport.calls("GET", "/api/employees"), 1);
    }

    #[tokio::test]
    async fn test_headers_merged_caller_wins() {
        let (client, transport, _clock) = setup();

        client
            .request(
                "/api/upload",
                RequestOptions::post(json!({"a": 1}))
                    .header("Content-Type", "application/merge-patch+json")
                    .header("X-Trace", "abc"),
            )
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.headers[header::CONTENT_TYPE], "application/merge-patch+json");
        assert_eq!(sent.headers["x-trace"], "abc");
        assert!(sent.with_credentials);
        assert_eq!(sent.body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
    }

    #[tokio::test]
    async fn test_default_content_type_is_json() {
        let (client, transport, _clock) = setup();
        client.request("/api/me", RequestOptions::get()).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(sent.url, format!("{}/api/me", BASE_URL));
        assert_eq!(sent.method, Method::GET);
    }

    #[tokio::test]
    async fn test_custom_cache_key_collapses_variants() {
        let (client, transport, _clock) = setup();
        let opts = || RequestOptions::get().ttl_ms(30_000).cache_key("employees:list");

        client.request("/api/employees?page=1", opts()).await.unwrap();
        let second = client.request("/api/employees?page=2", opts()).await.unwrap();

        assert_eq!(transport.total_calls(), 1);
        assert_eq!(second, json!({"path": "/api/employees?page=1"}));
    }

    #[tokio::test]
    async fn test_relative_url_without_base_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = DataClient::builder()
            .transport(transport.clone())
            .clock(Arc::new(ManualClock::new(0)))
            .build()
            .unwrap();

        let err = client.request("/api/me", RequestOptions::get()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_header_rejected_before_send() {
        let (client, transport, _clock) = setup();
        let err = client
            .request("/api/me", RequestOptions::get().header("bad header", "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_requests_charged_to_current_route() {
        let (client, _transport, _clock) = setup();

        client.request("/api/me", RequestOptions::get()).await.unwrap();
        client.set_route("/schedule");
        client.request("/api/shifts", RequestOptions::get()).await.unwrap();
        client.request("/api/locations", RequestOptions::get()).await.unwrap();

        assert_eq!(client.current_route(), "/schedule");
        assert_eq!(client.perf().requests_for("/"), 1);
        assert_eq!(client.perf().requests_for("/schedule"), 2);
    }

    #[tokio::test]
    async fn test_concurrent_identical_reads_both_miss() {
        let barrier = Arc::new(Barrier::new(2));
        let (client, transport, _clock) = setup_with(ScriptedTransport::gated(barrier));
        transport.reply("GET", "/api/shifts", 200, r#"{"v": 1}"#);
        transport.reply("GET", "/api/shifts", 200, r#"{"v": 2}"#);

        let opts = || RequestOptions::get().ttl_ms(30_000);
        let (a, b) = tokio::join!(
            client.request("/api/shifts", opts()),
            client.request("/api/shifts", opts()),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(transport.calls("GET", "/api/shifts"), 2);

        // Last writer wins the slot
        let cached = client
            .cache()
            .get(&CacheKey::derive("GET", "/api/shifts"))
            .unwrap()
            .payload;
        assert!(cached == json!({"v": 1}) || cached == json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (client, transport, _clock) = setup();
        let other = client.clone();

        client
            .request("/api/me", RequestOptions::get().ttl_ms(5_000))
            .await
            .unwrap();
        other
            .request("/api/me", RequestOptions::get().ttl_ms(5_000))
            .await
            .unwrap();

        assert_eq!(transport.total_calls(), 1);
        other.invalidate_all();
        assert!(client.cache().is_empty());
    }
}
