//! The fetch primitive the dispatcher sends requests through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};

use super::ApiError;

/// A fully prepared request: absolute URL, merged headers, serialized body.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Send cookies/credentials with the request.
    pub with_credentials: bool,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ApiError>;
}

/// HTTP transport over `reqwest`.
///
/// Requests flagged `with_credentials` go through a client wired to the shared
/// cookie jar; the others use a client that neither sends nor stores cookies.
/// Clone is cheap - reqwest::Client and the jar are both behind Arc.
#[derive(Clone)]
pub struct ReqwestTransport {
    credentialed: Client,
    anonymous: Client,
    cookies: Arc<Jar>,
}

impl ReqwestTransport {
    pub fn new(timeout_secs: u64) -> Result<Self, ApiError> {
        let cookies = Arc::new(Jar::default());
        let timeout = Duration::from_secs(timeout_secs);

        let credentialed = Client::builder()
            .timeout(timeout)
            .cookie_provider(Arc::clone(&cookies))
            .build()?;
        let anonymous = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            credentialed,
            anonymous,
            cookies,
        })
    }

    /// Cookie jar shared by every credentialed request.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookies
    }

    fn client_for(&self, with_credentials: bool) -> &Client {
        if with_credentials {
            &self.credentialed
        } else {
            &self.anonymous
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ApiError> {
        let mut builder = self
            .client_for(request.with_credentials)
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}
