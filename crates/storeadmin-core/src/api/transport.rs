//! The seam between the pipeline and the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::error::TransportError;
use super::request::{ApiRequest, ApiResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return whatever status the server answered with.
    /// Only failures to get a response at all are errors.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// HTTP transport backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(url = %url, status = status.as_u16(), "Response received");

        Ok(ApiResponse { status, body })
    }
}
