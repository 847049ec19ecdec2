//! Boundary to the watched HTTP endpoints.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::time::Duration;

/// Raw response captured from a watched endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    pub body: Vec<u8>,
    pub status: u16,
}

impl CapturedResponse {
    pub const SUCCESS_STATUS: u16 = 200;

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS_STATUS
    }
}

/// Performs one GET against a watched endpoint. Non-200 statuses are returned
/// as regular responses; only transport failures are errors.
pub trait EndpointFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<CapturedResponse>>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP fetch client")?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<CapturedResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read response body from {url}"))?;

        tracing::debug!(url, status, bytes = body.len(), "endpoint responded");

        Ok(CapturedResponse {
            body: body.to_vec(),
            status,
        })
    }
}

impl EndpointFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<CapturedResponse>> {
        Box::pin(self.get(url))
    }
}
