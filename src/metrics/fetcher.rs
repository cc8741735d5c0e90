use crate::{LabelerError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// Source of raw exposition-format text.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch(&self) -> Result<Bytes>;
}

/// Scrapes the node exporter over loopback HTTP.
pub struct MetricFetcher {
    client: reqwest::Client,
    url: String,
}

impl MetricFetcher {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LabelerError::FetchError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MetricSource for MetricFetcher {
    async fn fetch(&self) -> Result<Bytes> {
        debug!("Fetching metrics from {}", self.url);

        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LabelerError::FetchError(format!("GET {} failed: {}", self.url, e)))?;

        let status = resp.status();
        // Drain the body on every path so the connection goes back to the pool.
        let body = resp.bytes().await;

        if !status.is_success() {
            return Err(LabelerError::UpstreamStatus {
                status: status.to_string(),
            });
        }

        body.map_err(|e| {
            LabelerError::FetchError(format!("reading body from {} failed: {}", self.url, e))
        })
    }
}
