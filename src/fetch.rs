use std::future::Future;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::CrawlConfig;

/// Single-attempt page retrieval.
pub trait Fetch: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(cfg: &CrawlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(cfg.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn get(&self, url: &str) -> Result<String> {
        let start = Instant::now();
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("GET {}", url))?
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        debug!("GET {} ({} bytes, {}ms)", url, body.len(), start.elapsed().as_millis());
        Ok(body)
    }
}
