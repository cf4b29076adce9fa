// src/http.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Shared client for all scrapers. One per process; clones share the pool.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("envscrape/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .gzip(true)
        .build()
        .context("building HTTP client")
}

/// GET `url` and return the body, failing on non-success status.
pub async fn get_text(client: &Client, url: &Url) -> Result<String> {
    debug!("Fetching text from {}", url);
    client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .text()
        .await
        .with_context(|| format!("Reading text from {}", url))
}
