//! Upstream HTTP client
//!
//! One reqwest client with a bounded timeout and an identifying User-Agent,
//! shared by share downloads and the upstream management API. Non-2xx
//! responses surface as errors carrying the status code; callers decide
//! whether that aborts anything.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::get_version;
use crate::model::{ApiEnvelope, Collection, Token};
use crate::parser::unwrap_transport_payload;

// ============================================================================
// URL Building
// ============================================================================

/// Builds the share download URL for a collection and token.
///
/// The same URL doubles as the user-facing subscription URL.
pub fn share_url(base_url: &str, collection: &str, token: &str) -> String {
    format!(
        "{}/share/col/{}?token={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(collection),
        token
    )
}

/// Validates and normalizes an upstream base URL.
///
/// Accepts http/https URLs only and strips any trailing slash.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url =
        Url::parse(trimmed).with_context(|| format!("Invalid Sub-Store URL: {}", trimmed))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("Sub-Store URL must be http or https: {}", trimmed);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for one upstream aggregator
pub struct SubStoreClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl SubStoreClient {
    /// Build a client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("substation/{}", get_version()))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, timeout })
    }

    /// Fetch text content from a URL
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("Fetching URL: {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                bail!("Request timed out after {}ms: {}", self.timeout.as_millis(), url)
            }
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("Failed to fetch URL: {}", url));
            }
        };

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP request failed with status {}: {}", status, url);
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {}", url))?;

        Ok(text)
    }

    /// Download a shared collection and unwrap any Base64 transport layer
    pub async fn download_share(
        &self,
        base_url: &str,
        collection: &str,
        token: &str,
    ) -> Result<String> {
        let url = share_url(base_url, collection, token);
        let body = self.fetch_text(&url).await?;
        trace!("Share download returned {} bytes", body.len());
        Ok(unwrap_transport_payload(&body))
    }

    /// List share tokens via the upstream management API
    pub async fn list_tokens(&self, base_url: &str, backend_prefix: &str) -> Result<Vec<Token>> {
        let url = api_url(base_url, backend_prefix, "tokens");
        let envelope: ApiEnvelope<Vec<Token>> = self.fetch_json(&url).await?;
        envelope.into_data()
    }

    /// List collections via the upstream management API
    pub async fn list_collections(
        &self,
        base_url: &str,
        backend_prefix: &str,
    ) -> Result<Vec<Collection>> {
        let url = api_url(base_url, backend_prefix, "collections");
        let envelope: ApiEnvelope<Vec<Collection>> = self.fetch_json(&url).await?;
        envelope.into_data()
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.fetch_text(url).await?;
        serde_json::from_str(&body).with_context(|| format!("Malformed API response from: {}", url))
    }
}

fn api_url(base_url: &str, backend_prefix: &str, route: &str) -> String {
    format!(
        "{}{}/api/{}",
        base_url.trim_end_matches('/'),
        backend_prefix,
        route
    )
}
