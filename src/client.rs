//! Thin HTTP layer over the analytics backend

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};

static TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9.\-^=]{1,15}$").expect("ticker pattern is valid"));

/// Validate and normalize a ticker before it is placed in a URL.
pub fn normalize_ticker(ticker: &str) -> Result<String> {
    let trimmed = ticker.trim();
    if !TICKER_RE.is_match(trimmed) || trimmed.chars().all(|c| c == '.') {
        return Err(DashboardError::InvalidTicker(ticker.to_string()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Shared HTTP client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        // No overall timeout on the client itself: the risk stream is long-lived.
        let http = Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self::with_client(http, base_url, request_timeout))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        Self::new(config.backend.base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and decode a JSON body, failing on non-2xx statuses.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let resp = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Open a `text/event-stream` response. No request timeout applies.
    pub async fn get_event_stream(&self, path: &str) -> Result<Response> {
        let url = self.url(path);
        debug!("GET {} (event stream)", url);
        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await?;
        ensure_success(resp).await
    }
}

/// Turn a non-2xx response into [`DashboardError::Status`] carrying its body.
pub async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DashboardError::Status { status, body })
}
