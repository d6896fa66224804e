//! Fast-quote sources for the price poller
//!
//! - [`BackendQuoteSource`]: the analytics backend's `/fast-quote/{ticker}`
//! - [`YahooQuoteSource`]: Yahoo Finance v7 quote endpoint

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::client::{ensure_success, normalize_ticker, BackendClient};
use crate::error::{DashboardError, Result};
use crate::models::PriceSnapshot;

/// Anything that can produce a fresh [`PriceSnapshot`] for a ticker.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, ticker: &str) -> Result<PriceSnapshot>;
}

pub struct BackendQuoteSource {
    client: BackendClient,
}

impl BackendQuoteSource {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuoteSource for BackendQuoteSource {
    async fn fetch_quote(&self, ticker: &str) -> Result<PriceSnapshot> {
        let ticker = normalize_ticker(ticker)?;
        let mut snapshot: PriceSnapshot = self
            .client
            .get_json(&format!("/fast-quote/{}", ticker))
            .await?;
        if !snapshot.last_price.is_finite() {
            return Err(DashboardError::Quote(format!("non-finite price for {}", ticker)));
        }
        snapshot.fetched_at = Some(Utc::now());
        Ok(snapshot)
    }
}

pub struct YahooQuoteSource {
    client: reqwest::Client,
    base_url: String,
}

impl YahooQuoteSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    async fn fetch_quote(&self, ticker: &str) -> Result<PriceSnapshot> {
        let ticker = normalize_ticker(ticker)?;
        let url = format!("{}/v7/finance/quote?symbols={}", self.base_url, ticker);
        debug!("GET {}", url);

        let resp = self.client.get(&url).send().await?;
        let json: Value = ensure_success(resp).await?.json().await?;
        let mut snapshot = snapshot_from_yahoo(&json, &ticker)?;
        snapshot.fetched_at = Some(Utc::now());
        Ok(snapshot)
    }
}

/// Pick the entry for `ticker` out of a v7 quote response.
pub fn snapshot_from_yahoo(json: &Value, ticker: &str) -> Result<PriceSnapshot> {
    let results = json["quoteResponse"]["result"]
        .as_array()
        .ok_or_else(|| DashboardError::Quote("missing quoteResponse.result".to_string()))?;

    let item = results
        .iter()
        .find(|item| {
            item["symbol"]
                .as_str()
                .is_some_and(|sym| sym.eq_ignore_ascii_case(ticker))
        })
        .ok_or_else(|| DashboardError::Quote(format!("no quote returned for {}", ticker)))?;

    let prev_close = item["regularMarketPreviousClose"].as_f64();
    let price = item["regularMarketPrice"]
        .as_f64()
        .or_else(|| item["postMarketPrice"].as_f64())
        .or(prev_close)
        .ok_or_else(|| DashboardError::Quote(format!("no price field for {}", ticker)))?;

    let currency = item["currency"].as_str().unwrap_or_default();
    Ok(PriceSnapshot::new(price, prev_close, currency))
}
