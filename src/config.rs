use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};

/// Configuration for the dashboard client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Analytics backend
    pub backend: BackendConfig,

    /// Risk stream behaviour
    pub stream: StreamConfig,

    /// Price polling
    pub poller: PollerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the analytics service, without trailing slash
    pub base_url: String,

    /// Timeout for plain request/response calls. Not applied to the stream.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Fail the stream when nothing arrives for this long. `None` waits forever.
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSourceKind {
    Backend,
    Yahoo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between fast-quote refreshes
    pub interval_secs: u64,

    /// Where fast quotes come from
    pub source: QuoteSourceKind,

    /// Base URL of the Yahoo Finance quote API
    pub yahoo_base_url: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:8000".to_string(),
                request_timeout_secs: 10,
            },
            stream: StreamConfig {
                idle_timeout_secs: None,
            },
            poller: PollerConfig {
                interval_secs: 30,
                source: QuoteSourceKind::Backend,
                yahoo_base_url: "https://query1.finance.yahoo.com".to_string(),
            },
        }
    }
}

impl DashboardConfig {
    /// Load configuration from the environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DASHBOARD_BACKEND_URL") {
            config.backend.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(secs) = lookup("DASHBOARD_REQUEST_TIMEOUT_SECS") {
            config.backend.request_timeout_secs = parse_secs("DASHBOARD_REQUEST_TIMEOUT_SECS", &secs)?;
        }

        if let Some(secs) = lookup("DASHBOARD_STREAM_IDLE_TIMEOUT_SECS") {
            config.stream.idle_timeout_secs = match secs.trim() {
                "" | "0" | "none" => None,
                other => Some(parse_secs("DASHBOARD_STREAM_IDLE_TIMEOUT_SECS", other)?),
            };
        }

        if let Some(secs) = lookup("DASHBOARD_POLL_INTERVAL_SECS") {
            let secs = parse_secs("DASHBOARD_POLL_INTERVAL_SECS", &secs)?;
            if secs == 0 {
                return Err(DashboardError::Config(
                    "DASHBOARD_POLL_INTERVAL_SECS must be greater than zero".to_string(),
                ));
            }
            config.poller.interval_secs = secs;
        }

        if let Some(source) = lookup("DASHBOARD_QUOTE_SOURCE") {
            config.poller.source = match source.trim().to_ascii_lowercase().as_str() {
                "backend" => QuoteSourceKind::Backend,
                "yahoo" => QuoteSourceKind::Yahoo,
                other => {
                    return Err(DashboardError::Config(format!(
                        "DASHBOARD_QUOTE_SOURCE must be 'backend' or 'yahoo', got {:?}",
                        other
                    )))
                }
            };
        }

        if let Some(url) = lookup("DASHBOARD_YAHOO_URL") {
            config.poller.yahoo_base_url = url.trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.stream.idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poller.interval_secs)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| DashboardError::Config(format!("{} must be a whole number of seconds, got {:?}", key, value)))
}
