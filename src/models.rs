//! Payload types streamed by the risk-analysis backend
//!
//! Every type here is a plain value object: the backend owns the numbers,
//! this crate only deserializes, stores the latest one per section and
//! renders it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Payload of `news_articles`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsFeed {
    #[serde(deserialize_with = "deserialize_articles")]
    pub articles: Vec<NewsArticle>,
}

// The backend has shipped both a bare array and an `{"articles": [...]}`
// wrapper for this payload.
fn deserialize_articles<'de, D>(deserializer: D) -> Result<Vec<NewsArticle>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Array(_) => serde_json::from_value(v).map_err(D::Error::custom),
        Value::Object(mut map) => match map.remove("articles") {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(inner) => serde_json::from_value(inner).map_err(D::Error::custom),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(D::Error::custom(format!(
            "expected article list, found {}",
            other
        ))),
    }
}

/// Payload of `news_sentiment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSentiment {
    pub sentiment_score: f64,
    pub sentiment_label: String,
    #[serde(default)]
    pub article_count: Option<u32>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Payload of `quantitative_risk`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuantitativeRisk {
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub sharpe_ratio: Option<f64>,
    #[serde(default)]
    pub max_drawdown: Option<f64>,
    #[serde(default)]
    pub value_at_risk: Option<f64>,
    #[serde(default)]
    pub risk_score: Option<f64>,
}

/// Payload of `esg_risk`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EsgRisk {
    #[serde(default)]
    pub environmental_score: Option<f64>,
    #[serde(default)]
    pub social_score: Option<f64>,
    #[serde(default)]
    pub governance_score: Option<f64>,
    #[serde(default, alias = "total_score")]
    pub total_esg_score: Option<f64>,
    #[serde(default, alias = "risk_level")]
    pub esg_risk_level: Option<RiskLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(default)]
    pub date: Option<String>,
    pub description: String,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Payload of `anomaly_risk`. An empty list is a valid answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnomalyRisk {
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
    #[serde(default)]
    pub anomaly_score: Option<f64>,
}

/// Payload of `overall_risk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallRisk {
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Risk label attached by the backend to overall and ESG scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
    Other(String),
}

impl From<String> for RiskLevel {
    fn from(label: String) -> Self {
        match label.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "low" => RiskLevel::Low,
            "moderate" | "medium" => RiskLevel::Moderate,
            "high" => RiskLevel::High,
            "very high" | "veryhigh" | "severe" => RiskLevel::VeryHigh,
            _ => RiskLevel::Other(label),
        }
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        level.to_string()
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => f.write_str("Low"),
            RiskLevel::Moderate => f.write_str("Moderate"),
            RiskLevel::High => f.write_str("High"),
            RiskLevel::VeryHigh => f.write_str("Very High"),
            RiskLevel::Other(label) => f.write_str(label),
        }
    }
}

/// Latest fast quote for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub last_price: f64,
    #[serde(default)]
    pub prev_close: Option<f64>,
    #[serde(default)]
    pub currency: String,
    #[serde(skip)]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl PriceSnapshot {
    pub fn new(last_price: f64, prev_close: Option<f64>, currency: impl Into<String>) -> Self {
        Self {
            last_price,
            prev_close,
            currency: currency.into(),
            fetched_at: None,
        }
    }

    /// Absolute and percentage change versus the previous close, if known.
    pub fn change(&self) -> Option<(f64, f64)> {
        let prev = self.prev_close?;
        if prev == 0.0 {
            return None;
        }
        let delta = self.last_price - prev;
        Some((delta, delta / prev * 100.0))
    }
}
