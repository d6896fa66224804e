//! Decoding of the `{ "type": ..., "data": ... }` envelope carried by each
//! risk-stream event.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DashboardError, Result};
use crate::models::{AnomalyRisk, EsgRisk, NewsFeed, NewsSentiment, OverallRisk, QuantitativeRisk};

/// One analysis category of the risk stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKey {
    NewsArticles,
    NewsSentiment,
    QuantitativeRisk,
    EsgRisk,
    AnomalyRisk,
    OverallRisk,
}

impl SectionKey {
    pub const ALL: [SectionKey; 6] = [
        SectionKey::NewsArticles,
        SectionKey::NewsSentiment,
        SectionKey::QuantitativeRisk,
        SectionKey::EsgRisk,
        SectionKey::AnomalyRisk,
        SectionKey::OverallRisk,
    ];

    /// Discriminator used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            SectionKey::NewsArticles => "news_articles",
            SectionKey::NewsSentiment => "news_sentiment",
            SectionKey::QuantitativeRisk => "quantitative_risk",
            SectionKey::EsgRisk => "esg_risk",
            SectionKey::AnomalyRisk => "anomaly_risk",
            SectionKey::OverallRisk => "overall_risk",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SectionKey::NewsArticles => "News",
            SectionKey::NewsSentiment => "Sentiment",
            SectionKey::QuantitativeRisk => "Quantitative risk",
            SectionKey::EsgRisk => "ESG risk",
            SectionKey::AnomalyRisk => "Anomalies",
            SectionKey::OverallRisk => "Overall risk",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for SectionKey {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SectionKey::ALL
            .into_iter()
            .find(|key| key.wire_name() == s)
            .ok_or(())
    }
}

/// A decoded stream message. Section variants carry `None` when the
/// backend sent the type with no data.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    NewsArticles(Option<NewsFeed>),
    NewsSentiment(Option<NewsSentiment>),
    QuantitativeRisk(Option<QuantitativeRisk>),
    EsgRisk(Option<EsgRisk>),
    AnomalyRisk(Option<AnomalyRisk>),
    OverallRisk(Option<OverallRisk>),
    Complete,
    Unknown(String),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
}

impl StreamMessage {
    /// Decode the JSON text of one event's `data` field.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(DashboardError::Envelope)?;

        if raw.kind == "complete" {
            return Ok(StreamMessage::Complete);
        }

        let Ok(key) = raw.kind.parse::<SectionKey>() else {
            return Ok(StreamMessage::Unknown(raw.kind));
        };

        let data = raw.data;
        let message = match key {
            SectionKey::NewsArticles => StreamMessage::NewsArticles(payload(key, data)?),
            SectionKey::NewsSentiment => StreamMessage::NewsSentiment(payload(key, data)?),
            SectionKey::QuantitativeRisk => StreamMessage::QuantitativeRisk(payload(key, data)?),
            SectionKey::EsgRisk => StreamMessage::EsgRisk(payload(key, data)?),
            SectionKey::AnomalyRisk => StreamMessage::AnomalyRisk(payload(key, data)?),
            SectionKey::OverallRisk => StreamMessage::OverallRisk(payload(key, data)?),
        };
        Ok(message)
    }

    /// Section this message fills, if any.
    pub fn section(&self) -> Option<SectionKey> {
        match self {
            StreamMessage::NewsArticles(_) => Some(SectionKey::NewsArticles),
            StreamMessage::NewsSentiment(_) => Some(SectionKey::NewsSentiment),
            StreamMessage::QuantitativeRisk(_) => Some(SectionKey::QuantitativeRisk),
            StreamMessage::EsgRisk(_) => Some(SectionKey::EsgRisk),
            StreamMessage::AnomalyRisk(_) => Some(SectionKey::AnomalyRisk),
            StreamMessage::OverallRisk(_) => Some(SectionKey::OverallRisk),
            StreamMessage::Complete | StreamMessage::Unknown(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamMessage::Complete)
    }
}

fn payload<T: DeserializeOwned>(section: SectionKey, data: Option<Value>) -> Result<Option<T>> {
    match data {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| DashboardError::Payload { section, source }),
    }
}
