//! Error types for the risk dashboard client

use std::time::Duration;

use thiserror::Error;

use crate::envelope::SectionKey;

/// Errors raised while talking to the analytics backend or decoding its output
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed stream message: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("malformed {section} payload: {source}")]
    Payload {
        section: SectionKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("quote unavailable: {0}")]
    Quote(String),

    #[error("stream closed before completion")]
    StreamClosed,

    #[error("event stream line or event exceeds {0} bytes")]
    FrameTooLarge(usize),

    #[error("no event received within {0:?}")]
    IdleTimeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
