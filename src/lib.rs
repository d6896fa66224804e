//! Client side of the financial-advisor risk dashboard
//!
//! Two live data paths feed the dashboard:
//! - the risk-analysis event stream, folded section by section into
//!   [`RiskSections`] by [`stream`]
//! - the fast-quote poller in [`poller`], refreshing one price every 30s
//!
//! [`render`] turns either state into text.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod models;
pub mod poller;
pub mod quotes;
pub mod render;
pub mod section;
pub mod sse;
pub mod stream;

pub use client::BackendClient;
pub use config::DashboardConfig;
pub use envelope::{SectionKey, StreamMessage};
pub use error::{DashboardError, Result};
pub use models::*;
pub use poller::{PricePoller, PriceView};
pub use quotes::{BackendQuoteSource, QuoteSource, YahooQuoteSource};
pub use section::{RiskSections, SectionState, StreamEvent, StreamPhase};
pub use stream::{RiskAnalysisPanel, RiskStreamClient, RiskStreamMount};
