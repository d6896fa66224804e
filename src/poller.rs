//! Fixed-interval fast-quote refresh for one ticker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::normalize_ticker;
use crate::models::PriceSnapshot;
use crate::quotes::QuoteSource;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Price currently displayed for a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceView {
    pub ticker: String,
    pub snapshot: PriceSnapshot,
    /// Snapshot the view was created with; failed refreshes fall back to it.
    pub initial: PriceSnapshot,
    pub error: Option<String>,
    pub refreshes: u64,
}

impl PriceView {
    pub fn new(ticker: impl Into<String>, initial: PriceSnapshot) -> Self {
        Self {
            ticker: ticker.into(),
            snapshot: initial.clone(),
            initial,
            error: None,
            refreshes: 0,
        }
    }

    /// Apply one fetch outcome. A failure shows the initial snapshot again,
    /// not the last successful fetch.
    pub fn reconcile(mut self, outcome: Result<PriceSnapshot, String>) -> Self {
        self.refreshes += 1;
        match outcome {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                self.error = None;
            }
            Err(message) => {
                self.snapshot = self.initial.clone();
                self.error = Some(message);
            }
        }
        self
    }
}

/// Background refresh task plus the view it publishes.
pub struct PricePoller {
    ticker: String,
    state: watch::Receiver<PriceView>,
    task: Option<JoinHandle<()>>,
}

impl PricePoller {
    /// Fetch immediately, then every `every`, until stopped.
    pub fn start(
        source: Arc<dyn QuoteSource>,
        ticker: &str,
        initial: PriceSnapshot,
        every: Duration,
    ) -> Self {
        Self::spawn(source, ticker, initial, every, Instant::now())
    }

    /// Start polling when the caller may not have a price to show yet.
    ///
    /// With `initial` the poller starts as [`PricePoller::start`]. Without
    /// it, one quote is fetched first and becomes the initial snapshot; the
    /// next refresh then waits a full interval. If that first fetch fails
    /// there is nothing to fall back to, so polling stays off and `None` is
    /// returned.
    pub async fn launch(
        source: Arc<dyn QuoteSource>,
        ticker: &str,
        initial: Option<PriceSnapshot>,
        every: Duration,
    ) -> Option<Self> {
        if let Some(initial) = initial {
            return Some(Self::start(source, ticker, initial, every));
        }
        match source.fetch_quote(ticker).await {
            Ok(first) => {
                let every = every.max(MIN_INTERVAL);
                Some(Self::spawn(source, ticker, first, every, Instant::now() + every))
            }
            Err(e) => {
                warn!(ticker, "no initial price and first quote fetch failed, price polling disabled: {}", e);
                None
            }
        }
    }

    fn spawn(
        source: Arc<dyn QuoteSource>,
        ticker: &str,
        initial: PriceSnapshot,
        every: Duration,
        first_at: Instant,
    ) -> Self {
        let every = every.max(MIN_INTERVAL);
        let ticker = normalize_ticker(ticker).unwrap_or_else(|_| ticker.trim().to_string());
        let view = PriceView::new(ticker.clone(), initial);
        let (tx, rx) = watch::channel(view.clone());
        let owned = ticker.clone();

        let task = tokio::spawn(async move {
            info!(ticker = %owned, "price polling every {:?}", every);
            let mut view = view;
            let mut ticks = tokio::time::interval_at(first_at, every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                let outcome = source.fetch_quote(&owned).await.map_err(|e| e.to_string());
                match &outcome {
                    Ok(snapshot) => debug!(ticker = %owned, price = snapshot.last_price, "quote refreshed"),
                    Err(e) => warn!(ticker = %owned, "quote refresh failed: {}", e),
                }
                view = view.reconcile(outcome);
                tx.send_replace(view.clone());
            }
        });

        Self {
            ticker,
            state: rx,
            task: Some(task),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn snapshot(&self) -> PriceView {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PriceView> {
        self.state.clone()
    }

    /// Wait for the next refresh. `false` once the task has ended.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Cancel the interval. No fetch starts and no state is published after
    /// this returns.
    pub async fn stop(mut self) -> PriceView {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(ticker = %self.ticker, "price poller task failed: {}", e);
                }
            }
        }
        debug!(ticker = %self.ticker, "price polling stopped");
        let last = self.state.borrow().clone();
        last
    }
}

impl Drop for PricePoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
