//! Risk-analysis stream consumer
//!
//! Opens `GET {backend}/risk-analysis/{ticker}/stream`, decodes each
//! server-sent event into a [`StreamMessage`] and folds it into
//! [`RiskSections`]. A mount ends on `complete` or on the first transport
//! failure; nothing is retried.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{normalize_ticker, BackendClient};
use crate::envelope::StreamMessage;
use crate::error::{DashboardError, Result};
use crate::section::{RiskSections, StreamEvent};
use crate::sse::{SseDecoder, SseFrame};

/// Raw body chunks of an event-stream response.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>>>;

#[derive(Debug, Clone)]
pub struct RiskStreamClient {
    backend: BackendClient,
}

impl RiskStreamClient {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    pub fn stream_path(ticker: &str) -> Result<String> {
        Ok(format!("/risk-analysis/{}/stream", normalize_ticker(ticker)?))
    }

    /// Open the event stream for `ticker`.
    pub async fn connect(&self, ticker: &str) -> Result<EventStream<ChunkStream>> {
        let path = Self::stream_path(ticker)?;
        let resp = self.backend.get_event_stream(&path).await?;
        info!(ticker, status = %resp.status(), "risk stream connected");

        let chunks = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(DashboardError::from))
            .boxed();
        Ok(EventStream::new(chunks))
    }
}

/// Server-sent events decoded from a stream of byte chunks.
pub struct EventStream<S> {
    chunks: S,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
}

impl<S> EventStream<S>
where
    S: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    pub fn new(chunks: S) -> Self {
        Self {
            chunks,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    /// Next complete frame; `None` once the body has ended.
    pub async fn next_frame(&mut self) -> Option<Result<SseFrame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            match self.chunks.next().await? {
                Ok(chunk) => match self.decoder.feed(&chunk) {
                    Ok(frames) => self.pending.extend(frames),
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Consume `events` until the stream completes or fails, publishing the
/// state after every change. The stream is dropped before returning.
pub async fn drive<S, F>(
    mut events: EventStream<S>,
    mut sections: RiskSections,
    mut publish: F,
    idle_timeout: Option<Duration>,
) -> RiskSections
where
    S: Stream<Item = Result<Vec<u8>>> + Unpin,
    F: FnMut(&RiskSections),
{
    while !sections.is_finished() {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, events.next_frame()).await {
                Ok(next) => next,
                Err(_) => Some(Err(DashboardError::IdleTimeout(limit))),
            },
            None => events.next_frame().await,
        };

        let event = match next {
            Some(Ok(frame)) => {
                if !frame.is_message() {
                    debug!(ticker = %sections.ticker, event = ?frame.event, "skipping named event");
                    continue;
                }
                match StreamMessage::parse(&frame.data) {
                    Ok(message) => StreamEvent::Message(message),
                    Err(DashboardError::Payload { section, source }) => {
                        StreamEvent::SectionFailed(section, source.to_string())
                    }
                    Err(e) => {
                        warn!(ticker = %sections.ticker, "skipping frame: {}", e);
                        continue;
                    }
                }
            }
            Some(Err(e)) => StreamEvent::TransportError(e.to_string()),
            None => StreamEvent::TransportError(DashboardError::StreamClosed.to_string()),
        };

        sections.apply(event);
        publish(&sections);
    }

    drop(events);
    info!(ticker = %sections.ticker, phase = ?sections.phase, "risk stream closed");
    sections
}

/// One mounted stream consumer: a background task plus the state it
/// publishes. Dropping or closing the mount ends the task.
pub struct RiskStreamMount {
    ticker: String,
    state: watch::Receiver<RiskSections>,
    task: Option<JoinHandle<()>>,
}

impl RiskStreamMount {
    /// Reset state and start streaming `ticker` on the current runtime.
    pub fn open(client: RiskStreamClient, ticker: &str, idle_timeout: Option<Duration>) -> Self {
        // an invalid ticker keeps its raw form and fails on connect
        let ticker = normalize_ticker(ticker).unwrap_or_else(|_| ticker.trim().to_string());
        let initial = RiskSections::streaming(&ticker);
        let (tx, rx) = watch::channel(initial.clone());
        let owned = ticker.clone();

        let task = tokio::spawn(async move {
            info!(ticker = %owned, "opening risk stream");
            let publish = |state: &RiskSections| {
                tx.send_replace(state.clone());
            };
            match client.connect(&owned).await {
                Ok(events) => {
                    drive(events, initial, publish, idle_timeout).await;
                }
                Err(e) => {
                    let failed = initial.reduce(StreamEvent::TransportError(e.to_string()));
                    publish(&failed);
                }
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

    pub fn snapshot(&self) -> RiskSections {
        self.state.borrow().clone()
    }

    /// A fresh receiver for renderers that watch the state independently.
    pub fn subscribe(&self) -> watch::Receiver<RiskSections> {
        self.state.clone()
    }

    /// Wait for the next published state. `false` once the stream task has ended.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Wait until the stream has completed or failed.
    pub async fn wait_finished(&mut self) -> RiskSections {
        loop {
            let current = self.state.borrow_and_update().clone();
            if current.is_finished() {
                return current;
            }
            if self.state.changed().await.is_err() {
                return self.state.borrow().clone();
            }
        }
    }

    /// Stop the stream task and return the last published state. Nothing is
    /// published after this returns.
    pub async fn close(mut self) -> RiskSections {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(ticker = %self.ticker, "risk stream task failed: {}", e);
                }
            }
        }
        debug!(ticker = %self.ticker, "risk stream unmounted");
        let last = self.state.borrow().clone();
        last
    }
}

impl Drop for RiskStreamMount {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Owner of at most one live stream. Switching tickers closes the previous
/// stream before the next one opens.
pub struct RiskAnalysisPanel {
    client: RiskStreamClient,
    idle_timeout: Option<Duration>,
    mount: Option<RiskStreamMount>,
}

impl RiskAnalysisPanel {
    pub fn new(client: RiskStreamClient, idle_timeout: Option<Duration>) -> Self {
        Self {
            client,
            idle_timeout,
            mount: None,
        }
    }

    /// Show `ticker`. The stream only opens when `enabled` (the asset is
    /// already tracked); otherwise the panel stays idle.
    pub async fn mount(&mut self, ticker: &str, enabled: bool) -> Option<&mut RiskStreamMount> {
        self.unmount().await;
        if !enabled {
            debug!(ticker, "risk stream not enabled");
            return None;
        }
        self.mount = Some(RiskStreamMount::open(self.client.clone(), ticker, self.idle_timeout));
        self.mount.as_mut()
    }

    /// Close the current stream, if any, returning its final state.
    pub async fn unmount(&mut self) -> Option<RiskSections> {
        match self.mount.take() {
            Some(mount) => Some(mount.close().await),
            None => None,
        }
    }

    pub fn active(&mut self) -> Option<&mut RiskStreamMount> {
        self.mount.as_mut()
    }

    pub fn snapshot(&self) -> Option<RiskSections> {
        self.mount.as_ref().map(RiskStreamMount::snapshot)
    }
}
