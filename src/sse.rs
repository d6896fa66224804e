//! Incremental decoder for `text/event-stream` bodies.
//!
//! Chunks may split lines (or UTF-8 sequences) anywhere, so bytes are
//! buffered until a full line is available.

use crate::error::{DashboardError, Result};

/// Largest line or event payload accepted before the stream is rejected.
pub const MAX_EVENT_BYTES: usize = 4 * 1024 * 1024;

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    /// Whether a browser `EventSource` would deliver this to `onmessage`.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: String,
    has_data: bool,
    event: Option<String>,
    last_id: Option<String>,
    started: bool,
    limit: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            data: String::new(),
            has_data: false,
            event: None,
            last_id: None,
            started: false,
            limit,
        }
    }

    /// Feed a chunk and collect every frame it completes. Fails once a line
    /// or an event's data grows past the decoder's limit.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(len) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let mut line = &self.buf[start..start + len];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            start += len + 1;
            if let Some(frame) = self.process_line(&line)? {
                frames.push(frame);
            }
        }
        self.buf.drain(..start);

        if self.buf.len() > self.limit {
            return Err(DashboardError::FrameTooLarge(self.limit));
        }
        Ok(frames)
    }

    /// Id of the most recent event that carried one.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn process_line(&mut self, line: &str) -> Result<Option<SseFrame>> {
        let line = if self.started {
            line
        } else {
            self.started = true;
            line.strip_prefix('\u{feff}').unwrap_or(line)
        };

        if line.is_empty() {
            return Ok(self.dispatch());
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.data.len() + value.len() + 1 > self.limit {
                    return Err(DashboardError::FrameTooLarge(self.limit));
                }
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            // reconnection is never attempted, so `retry` has nothing to tune
            "retry" => {}
            _ => {}
        }
        Ok(None)
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}
