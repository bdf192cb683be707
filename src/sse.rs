//! Server-sent-events transport for the push stream.
//!
//! Connects to a channel address with `Accept: text/event-stream` and
//! incrementally parses the SSE wire format out of the response byte stream.
//! Only the event names the channel protocol uses are surfaced; keep-alive
//! comments and unknown events are ignored.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::error::SubscribeError;
use crate::transport::{EventStream, StreamConnector, StreamEvent};

type BytesStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Stream connector producing [`SseEventStream`] connections.
pub struct SseConnector {
    client: reqwest::Client,
}

impl SseConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured client (timeouts, proxies, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for SseConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamConnector for SseConnector {
    async fn connect(&self, channel_url: &str) -> Result<Box<dyn EventStream>, SubscribeError> {
        debug!(channel_url = %channel_url, "Opening SSE connection");

        let response = self
            .client
            .get(channel_url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| SubscribeError::TransportFailure(format!("SSE connect failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SubscribeError::TransportFailure(format!(
                "SSE endpoint returned status {}",
                response.status().as_u16()
            )));
        }

        Ok(Box::new(SseEventStream {
            bytes: Some(Box::pin(response.bytes_stream())),
            parser: SseParser::new(),
            pending: VecDeque::new(),
            opened: false,
            closed: false,
        }))
    }
}

/// One SSE connection.
///
/// `Open` is emitted locally once the response arrived, matching EventSource
/// semantics where `open` fires on connection rather than over the wire.
pub struct SseEventStream {
    bytes: Option<BytesStream>,
    parser: SseParser,
    pending: VecDeque<StreamEvent>,
    opened: bool,
    closed: bool,
}

#[async_trait]
impl EventStream for SseEventStream {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        if !self.opened && !self.closed {
            self.opened = true;
            return Some(StreamEvent::Open);
        }

        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.closed {
                return None;
            }

            let chunk = match self.bytes.as_mut() {
                Some(stream) => stream.next().await,
                None => None,
            };
            match chunk {
                Some(Ok(data)) => {
                    for wire in self.parser.push(&data) {
                        if let Some(event) = translate(wire) {
                            self.pending.push_back(event);
                        }
                    }
                }
                Some(Err(e)) => {
                    self.closed = true;
                    self.bytes = None;
                    return Some(StreamEvent::TransportError(e.to_string()));
                }
                None => {
                    self.closed = true;
                    self.bytes = None;
                    return None;
                }
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        self.closed = true;
        self.bytes = None;
        self.pending.clear();
    }
}

fn translate(wire: WireEvent) -> Option<StreamEvent> {
    match wire.name.as_str() {
        "update" => Some(StreamEvent::Update(wire.data)),
        "channelError" => Some(StreamEvent::ChannelError(wire.data)),
        // catch-all error signal some servers emit as a named event
        "error" | "onerror" => Some(StreamEvent::TransportError(wire.data)),
        _ => None,
    }
}

/// A complete event parsed off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct WireEvent {
    pub name: String,
    pub data: String,
}

/// Incremental SSE field parser.
///
/// Handles `event:` and `data:` fields, blank-line dispatch, `\r\n` line
/// endings, comment lines, and multi-line data (joined with `\n`). `id:` and
/// `retry:` are not used by the channel protocol and are skipped.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event_name: String,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes; returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<WireEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let raw: String = self.buffer.drain(..=newline).collect();
            let line = raw.trim_end_matches('\n').trim_end_matches('\r');
            self.consume_line(line, &mut events);
        }
        events
    }

    fn consume_line(&mut self, line: &str, events: &mut Vec<WireEvent>) {
        if line.is_empty() {
            if !self.event_name.is_empty() || !self.data_lines.is_empty() {
                let name = if self.event_name.is_empty() {
                    "message".to_string()
                } else {
                    std::mem::take(&mut self.event_name)
                };
                events.push(WireEvent {
                    name,
                    data: self.data_lines.join("\n"),
                });
                self.event_name.clear();
                self.data_lines.clear();
            }
            return;
        }

        if line.starts_with(':') {
            // comment / keep-alive
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event_name = value.to_string(),
            "data" => self.data_lines.push(value.to_string()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: update\ndata: {\"response\":{\"data\":true}}\n\n");
        assert_eq!(
            events,
            vec![WireEvent {
                name: "update".into(),
                data: "{\"response\":{\"data\":true}}".into()
            }]
        );
    }

    #[test]
    fn handles_chunks_split_mid_line() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: chan").is_empty());
        assert!(parser.push(b"nelError\ndata: {\"fatal\"").is_empty());
        let events = parser.push(b": true}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "channelError");
        assert_eq!(events[0].data, "{\"fatal\": true}");
    }

    #[test]
    fn joins_multi_line_data() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: update\ndata: first\ndata: second\n\n");
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn skips_comments_and_crlf() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keep-alive\r\nevent: update\r\ndata: 1\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "update");
        assert_eq!(events[0].data, "1");
    }

    #[test]
    fn unnamed_event_defaults_to_message() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: hello\n\n");
        assert_eq!(events[0].name, "message");
    }

    #[test]
    fn unknown_wire_events_are_dropped() {
        assert_eq!(
            translate(WireEvent {
                name: "ping".into(),
                data: String::new()
            }),
            None
        );
        assert!(matches!(
            translate(WireEvent {
                name: "update".into(),
                data: "{}".into()
            }),
            Some(StreamEvent::Update(_))
        ));
        assert!(matches!(
            translate(WireEvent {
                name: "onerror".into(),
                data: "boom".into()
            }),
            Some(StreamEvent::TransportError(_))
        ));
    }
}
