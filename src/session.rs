//! Channel session: owns one push-stream connection and demultiplexes its
//! events into callbacks.
//!
//! A session is created with an already-connected stream and driven by
//! [`ChannelSession::run`] until the stream dies, a fatal channel error
//! arrives, or the chain is cancelled. Exactly one stream is owned per
//! session; a periodic liveness poll observes silent disconnects that never
//! produce an explicit error event. Every exit path closes the stream and
//! drops the poll timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::client::{ChainState, ResolveSlot, SubscriptionHandle};
use crate::report::Reporter;
use crate::transport::{EventStream, StreamEvent};
use crate::types::{ChannelErrorData, ConnectionStatus, UpdateData};

/// How often the session checks the stream for a silent disconnect.
const LIVENESS_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// How a session ended, as seen by the reconnection supervisor.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// Stream died; eligible for retry.
    Retry,
    /// Fatal channel error; the chain must stop.
    Fatal(ChannelErrorData),
    /// Cancelled through the subscription handle.
    Cancelled,
}

pub(crate) struct ChannelSession {
    stream: Box<dyn EventStream>,
    chain: Arc<ChainState>,
    reporter: Reporter,
    channel_url: String,
}

impl ChannelSession {
    pub fn new(
        stream: Box<dyn EventStream>,
        chain: Arc<ChainState>,
        reporter: Reporter,
        channel_url: String,
    ) -> Self {
        Self {
            stream,
            chain,
            reporter,
            channel_url,
        }
    }

    /// Drive the session to its end.
    ///
    /// The first `open` event resolves `resolve` with a handle bound to this
    /// session's chain; reconnected sessions find the slot already empty.
    pub async fn run(self, resolve: &mut ResolveSlot) -> SessionEnd {
        let ChannelSession {
            mut stream,
            chain,
            reporter,
            channel_url,
        } = self;

        let mut poll = tokio::time::interval(LIVENESS_POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(channel_url = %channel_url, "Session started");

        loop {
            tokio::select! {
                biased;
                _ = chain.cancelled() => {
                    debug!(channel_url = %channel_url, "Session cancelled");
                    stream.close();
                    reporter.status(ConnectionStatus::Closed);
                    return SessionEnd::Cancelled;
                }
                _ = poll.tick() => {
                    if stream.is_closed() {
                        debug!(channel_url = %channel_url, "Liveness poll found stream closed");
                        reporter.status(ConnectionStatus::Closed);
                        return SessionEnd::Retry;
                    }
                }
                event = stream.next_event() => match event {
                    Some(StreamEvent::Open) => {
                        reporter.status(ConnectionStatus::Connected);
                        if let Some(tx) = resolve.take() {
                            let handle = SubscriptionHandle::new(Arc::clone(&chain));
                            let _ = tx.send(Ok(handle));
                        }
                    }
                    Some(StreamEvent::Update(payload)) => {
                        forward_update(&reporter, &payload);
                    }
                    Some(StreamEvent::ChannelError(payload)) => {
                        match serde_json::from_str::<ChannelErrorData>(&payload) {
                            Ok(error) if error.fatal => {
                                warn!(code = %error.code, "Fatal channel error: {}", error.message);
                                chain.stop();
                                reporter.channel_error(&error);
                                stream.close();
                                reporter.status(ConnectionStatus::Closed);
                                return SessionEnd::Fatal(error);
                            }
                            Ok(error) => {
                                reporter.channel_error(&error);
                                stream.close();
                                reporter.status(ConnectionStatus::Closed);
                                return SessionEnd::Retry;
                            }
                            Err(e) => {
                                warn!("Unparseable channelError payload: {}", e);
                                reporter.transport_error(format!(
                                    "unparseable channelError payload: {}",
                                    e
                                ));
                                stream.close();
                                reporter.status(ConnectionStatus::Closed);
                                return SessionEnd::Retry;
                            }
                        }
                    }
                    Some(StreamEvent::TransportError(message)) => {
                        reporter.transport_error(message);
                        stream.close();
                        reporter.status(ConnectionStatus::Closed);
                        return SessionEnd::Retry;
                    }
                    None => {
                        debug!(channel_url = %channel_url, "Stream ended");
                        stream.close();
                        reporter.status(ConnectionStatus::Closed);
                        return SessionEnd::Retry;
                    }
                }
            }
        }
    }
}

fn forward_update(reporter: &Reporter, payload: &str) {
    match serde_json::from_str::<UpdateData>(payload) {
        Ok(update) => reporter.update(update),
        Err(e) => warn!("Unparseable update payload: {}", e),
    }
}
