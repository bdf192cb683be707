//! Status and lifecycle reporting.
//!
//! Pure side channel: the other components call into the [`Reporter`] at
//! every status transition and lifecycle milestone. Nothing here affects
//! control flow, and every callback except `on_update` defaults to a no-op.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::types::{
    ChannelErrorData, ConnectionStatus, LifecycleEvent, TransportEvent, UpdateData,
};

/// Callback sink for one subscription.
///
/// Implementations must not block; callbacks are invoked inline from the
/// connection flow.
pub trait SubscriptionEvents: Send + Sync {
    /// A query result update arrived. Required.
    fn on_update(&self, update: UpdateData);

    /// Connection status transition.
    fn on_status_change(&self, _status: ConnectionStatus) {}

    /// A channel-level error arrived on the stream.
    fn on_channel_error(&self, _error: &ChannelErrorData) {}

    /// A transport-level error occurred (stream death, registration failure).
    fn on_transport_error(&self, _error: &TransportEvent) {}

    /// Informational lifecycle milestone.
    fn on_event(&self, _event: &LifecycleEvent) {}
}

/// Forwards transitions to the configured sink.
#[derive(Clone)]
pub(crate) struct Reporter {
    events: Arc<dyn SubscriptionEvents>,
}

impl Reporter {
    pub fn new(events: Arc<dyn SubscriptionEvents>) -> Self {
        Self { events }
    }

    pub fn status(&self, status: ConnectionStatus) {
        debug!(status = %status, "Status transition");
        self.events.on_status_change(status);
    }

    pub fn update(&self, update: UpdateData) {
        self.events.on_update(update);
    }

    pub fn channel_error(&self, error: &ChannelErrorData) {
        self.events.on_channel_error(error);
    }

    pub fn transport_error(&self, message: impl Into<String>) {
        let event = TransportEvent {
            message: message.into(),
        };
        self.events.on_transport_error(&event);
    }

    pub fn lifecycle(&self, status: ConnectionStatus, channel_url: &str, message: &str) {
        let event = LifecycleEvent {
            status,
            channel_url: channel_url.to_string(),
            message: message.to_string(),
        };
        self.events.on_event(&event);
    }
}

/// Sink that logs every transition through `tracing`.
///
/// Useful as a default for callers that only want visibility.
pub struct LoggingEvents;

impl SubscriptionEvents for LoggingEvents {
    fn on_update(&self, update: UpdateData) {
        info!(data = %update.response.data, "Query result update");
    }

    fn on_status_change(&self, status: ConnectionStatus) {
        info!(status = %status, "Connection status changed");
    }

    fn on_channel_error(&self, error: &ChannelErrorData) {
        warn!(code = %error.code, fatal = error.fatal, "Channel error: {}", error.message);
    }

    fn on_transport_error(&self, error: &TransportEvent) {
        warn!("Transport error: {}", error.message);
    }

    fn on_event(&self, event: &LifecycleEvent) {
        debug!(status = %event.status, channel_url = %event.channel_url, "{}", event.message);
    }
}
