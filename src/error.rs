//! Error taxonomy for the subscription flow.

use thiserror::Error;

/// Classified failure of the subscription flow.
///
/// A single tagged enum rather than an error hierarchy; callers match on the
/// variant. Only `ClientRejected` (and a fatal channel error arriving before
/// the first open) can settle the future returned by
/// [`subscribe`](crate::subscribe) with an error; everything retryable is
/// handled by the reconnection supervisor and surfaces through callbacks.
#[derive(Debug, Clone, Error)]
pub enum SubscribeError {
    /// The registration endpoint rejected the request (status 300-499).
    /// The request itself is invalid and is never retried.
    #[error("registration rejected with status {status}: {detail}")]
    ClientRejected { status: u16, detail: String },

    /// The registration endpoint failed transiently (status >= 500).
    #[error("registration server error: status {status}")]
    ServerUnavailable { status: u16 },

    /// The registration response was not the expected structured JSON.
    #[error("malformed registration response: {0}")]
    MalformedResponse(String),

    /// The request could not be sent or completed at all.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The channel reported an error the subscription can never recover from.
    #[error("fatal channel error {code}: {message}")]
    FatalChannel { code: String, message: String },

    /// The subscription was cancelled before a stream ever opened.
    #[error("subscription cancelled")]
    Cancelled,
}

impl SubscribeError {
    /// Whether the reconnection supervisor may retry after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscribeError::ServerUnavailable { .. }
                | SubscribeError::MalformedResponse(_)
                | SubscribeError::TransportFailure(_)
        )
    }
}
