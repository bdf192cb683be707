//! Shared data types for the subscription lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of the connection to the live-query channel.
///
/// `Connecting` holds from request start until the stream reports open,
/// `Connected` from open until the stream is detected closed. `Closed` is
/// terminal per attempt; a new attempt restarts at `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A query to subscribe: raw query text or a pre-built structured document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Query {
    /// Raw query text.
    Raw(String),
    /// A structured query document, serialized verbatim.
    Document(Value),
}

impl From<&str> for Query {
    fn from(query: &str) -> Self {
        Query::Raw(query.to_string())
    }
}

impl From<String> for Query {
    fn from(query: String) -> Self {
        Query::Raw(query)
    }
}

/// Payload delivered on every `update` stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateData {
    /// The raw query response.
    pub response: UpdateResponse,
}

/// The `response` property of an update payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// The `data` property of the query response, forwarded verbatim.
    pub data: Value,
}

/// Payload of a `channelError` stream event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelErrorData {
    /// Error code (e.g. `INVALID_QUERY`).
    #[serde(default)]
    pub code: String,
    /// Human friendly message explaining the error.
    #[serde(default)]
    pub message: String,
    /// Fatal errors mean the subscription itself can never succeed;
    /// they are never retried.
    #[serde(default)]
    pub fatal: bool,
    /// The raw error response, if the server included one.
    #[serde(default)]
    pub response: Option<Value>,
}

/// Informational event emitted at lifecycle milestones.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Connection status at the time of the event.
    pub status: ConnectionStatus,
    /// Channel address the event refers to.
    pub channel_url: String,
    /// Event description.
    pub message: String,
}

/// Payload handed to the transport-error callback.
#[derive(Debug, Clone)]
pub struct TransportEvent {
    /// What went wrong, as reported by the transport.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_display() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(ConnectionStatus::Closed.to_string(), "closed");
    }

    #[test]
    fn channel_error_defaults_missing_fields() {
        // servers may send only the fatal flag
        let error: ChannelErrorData = serde_json::from_str(r#"{"fatal":true}"#).unwrap();
        assert!(error.fatal);
        assert_eq!(error.code, "");
        assert_eq!(error.message, "");
        assert!(error.response.is_none());
    }

    #[test]
    fn update_data_parses_typed_shape() {
        let update: UpdateData =
            serde_json::from_str(r#"{"response":{"data":true}}"#).unwrap();
        assert_eq!(update.response.data, Value::Bool(true));
    }

    #[test]
    fn query_serializes_untagged() {
        let raw = Query::from("{ allBlogPosts { title } }");
        assert_eq!(
            serde_json::to_value(&raw).unwrap(),
            json!("{ allBlogPosts { title } }")
        );

        let document = Query::Document(json!({"kind": "Document"}));
        assert_eq!(
            serde_json::to_value(&document).unwrap(),
            json!({"kind": "Document"})
        );
    }
}
