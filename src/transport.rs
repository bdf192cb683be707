//! Transport seams for the subscription flow.
//!
//! Both transports are injected through
//! [`SubscriptionRequest`](crate::config::SubscriptionRequest); nothing in
//! this crate reaches for an ambient client. [`HttpFetcher`] is the
//! production registration transport; the production push-stream connector
//! lives in [`crate::sse`].

use async_trait::async_trait;

use crate::error::SubscribeError;

/// A completed HTTP response, reduced to what registration classification needs.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value of the `Content-Type` response header, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub body: String,
}

/// One-shot HTTP POST used by the registration handshake.
#[async_trait]
pub trait RegistrationFetcher: Send + Sync {
    /// Send `body` to `url` with the given headers.
    ///
    /// Implementations return `Ok` for any response the server produced,
    /// whatever the status; `Err` means the request never completed.
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<FetchedResponse, SubscribeError>;
}

/// A named event observed on the push stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The stream is ready; updates may follow.
    Open,
    /// An `update` event; carries the JSON payload from the data field.
    Update(String),
    /// A `channelError` event; carries the JSON payload from the data field.
    ChannelError(String),
    /// The transport reported an error.
    TransportError(String),
}

/// A live push-stream connection to one channel address.
///
/// Exactly one session owns a stream at a time. `next_event` must be
/// cancel-safe: dropping its future mid-await must not lose buffered events.
#[async_trait]
pub trait EventStream: Send {
    /// Next event, or `None` once the stream is closed.
    async fn next_event(&mut self) -> Option<StreamEvent>;

    /// Whether the underlying connection is known to be closed.
    fn is_closed(&self) -> bool;

    /// Close the connection. Idempotent.
    fn close(&mut self);
}

/// Factory for push-stream connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open a stream to the given channel address.
    async fn connect(&self, channel_url: &str) -> Result<Box<dyn EventStream>, SubscribeError>;
}

/// Production registration transport backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
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

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistrationFetcher for HttpFetcher {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<FetchedResponse, SubscribeError> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| SubscribeError::TransportFailure(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let body = response
            .text()
            .await
            .map_err(|e| SubscribeError::TransportFailure(e.to_string()))?;

        Ok(FetchedResponse {
            status,
            content_type,
            body,
        })
    }
}
