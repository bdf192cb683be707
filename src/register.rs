//! Registration handshake: converts a query into a channel address.

use serde::Deserialize;
use tracing::debug;

use crate::config::SubscriptionRequest;
use crate::error::SubscribeError;

#[derive(Deserialize)]
struct Registration {
    url: String,
}

/// Perform the one-shot registration handshake.
///
/// Classification is strict: 300-499 is a terminal client rejection, >= 500
/// a retryable server failure, and a non-JSON content type a malformed (but
/// retryable) response. The returned channel address is valid for exactly
/// one stream attachment.
pub async fn register(request: &SubscriptionRequest) -> Result<String, SubscribeError> {
    let endpoint = request.endpoint();
    let body = request.body()?;
    debug!(endpoint = %endpoint, "Registering subscription");

    let response = request
        .fetcher
        .post(&endpoint, &request.headers(), body)
        .await?;

    if (300..500).contains(&response.status) {
        return Err(SubscribeError::ClientRejected {
            status: response.status,
            detail: response.body,
        });
    }
    if response.status >= 500 {
        return Err(SubscribeError::ServerUnavailable {
            status: response.status,
        });
    }

    let is_json = response
        .content_type
        .as_deref()
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return Err(SubscribeError::MalformedResponse(format!(
            "unexpected content type: {}",
            response.content_type.as_deref().unwrap_or("<none>")
        )));
    }

    let registration: Registration = serde_json::from_str(&response.body).map_err(|e| {
        SubscribeError::MalformedResponse(format!("invalid registration body: {}", e))
    })?;

    debug!(channel_url = %registration.url, "Channel address received");
    Ok(registration.url)
}
