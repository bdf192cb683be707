//! Top-level subscribe operation and the reconnection supervisor.
//!
//! The supervisor is an iterative loop: register, open a session, and on any
//! retryable failure sleep for a jittered, doubling, capped period before
//! starting over. Recursion is never used, so arbitrarily many retries do not
//! grow the stack. The only things that end the loop are a terminal failure
//! (client rejection, fatal channel error) and cancellation through the
//! returned handle.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::SubscriptionRequest;
use crate::error::SubscribeError;
use crate::register::register;
use crate::report::Reporter;
use crate::session::{ChannelSession, SessionEnd};
use crate::types::ConnectionStatus;

/// Shared state of one attempt chain.
///
/// Owned jointly by the supervisor loop, the active session, and the
/// subscription handle. Scoped to the chain; nothing here is global. Once
/// stopped, a chain never registers or opens a stream again.
#[derive(Debug)]
pub(crate) struct ChainState {
    stop: watch::Sender<bool>,
}

impl ChainState {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self { stop }
    }

    /// Durably stop the chain. Idempotent.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once the chain has been stopped.
    pub async fn cancelled(&self) {
        let mut rx = self.stop.subscribe();
        // Err is impossible while `self` holds the sender
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Handle to an established subscription.
///
/// Returned once a stream has successfully opened. Cancelling is idempotent:
/// it durably suppresses any further reconnection for the chain, including a
/// backoff sleep already in flight, and closes the active stream.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    chain: Arc<ChainState>,
}

impl SubscriptionHandle {
    pub(crate) fn new(chain: Arc<ChainState>) -> Self {
        Self { chain }
    }

    /// Stop the subscription.
    pub fn cancel(&self) {
        debug!("Subscription cancelled");
        self.chain.stop();
    }

    /// Whether the chain has been stopped, by this handle or a fatal error.
    pub fn is_cancelled(&self) -> bool {
        self.chain.is_stopped()
    }
}

/// Slot holding the pending resolution of the future returned by `subscribe`.
/// Taken exactly once, on the first stream open or a terminal failure.
pub(crate) type ResolveSlot =
    Option<oneshot::Sender<Result<SubscriptionHandle, SubscribeError>>>;

/// Establish a resilient subscription to a live-query channel.
///
/// Registers the query, attaches a push stream to the returned channel
/// address, and resolves with a [`SubscriptionHandle`] on the first
/// successful stream open. After that point the connection is supervised in
/// the background: stream death and transient registration failures
/// re-establish the subscription with capped exponential backoff, reported
/// only through the configured callbacks.
///
/// # Errors
///
/// Settles with an error only for failures that can never succeed: a
/// registration rejected by the server (status 300-499), or a fatal channel
/// error arriving before the first open. Every other pre-open failure retries
/// silently.
pub async fn subscribe(
    request: SubscriptionRequest,
) -> Result<SubscriptionHandle, SubscribeError> {
    let chain = Arc::new(ChainState::new());
    let (resolve_tx, resolve_rx) = oneshot::channel();

    tokio::spawn(run_chain(request, Arc::clone(&chain), resolve_tx));

    match resolve_rx.await {
        Ok(result) => result,
        // chain task ended pre-open without a verdict
        Err(_) => Err(SubscribeError::Cancelled),
    }
}

/// The reconnection supervisor: one iteration per attempt.
async fn run_chain(
    request: SubscriptionRequest,
    chain: Arc<ChainState>,
    resolve: oneshot::Sender<Result<SubscriptionHandle, SubscribeError>>,
) {
    let reporter = Reporter::new(Arc::clone(&request.events));
    let max_period = request.max_reconnection_period;
    let mut period = request.reconnection_period.min(max_period);
    let mut resolve: ResolveSlot = Some(resolve);

    loop {
        if chain.is_stopped() {
            return;
        }

        reporter.status(ConnectionStatus::Connecting);

        let channel_url = match register(&request).await {
            Ok(channel_url) => channel_url,
            Err(error @ SubscribeError::ClientRejected { .. }) => {
                warn!("Registration rejected: {}", error);
                match resolve.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(error));
                    }
                    // the future already settled; callback-only from here on
                    None => reporter.transport_error(error.to_string()),
                }
                reporter.status(ConnectionStatus::Closed);
                chain.stop();
                return;
            }
            Err(error) => {
                debug!("Registration failed: {}", error);
                reporter.transport_error(error.to_string());
                reporter.status(ConnectionStatus::Closed);
                if !wait_for_retry(&chain, period).await {
                    return;
                }
                period = next_period(period, max_period);
                continue;
            }
        };

        reporter.lifecycle(ConnectionStatus::Connecting, &channel_url, "Received channel URL");

        let stream = match request.connector.connect(&channel_url).await {
            Ok(stream) => stream,
            Err(error) => {
                debug!("Stream connect failed: {}", error);
                reporter.transport_error(error.to_string());
                reporter.status(ConnectionStatus::Closed);
                if !wait_for_retry(&chain, period).await {
                    return;
                }
                period = next_period(period, max_period);
                continue;
            }
        };

        let session =
            ChannelSession::new(stream, Arc::clone(&chain), reporter.clone(), channel_url);
        match session.run(&mut resolve).await {
            SessionEnd::Retry => {
                if !wait_for_retry(&chain, period).await {
                    return;
                }
                period = next_period(period, max_period);
            }
            SessionEnd::Fatal(error) => {
                info!(code = %error.code, "Chain stopped by fatal channel error");
                // only reachable pre-open if the stream errored before `open`;
                // settle the future rather than leave the caller pending
                if let Some(tx) = resolve.take() {
                    let _ = tx.send(Err(SubscribeError::FatalChannel {
                        code: error.code,
                        message: error.message,
                    }));
                }
                return;
            }
            SessionEnd::Cancelled => return,
        }
    }
}

/// Backoff sleep; false when the chain was stopped before or during it.
async fn wait_for_retry(chain: &ChainState, period: Duration) -> bool {
    if chain.is_stopped() {
        return false;
    }
    debug!(period_ms = period.as_millis() as u64, "Waiting before reconnecting");
    tokio::select! {
        _ = tokio::time::sleep(period) => !chain.is_stopped(),
        _ = chain.cancelled() => false,
    }
}

/// Next backoff period: doubled, jittered by a symmetric 10%, capped.
fn next_period(current: Duration, max: Duration) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(-0.1..=0.1);
    let scaled = current.as_secs_f64() * 2.0 * (1.0 + jitter);
    Duration::from_secs_f64(scaled).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_period_doubles_within_jitter_bounds() {
        let current = Duration::from_millis(1000);
        let max = Duration::from_secs(60);
        for _ in 0..200 {
            let next = next_period(current, max);
            assert!(next >= Duration::from_millis(1800), "got {:?}", next);
            assert!(next <= Duration::from_millis(2200), "got {:?}", next);
        }
    }

    #[test]
    fn next_period_respects_cap() {
        let current = Duration::from_millis(15_000);
        let max = Duration::from_millis(20_000);
        for _ in 0..200 {
            assert!(next_period(current, max) <= max);
        }
    }

    #[test]
    fn handle_is_debug_formattable() {
        let handle = SubscriptionHandle::new(Arc::new(ChainState::new()));
        let rendered = format!("{:?}", handle);
        assert!(rendered.contains("SubscriptionHandle"));
    }

    #[tokio::test]
    async fn chain_stop_is_idempotent_and_observable() {
        let chain = Arc::new(ChainState::new());
        assert!(!chain.is_stopped());

        let observer = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.cancelled().await })
        };

        chain.stop();
        chain.stop();
        assert!(chain.is_stopped());
        observer.await.unwrap();

        // already-stopped chains resolve immediately
        chain.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_retry_is_interrupted_by_stop() {
        let chain = Arc::new(ChainState::new());

        let waiter = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { wait_for_retry(&chain, Duration::from_secs(3600)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        chain.stop();
        assert!(!waiter.await.unwrap());
    }
}
