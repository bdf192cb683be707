//! Resilient client for server-push live-query subscriptions.
//!
//! A caller submits a query (plus variables and credentials) to a
//! registration endpoint over HTTP, receives back a single-use channel
//! address, and attaches a long-lived server-sent-events connection to that
//! address to receive incremental updates. This crate owns the glue between
//! the two: it classifies failures, re-establishes the subscription with
//! capped exponential backoff and jitter, and keeps exactly one live stream
//! per subscription.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │              subscribe() / client              │
//! │  reconnection supervisor: iterative retry loop │
//! └──────────┬─────────────────────────┬───────────┘
//!            │                         │
//!            ▼                         ▼
//! ┌─────────────────────┐   ┌─────────────────────┐
//! │      register       │   │       session       │
//! │ one-shot handshake  │   │ stream event demux  │
//! │ + classification    │   │ + liveness poll     │
//! └──────────┬──────────┘   └──────────┬──────────┘
//!            │                         │
//!            ▼                         ▼
//!   RegistrationFetcher         StreamConnector
//!    (HttpFetcher)               (SseConnector)
//! ```
//!
//! Both transports are injected through the request; the `report` module is a
//! pure side channel surfacing status transitions and lifecycle events.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use livequery::{
//!     subscribe, HttpFetcher, LoggingEvents, SseConnector, SubscriptionRequest,
//! };
//!
//! # async fn run() -> Result<(), livequery::SubscribeError> {
//! let request = SubscriptionRequest::new(
//!     "{ allBlogPosts(first: 1) { title } }",
//!     "API_TOKEN",
//!     Arc::new(HttpFetcher::new()),
//!     Arc::new(SseConnector::new()),
//!     Arc::new(LoggingEvents),
//! )
//! .with_include_drafts(true);
//!
//! let handle = subscribe(request).await?;
//! // ... later
//! handle.cancel();
//! # Ok(())
//! # }
//! ```

mod client;
mod session;

pub mod config;
pub mod error;
pub mod register;
pub mod report;
pub mod sse;
pub mod transport;
pub mod types;

// Re-export the public API
pub use client::{subscribe, SubscriptionHandle};
pub use config::{
    ScopingStyle, SubscriptionRequest, DEFAULT_BASE_URL, DEFAULT_MAX_RECONNECTION_PERIOD,
    DEFAULT_RECONNECTION_PERIOD,
};
pub use error::SubscribeError;
pub use register::register;
pub use report::{LoggingEvents, SubscriptionEvents};
pub use sse::SseConnector;
pub use transport::{
    EventStream, FetchedResponse, HttpFetcher, RegistrationFetcher, StreamConnector, StreamEvent,
};
pub use types::{
    ChannelErrorData, ConnectionStatus, LifecycleEvent, Query, TransportEvent, UpdateData,
    UpdateResponse,
};
