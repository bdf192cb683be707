//! Subscription request configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::SubscribeError;
use crate::report::SubscriptionEvents;
use crate::transport::{RegistrationFetcher, StreamConnector};
use crate::types::Query;

/// Default registration endpoint.
pub const DEFAULT_BASE_URL: &str = "https://graphql-listen.datocms.com";

/// Default base period between reconnection attempts.
pub const DEFAULT_RECONNECTION_PERIOD: Duration = Duration::from_millis(1000);

/// Default ceiling for the backoff period.
pub const DEFAULT_MAX_RECONNECTION_PERIOD: Duration = Duration::from_millis(20_000);

/// How scoping options travel to the registration endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopingStyle {
    /// `X-Environment` / `X-Include-Drafts` / `X-Exclude-Invalid` headers.
    #[default]
    Headers,
    /// Environment and draft content as URL path segments
    /// (`/environments/{env}`, `/preview`). Exclude-invalid has no path
    /// form and stays a header.
    PathSegments,
}

/// Everything one subscription attempt chain needs.
///
/// Immutable once built; the reconnection supervisor carries it unchanged
/// across attempts (only the backoff period evolves). Transports are
/// injected explicitly; there is no ambient HTTP client or stream
/// constructor.
#[derive(Clone)]
pub struct SubscriptionRequest {
    /// The query to subscribe.
    pub query: Query,
    /// Variables for the query.
    pub variables: Option<Value>,
    /// API token.
    pub token: String,
    /// Environment to run the query against (default: primary).
    pub environment: Option<String>,
    /// Whether draft records are returned.
    pub include_drafts: bool,
    /// Whether invalid records are filtered out.
    pub exclude_invalid: bool,
    /// How the scoping options above reach the endpoint.
    pub scoping: ScopingStyle,
    /// Base registration endpoint.
    pub base_url: String,
    /// Base period between reconnection attempts.
    pub reconnection_period: Duration,
    /// Ceiling for the backoff period.
    pub max_reconnection_period: Duration,
    /// Transport for the registration handshake.
    pub fetcher: Arc<dyn RegistrationFetcher>,
    /// Factory for push-stream connections.
    pub connector: Arc<dyn StreamConnector>,
    /// Callback sink.
    pub events: Arc<dyn SubscriptionEvents>,
}

#[derive(Serialize)]
struct RegistrationBody<'a> {
    query: &'a Query,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Value>,
}

impl SubscriptionRequest {
    /// Build a request with the mandatory pieces; everything else defaults.
    pub fn new(
        query: impl Into<Query>,
        token: impl Into<String>,
        fetcher: Arc<dyn RegistrationFetcher>,
        connector: Arc<dyn StreamConnector>,
        events: Arc<dyn SubscriptionEvents>,
    ) -> Self {
        Self {
            query: query.into(),
            variables: None,
            token: token.into(),
            environment: None,
            include_drafts: false,
            exclude_invalid: false,
            scoping: ScopingStyle::Headers,
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnection_period: DEFAULT_RECONNECTION_PERIOD,
            max_reconnection_period: DEFAULT_MAX_RECONNECTION_PERIOD,
            fetcher,
            connector,
            events,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_include_drafts(mut self, include_drafts: bool) -> Self {
        self.include_drafts = include_drafts;
        self
    }

    pub fn with_exclude_invalid(mut self, exclude_invalid: bool) -> Self {
        self.exclude_invalid = exclude_invalid;
        self
    }

    pub fn with_scoping(mut self, scoping: ScopingStyle) -> Self {
        self.scoping = scoping;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_reconnection_period(mut self, period: Duration) -> Self {
        self.reconnection_period = period;
        self
    }

    pub fn with_max_reconnection_period(mut self, period: Duration) -> Self {
        self.max_reconnection_period = period;
        self
    }

    /// Registration endpoint for this request, honoring the scoping style.
    pub fn endpoint(&self) -> String {
        match self.scoping {
            ScopingStyle::Headers => self.base_url.clone(),
            ScopingStyle::PathSegments => {
                let mut url = self.base_url.trim_end_matches('/').to_string();
                if let Some(environment) = &self.environment {
                    url.push_str("/environments/");
                    url.push_str(environment);
                }
                if self.include_drafts {
                    url.push_str("/preview");
                }
                url
            }
        }
    }

    /// Headers for the registration request, honoring the scoping style.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", self.token)),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if self.scoping == ScopingStyle::Headers {
            if let Some(environment) = &self.environment {
                headers.push(("X-Environment".to_string(), environment.clone()));
            }
            if self.include_drafts {
                headers.push(("X-Include-Drafts".to_string(), "true".to_string()));
            }
        }
        if self.exclude_invalid {
            headers.push(("X-Exclude-Invalid".to_string(), "true".to_string()));
        }
        headers
    }

    /// JSON body of the registration request.
    pub fn body(&self) -> Result<String, SubscribeError> {
        let body = RegistrationBody {
            query: &self.query,
            variables: self.variables.as_ref(),
        };
        serde_json::to_string(&body).map_err(|e| {
            SubscribeError::TransportFailure(format!("failed to encode registration body: {}", e))
        })
    }
}

impl fmt::Debug for SubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRequest")
            .field("query", &self.query)
            .field("variables", &self.variables)
            .field("environment", &self.environment)
            .field("include_drafts", &self.include_drafts)
            .field("exclude_invalid", &self.exclude_invalid)
            .field("scoping", &self.scoping)
            .field("base_url", &self.base_url)
            .field("reconnection_period", &self.reconnection_period)
            .field("max_reconnection_period", &self.max_reconnection_period)
            .finish_non_exhaustive()
    }
}
