//! Client configuration.

use std::time::Duration;

use crate::{
    api::{DEFAULT_REQUEST_TIMEOUT, HttpGameService},
    countdown::DEFAULT_TICK,
    error::ClientError,
    refresher::DEFAULT_REFRESH_DELAY,
    retry::{DEFAULT_MAX_BACKOFF, DEFAULT_MAX_CONSECUTIVE_FAILURES, RetryPolicy},
    views::DEFAULT_WAITING_POLL,
};

/// Default game server address
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Settings shared by every screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Game server root
    pub base_url: String,
    /// Host session cookie value, required by the `/services/*` endpoints
    pub session_cookie: Option<String>,
    /// Countdown tick
    pub tick: Duration,
    /// Delay between participant list reads
    pub refresh_delay: Duration,
    /// Failed reads in a row a poller tolerates
    pub max_consecutive_failures: u32,
    /// Upper bound for retry backoff
    pub max_backoff: Duration,
    /// Bound on a single request; a request running longer counts as a failed read
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_cookie: None,
            tick: DEFAULT_TICK,
            refresh_delay: DEFAULT_REFRESH_DELAY,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            max_backoff: DEFAULT_MAX_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Retry policy for pollers whose healthy delay is `base_delay`
    pub fn retry_policy(&self, base_delay: Duration) -> RetryPolicy {
        RetryPolicy::new(base_delay)
            .with_max_consecutive_failures(self.max_consecutive_failures)
            .with_max_delay(self.max_backoff)
    }

    /// Retry policy of the participant waiting screen
    pub fn waiting_policy(&self) -> RetryPolicy {
        self.retry_policy(DEFAULT_WAITING_POLL)
    }

    /// Build the HTTP service client described by this configuration
    pub fn build_service(&self) -> Result<HttpGameService, ClientError> {
        let service = HttpGameService::with_request_timeout(&self.base_url, self.request_timeout)?;
        Ok(match &self.session_cookie {
            Some(cookie) => service.with_session_cookie(cookie.clone()),
            None => service,
        })
    }
}
