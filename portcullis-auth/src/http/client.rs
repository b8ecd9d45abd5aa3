//! Outbound client for token, profile and request-token endpoints.

use std::time::Duration;

use reqwest_middleware::ClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::error::Error;

/// Client used by every provider. Transient failures are retried by middleware.
pub type HttpClient = reqwest_middleware::ClientWithMiddleware;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request timeout, retries excluded.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Retries of connect errors, 5xx and 429 answers.
    pub max_retries: u32,
    /// Shortest and longest wait between two attempts.
    pub backoff: (Duration, Duration),
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff: (Duration::from_secs(1), Duration::from_secs(60)),
            user_agent: format!("portcullis/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Builds the provider [`HttpClient`].
///
/// Providers never set timeouts of their own; whatever is configured here
/// bounds every call they make.
#[derive(Debug, Clone, Default)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Wait between attempts grows exponentially from `min` up to `max`.
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.config.backoff = (min, max.max(min));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Fails with `Http(BuilderFailed)` when the TLS backend cannot be set up.
    pub fn build(self) -> Result<HttpClient, Error> {
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .user_agent(self.config.user_agent)
            .build()?;

        let (min, max) = self.config.backoff;
        let policy = ExponentialBackoff::builder()
            .retry_bounds(min, max)
            .build_with_max_retries(self.config.max_retries);

        Ok(ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(policy))
            .build())
    }
}
