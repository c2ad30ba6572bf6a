use std::time::Duration;

use super::{DownloadConfig, RetryPolicy};

/// Builder for creating download configurations with a fluent API
#[derive(Debug, Clone, Default)]
pub struct DownloadConfigBuilder {
    batch_size: Option<usize>,
    max_workers: Option<usize>,
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    subdomains: Option<Vec<String>>,
}

impl DownloadConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of tiles per chunk
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set the number of concurrent workers per chunk
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Set the total number of attempts per tile
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the backoff base; attempt `n` waits `base * 2^n`
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.base_delay = Some(base);
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replace the `{s}` subdomain set
    pub fn subdomains<I, S>(mut self, subdomains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subdomains = Some(subdomains.into_iter().map(Into::into).collect());
        self
    }

    /// Build the final configuration
    ///
    /// Zero sizes are raised to 1 so the pool always makes progress.
    pub fn build(self) -> DownloadConfig {
        let defaults = DownloadConfig::default();
        DownloadConfig {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size).max(1),
            max_workers: self.max_workers.unwrap_or(defaults.max_workers).max(1),
            retry: RetryPolicy {
                max_attempts: self
                    .max_attempts
                    .unwrap_or(defaults.retry.max_attempts)
                    .max(1),
                base_delay: self.base_delay.unwrap_or(defaults.retry.base_delay),
            },
            request_timeout: self.timeout.unwrap_or(defaults.request_timeout),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            subdomains: self.subdomains.unwrap_or(defaults.subdomains),
        }
    }
}

/// Convenience methods for common configurations
impl DownloadConfigBuilder {
    /// Default pool shape with millisecond backoff, for tests and mocks
    pub fn for_testing() -> Self {
        Self::new()
            .backoff_base(Duration::from_millis(1))
            .timeout(Duration::from_secs(2))
    }
}
