mod builder;
mod paths;
mod sources;

pub use builder::*;
pub use paths::*;
pub use sources::*;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http::HttpConfig;

/// Retry schedule for a single tile fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Backoff after attempt `n` (0-indexed) is `base_delay * 2^n`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Backoff slept after the given 0-indexed attempt failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Configuration for the tile fetch worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Tiles per sequentially processed chunk
    pub batch_size: usize,
    /// Tiles processed concurrently within a chunk
    pub max_workers: usize,
    /// Per-tile retry schedule
    pub retry: RetryPolicy,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// User agent sent to tile servers
    pub user_agent: String,
    /// Hostname shards substituted for `{s}`
    pub subdomains: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_workers: 5,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            user_agent: "MapTileDownloader/1.0".to_string(),
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }
    }
}

impl DownloadConfig {
    /// Set the chunk size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of concurrent workers per chunk
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the retry schedule
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create a builder for more complex configuration
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::new()
    }

    /// HTTP client settings matching this configuration
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::default()
            .with_timeout(self.request_timeout)
            .with_user_agent(self.user_agent.clone())
    }
}
