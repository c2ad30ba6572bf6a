use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Result type for HTTP operations
pub type HttpResult<T> = Result<T, HttpError>;

/// HTTP client errors
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum HttpError {
    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("HTTP error: {status}")]
    HttpStatus { status: u16 },

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Network error: {message}")]
    Network { message: String },
}

impl From<HttpError> for crate::NetworkError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::HttpStatus { status } => crate::NetworkError::HttpError { status },
            HttpError::Timeout { seconds } => crate::NetworkError::Timeout { seconds },
            HttpError::Network { message } | HttpError::RequestFailed { message } => {
                crate::NetworkError::Connection { message }
            }
        }
    }
}

/// HTTP response carrying a raw (binary) body
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the tile server answered 200 OK
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Trait for HTTP clients the tile fetcher can use
///
/// Non-200 responses are returned as `Ok` so the caller decides what counts
/// as a failure; `Err` is reserved for transport-level problems.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Make a GET request
    async fn get(&self, url: &str) -> HttpResult<HttpResponse>;
}

/// Configuration for HTTP clients
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub default_headers: HashMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: "MapTileDownloader/1.0".to_string(),
            default_headers: HashMap::new(),
        }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}
