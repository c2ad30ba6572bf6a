use super::{HttpClient, HttpConfig, HttpError, HttpResponse, HttpResult};
use async_trait::async_trait;

/// Standard reqwest-based HTTP client for fetching tiles
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout_seconds: u64,
}

impl ReqwestClient {
    /// Create a new reqwest client with default configuration
    pub fn new() -> HttpResult<Self> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a new reqwest client with custom configuration
    pub fn with_config(config: HttpConfig) -> HttpResult<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.default_headers {
            let header_name =
                reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    HttpError::RequestFailed {
                        message: format!("Invalid header name '{}': {}", key, e),
                    }
                })?;
            let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                HttpError::RequestFailed {
                    message: format!("Invalid header value '{}': {}", value, e),
                }
            })?;
            headers.insert(header_name, header_value);
        }

        if !headers.is_empty() {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|e| HttpError::RequestFailed {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            timeout_seconds: config.timeout.as_secs(),
        })
    }

    /// Convert reqwest error to our error type
    fn convert_error(&self, err: reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout {
                seconds: self.timeout_seconds,
            }
        } else if err.is_connect() {
            HttpError::Network {
                message: format!("Connection failed: {}", err),
            }
        } else if let Some(status) = err.status() {
            HttpError::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            HttpError::RequestFailed {
                message: err.to_string(),
            }
        }
    }

    /// Convert reqwest response to our response type
    async fn convert_response(&self, response: reqwest::Response) -> HttpResult<HttpResponse> {
        let status = response.status().as_u16();

        let body = response
            .bytes()
            .await
            .map_err(|e| self.convert_error(e))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.convert_error(e))?;

        self.convert_response(response).await
    }
}
