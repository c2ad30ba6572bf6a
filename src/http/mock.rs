use async_trait::async_trait;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use super::{HttpClient, HttpError, HttpResponse, HttpResult};

/// In-memory HTTP client for tests and offline development
///
/// Serves the same body for every URL unless configured otherwise, and records
/// every requested URL so callers can assert on fetch behaviour.
pub struct MockHttpClient {
    /// Body returned for successful requests
    body: Vec<u8>,
    /// Status returned for requests that are not configured to fail
    status: u16,
    /// Transport error returned for every request
    failure: Option<HttpError>,
    /// URL substrings that answer with HTTP 500
    failing_urls: Vec<String>,
    /// Simulated network delay
    simulated_delay: Option<Duration>,
    /// Every URL requested so far, in call order
    requests: Mutex<Vec<String>>,
}

impl MockHttpClient {
    /// Create a mock client serving a small true-color PNG tile
    pub fn new() -> Self {
        Self::with_body(Self::default_tile())
    }

    /// Create a mock client serving a custom body
    pub fn with_body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            status: 200,
            failure: None,
            failing_urls: Vec::new(),
            simulated_delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the given status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Fail every request with a transport error
    pub fn with_failure(mut self, error: HttpError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Answer HTTP 500 for URLs containing the given fragment
    pub fn failing_on(mut self, url_fragment: impl Into<String>) -> Self {
        self.failing_urls.push(url_fragment.into());
        self
    }

    /// Add a simulated network delay (useful for cancellation tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.simulated_delay = Some(delay);
        self
    }

    /// Number of GET requests made so far
    pub fn request_count(&self) -> usize {
        self.lock_requests().len()
    }

    /// URLs requested so far
    pub fn requested_urls(&self) -> Vec<String> {
        self.lock_requests().clone()
    }

    /// Number of requests whose URL contains the fragment
    pub fn requests_matching(&self, url_fragment: &str) -> usize {
        self.lock_requests()
            .iter()
            .filter(|url| url.contains(url_fragment))
            .count()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// An 8x8 opaque gradient PNG
    pub fn default_tile() -> Vec<u8> {
        let img = image::RgbImage::from_fn(8, 8, |x, y| {
            image::Rgb([(x * 32) as u8, (y * 32) as u8, ((x + y) * 16) as u8])
        });
        let mut buffer = Cursor::new(Vec::new());
        // Encoding into memory cannot hit an I/O error
        let _ = img.write_to(&mut buffer, image::ImageFormat::Png);
        buffer.into_inner()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        self.lock_requests().push(url.to_string());

        if let Some(delay) = self.simulated_delay {
            tracing::debug!("Simulating network delay: {:?}", delay);
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        if self.failing_urls.iter().any(|fragment| url.contains(fragment)) {
            return Ok(HttpResponse {
                status: 500,
                body: Vec::new(),
            });
        }

        Ok(HttpResponse {
            status: self.status,
            body: if self.status == 200 {
                self.body.clone()
            } else {
                Vec::new()
            },
        })
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_default_tile() {
        let client = MockHttpClient::new();
        let response = client.get("https://tiles.test/1/0/0.png").await.unwrap();

        assert!(response.is_ok());
        assert_eq!(
            image::guess_format(&response.body).unwrap(),
            image::ImageFormat::Png
        );
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failing_urls() {
        let client = MockHttpClient::new().failing_on("/3/");

        let ok = client.get("https://tiles.test/2/1/1.png").await.unwrap();
        let failed = client.get("https://tiles.test/3/1/1.png").await.unwrap();

        assert_eq!(ok.status, 200);
        assert_eq!(failed.status, 500);
        assert_eq!(client.requests_matching("/3/"), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_failure() {
        let client = MockHttpClient::new().with_failure(HttpError::Network {
            message: "Simulated network failure".to_string(),
        });

        assert!(client.get("https://tiles.test/0/0/0.png").await.is_err());
        assert_eq!(client.requested_urls(), vec!["https://tiles.test/0/0/0.png"]);
    }
}
