use thiserror::Error;

/// Errors that can occur while resolving, fetching or storing tiles
#[derive(Error, Debug)]
pub enum TileDownloaderError {
    /// Network-related errors during tile download
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Request validation errors (zoom range, polygons)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested tile URL is not one of the configured map sources
    #[error("Map style not found for URL: {url}")]
    StyleNotFound { url: String },

    /// Configuration loading or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors while reading or writing cache artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or conversion errors
    #[error("Image error: {0}")]
    Image(String),
}

impl From<image::ImageError> for TileDownloaderError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl From<png::EncodingError> for TileDownloaderError {
    fn from(err: png::EncodingError) -> Self {
        Self::Image(format!("PNG encoding failed: {}", err))
    }
}

impl From<png::DecodingError> for TileDownloaderError {
    fn from(err: png::DecodingError) -> Self {
        Self::Image(format!("PNG decoding failed: {}", err))
    }
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Tile server answered with a non-success status
    #[error("HTTP request failed: {status}")]
    HttpError { status: u16 },

    /// Request timeout
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Connection error
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// All retry attempts for a tile were exhausted
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<NetworkError>,
    },
}

pub type Result<T> = std::result::Result<T, TileDownloaderError>;
