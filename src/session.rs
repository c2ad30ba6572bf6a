//! Download requests and the sessions that run them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::convert::ConversionPolicy;
use crate::fetch::{FetchJob, FetchStats, ProgressEvent, ProgressSink, TileFetcher};
use crate::tile::{Ring, TileSelection};
use crate::{StyleName, TileCoord, TileDownloaderError};

/// Message shown for failures whose details stay in the logs
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while processing your request";

/// Request to download the tiles covering a set of polygons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Rings of `[lat, lng]` pairs
    pub polygons: Vec<Ring>,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// URL template of one of the configured map sources
    pub map_style: String,
    /// Reduce tiles to a 256-color palette
    #[serde(default)]
    pub convert_to_8bit: bool,
    /// Also write packed RGB565 `.bin` files
    #[serde(default)]
    pub convert_to_rgb565_bin_files: bool,
    /// Output root; empty or missing selects the default
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl DownloadRequest {
    pub fn new(polygons: Vec<Ring>, min_zoom: u8, max_zoom: u8, map_style: impl Into<String>) -> Self {
        Self {
            polygons,
            min_zoom,
            max_zoom,
            map_style: map_style.into(),
            convert_to_8bit: false,
            convert_to_rgb565_bin_files: false,
            output_dir: None,
        }
    }

    pub fn with_conversion(mut self, convert_to_8bit: bool, convert_to_rgb565_bin_files: bool) -> Self {
        self.convert_to_8bit = convert_to_8bit;
        self.convert_to_rgb565_bin_files = convert_to_rgb565_bin_files;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<String>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn selection(&self) -> TileSelection {
        TileSelection::polygons(self.polygons.clone(), self.min_zoom, self.max_zoom)
    }

    pub fn conversion(&self) -> ConversionPolicy {
        ConversionPolicy::new(self.convert_to_8bit, self.convert_to_rgb565_bin_files)
    }
}

/// Request to download the world basemap, zoom 0 through 7
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldDownloadRequest {
    pub map_style: String,
    #[serde(default)]
    pub convert_to_8bit: bool,
    #[serde(default)]
    pub convert_to_rgb565_bin_files: bool,
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl WorldDownloadRequest {
    pub fn new(map_style: impl Into<String>) -> Self {
        Self {
            map_style: map_style.into(),
            convert_to_8bit: false,
            convert_to_rgb565_bin_files: false,
            output_dir: None,
        }
    }

    pub fn with_conversion(mut self, convert_to_8bit: bool, convert_to_rgb565_bin_files: bool) -> Self {
        self.convert_to_8bit = convert_to_8bit;
        self.convert_to_rgb565_bin_files = convert_to_rgb565_bin_files;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<String>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn conversion(&self) -> ConversionPolicy {
        ConversionPolicy::new(self.convert_to_8bit, self.convert_to_rgb565_bin_files)
    }
}

/// Session-level failure as shown to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum SessionError {
    /// The request was rejected before any work started
    #[error("{0}")]
    Rejected(String),

    /// Something failed internally; details were logged
    #[error("{}", GENERIC_FAILURE_MESSAGE)]
    Internal,
}

impl SessionError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<TileDownloaderError> for SessionError {
    fn from(err: TileDownloaderError) -> Self {
        match err {
            TileDownloaderError::Validation(message) => Self::Rejected(message),
            TileDownloaderError::StyleNotFound { .. } => {
                tracing::warn!("Rejected request: {}", err);
                Self::Rejected("Map style URL not found in configured map sources".to_string())
            }
            other => {
                tracing::error!("Error processing download: {}", other);
                Self::Internal
            }
        }
    }
}

/// What a finished session did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub style: String,
    pub output_dir: PathBuf,
    pub total_tiles: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub converted: usize,
    pub failed: usize,
    pub not_started: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Every tile is in the cache
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.not_started == 0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// One validated download, ready to run
///
/// Holds the resolved tile list, the per-tile job and the session's own
/// cancellation token. Nothing is persisted beyond the cache itself.
#[derive(Debug)]
pub struct DownloadSession {
    style_label: String,
    job: Arc<FetchJob>,
    tiles: Vec<TileCoord>,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

impl DownloadSession {
    pub(crate) fn new(
        style_label: String,
        job: FetchJob,
        tiles: Vec<TileCoord>,
        output_dir: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            style_label,
            job: Arc::new(job),
            tiles,
            output_dir,
            cancel,
        }
    }

    /// Display name of the map style
    pub fn style_label(&self) -> &str {
        &self.style_label
    }

    pub fn style(&self) -> &StyleName {
        &self.job.style
    }

    pub fn tiles(&self) -> &[TileCoord] {
        &self.tiles
    }

    /// `<output_root>/<Style>`
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drain the tile list through the fetcher
    ///
    /// Emits `download_complete` after the fetcher's events unless the
    /// session was cancelled.
    pub async fn run(self, fetcher: &TileFetcher, sink: Arc<dyn ProgressSink>) -> SessionSummary {
        let started_at = Utc::now();
        tracing::info!(
            "Starting '{}' session: {} tiles into {}",
            self.style_label,
            self.tiles.len(),
            self.output_dir.display()
        );

        let stats: FetchStats = fetcher
            .fetch_all(&self.tiles, Arc::clone(&self.job), Arc::clone(&sink), &self.cancel)
            .await;

        if !stats.cancelled {
            sink.emit(ProgressEvent::DownloadComplete {
                output_dir: self.output_dir.display().to_string(),
            });
        }

        SessionSummary {
            style: self.style_label,
            output_dir: self.output_dir,
            total_tiles: stats.total,
            downloaded: stats.downloaded,
            skipped: stats.skipped,
            converted: stats.converted,
            failed: stats.failed,
            not_started: stats.not_started,
            cancelled: stats.cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let request: DownloadRequest = serde_json::from_str(
            r#"{
                "polygons": [[[52.5, 13.4], [52.6, 13.4], [52.6, 13.5]]],
                "min_zoom": 10,
                "max_zoom": 12,
                "map_style": "https://{s}.tile.test/{z}/{x}/{y}.png",
                "convert_to_rgb565_bin_files": true,
                "output_dir": ""
            }"#,
        )
        .unwrap();

        assert_eq!(request.polygons[0].len(), 3);
        assert!(!request.convert_to_8bit);
        assert_eq!(request.conversion(), ConversionPolicy::new(true, true));
        assert!(request.selection().validate().is_ok());
    }

    #[test]
    fn test_world_request_defaults() {
        let request: WorldDownloadRequest =
            serde_json::from_str(r#"{"map_style": "https://tile.test/{z}/{x}/{y}.png"}"#).unwrap();
        assert!(request.conversion().is_noop());
        assert_eq!(request.output_dir, None);
    }

    #[test]
    fn test_validation_error_is_passed_through() {
        let err: SessionError = TileDownloaderError::Validation("No polygons provided".to_string()).into();
        assert_eq!(err.message(), "No polygons provided");
    }

    #[test]
    fn test_internal_error_is_generic() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/secret/path");
        let err: SessionError = TileDownloaderError::Io(io).into();
        assert_eq!(err, SessionError::Internal);
        assert_eq!(err.message(), GENERIC_FAILURE_MESSAGE);
        assert!(!err.message().contains("secret"));
    }

    #[test]
    fn test_summary_completeness() {
        let now = Utc::now();
        let mut summary = SessionSummary {
            style: "OSM".to_string(),
            output_dir: PathBuf::from("/out/OSM"),
            total_tiles: 3,
            downloaded: 2,
            skipped: 1,
            converted: 0,
            failed: 0,
            not_started: 0,
            cancelled: false,
            started_at: now,
            finished_at: now,
        };
        assert!(summary.is_complete());
        assert_eq!(summary.duration(), chrono::Duration::zero());

        summary.failed = 1;
        assert!(!summary.is_complete());
    }
}
