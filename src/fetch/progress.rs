use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::{TileBounds, TileCoord};

/// Progress reported while a session runs
///
/// Serializes as `{"event": "<name>", ...payload}` so a transport can forward
/// it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    DownloadStarted {
        total_tiles: usize,
    },
    TileDownloaded {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        size_bytes: u64,
    },
    TileSkipped {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        size_bytes: u64,
    },
    TileConverted {
        tile: String,
    },
    TileFailed {
        tile: String,
    },
    /// Every chunk ran without cancellation
    TilesDownloaded,
    DownloadComplete {
        output_dir: String,
    },
    DownloadCancelled,
}

impl ProgressEvent {
    pub fn downloaded(tile: TileCoord, size_bytes: u64) -> Self {
        let TileBounds {
            west,
            south,
            east,
            north,
        } = tile.bounds();
        Self::TileDownloaded {
            west,
            south,
            east,
            north,
            size_bytes,
        }
    }

    pub fn skipped(tile: TileCoord, size_bytes: u64) -> Self {
        let TileBounds {
            west,
            south,
            east,
            north,
        } = tile.bounds();
        Self::TileSkipped {
            west,
            south,
            east,
            north,
            size_bytes,
        }
    }

    pub fn converted(tile: TileCoord) -> Self {
        Self::TileConverted { tile: tile.id() }
    }

    pub fn failed(tile: TileCoord) -> Self {
        Self::TileFailed { tile: tile.id() }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::DownloadStarted { .. } => "download_started",
            Self::TileDownloaded { .. } => "tile_downloaded",
            Self::TileSkipped { .. } => "tile_skipped",
            Self::TileConverted { .. } => "tile_converted",
            Self::TileFailed { .. } => "tile_failed",
            Self::TilesDownloaded => "tiles_downloaded",
            Self::DownloadComplete { .. } => "download_complete",
            Self::DownloadCancelled => "download_cancelled",
        }
    }
}

/// Receiver of progress events
///
/// Called from worker tasks, so implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver means nobody is listening any more
        let _ = self.sender.send(event);
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::DownloadStarted { total_tiles } => {
                tracing::info!("Download started: {} tiles", total_tiles)
            }
            ProgressEvent::TileDownloaded { size_bytes, .. } => {
                tracing::debug!("Tile downloaded ({} bytes)", size_bytes)
            }
            ProgressEvent::TileSkipped { size_bytes, .. } => {
                tracing::debug!("Tile already cached ({} bytes)", size_bytes)
            }
            ProgressEvent::TileConverted { tile } => tracing::debug!("Tile {} converted", tile),
            ProgressEvent::TileFailed { tile } => tracing::warn!("Tile {} failed", tile),
            ProgressEvent::TilesDownloaded => tracing::info!("All tiles processed"),
            ProgressEvent::DownloadComplete { output_dir } => {
                tracing::info!("Download complete, output in {}", output_dir)
            }
            ProgressEvent::DownloadCancelled => tracing::info!("Download cancelled"),
        }
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.lock().clone()
    }

    /// Names of the received events, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.lock().iter().map(ProgressEvent::name).collect()
    }

    /// How many events with the given name were received
    pub fn count(&self, name: &str) -> usize {
        self.lock().iter().filter(|e| e.name() == name).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ProgressEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.lock().push(event);
    }
}
