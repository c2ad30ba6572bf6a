//! Concurrent tile fetching.
//!
//! The tile list is drained in fixed-size chunks, strictly one after another.
//! Inside a chunk a bounded number of workers resolve tiles concurrently:
//! a cached tile is converted and mirrored, a missing one is fetched with
//! retry and backoff first. One tile's failure never stops its siblings.

mod progress;
mod url;

pub use progress::*;
pub use url::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cache::{ArtifactKind, CacheStore};
use crate::convert::ConversionPolicy;
use crate::http::HttpClient;
use crate::mirror::OutputMirror;
use crate::{DownloadConfig, NetworkError, Result, StyleName, TileCoord, TileDownloaderError};

/// What to do with every tile of one session
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub style: StyleName,
    pub template: UrlTemplate,
    pub conversion: ConversionPolicy,
    /// Destination for copies of every artifact, if any
    pub mirror: Option<OutputMirror>,
}

/// How a single tile was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    /// Fetched from the network and stored
    Downloaded { converted: bool },
    /// Already in the cache
    Skipped { converted: bool },
    /// Retries exhausted or the tile could not be stored
    Failed,
    /// Not started because the session was cancelled
    Cancelled,
}

/// Per-outcome tile counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub converted: usize,
    pub failed: usize,
    /// Tiles never started because of cancellation
    pub not_started: usize,
    pub cancelled: bool,
}

impl FetchStats {
    fn record(&mut self, outcome: TileOutcome) {
        match outcome {
            TileOutcome::Downloaded { converted } => {
                self.downloaded += 1;
                self.converted += converted as usize;
            }
            TileOutcome::Skipped { converted } => {
                self.skipped += 1;
                self.converted += converted as usize;
            }
            TileOutcome::Failed => self.failed += 1,
            TileOutcome::Cancelled => {}
        }
    }

    /// Tiles that reached a terminal outcome
    pub fn resolved(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// Result of converting and mirroring a stored tile
struct Finalized {
    converted: bool,
    size_bytes: u64,
}

/// Worker pool resolving tiles against the cache and a tile server
#[derive(Clone)]
pub struct TileFetcher {
    client: Arc<dyn HttpClient>,
    cache: CacheStore,
    config: Arc<DownloadConfig>,
}

impl TileFetcher {
    pub fn new(client: Arc<dyn HttpClient>, cache: CacheStore, config: DownloadConfig) -> Self {
        Self {
            client,
            cache,
            config: Arc::new(config),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Resolve every tile, reporting progress to `sink`
    ///
    /// `download_started` is emitted first and `tiles_downloaded` last, the
    /// latter only when the run was not cancelled.
    pub async fn fetch_all(
        &self,
        tiles: &[TileCoord],
        job: Arc<FetchJob>,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> FetchStats {
        let mut stats = FetchStats {
            total: tiles.len(),
            ..Default::default()
        };
        sink.emit(ProgressEvent::DownloadStarted {
            total_tiles: tiles.len(),
        });

        let batch_size = self.config.batch_size.max(1);
        let batch_count = tiles.len().div_ceil(batch_size);

        for (index, batch) in tiles.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(
                    "Cancelled before chunk {}/{}, stopping",
                    index + 1,
                    batch_count
                );
                break;
            }

            tracing::debug!(
                "Processing chunk {}/{} ({} tiles)",
                index + 1,
                batch_count,
                batch.len()
            );

            for outcome in self.run_batch(batch, &job, &sink, cancel).await {
                stats.record(outcome);
            }
        }

        stats.not_started = stats.total - stats.resolved();
        stats.cancelled = cancel.is_cancelled();

        if !stats.cancelled {
            sink.emit(ProgressEvent::TilesDownloaded);
        }

        tracing::info!(
            "{} downloaded, {} cached, {} failed, {} not started",
            stats.downloaded,
            stats.skipped,
            stats.failed,
            stats.not_started
        );

        stats
    }

    async fn run_batch(
        &self,
        batch: &[TileCoord],
        job: &Arc<FetchJob>,
        sink: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Vec<TileOutcome> {
        let workers = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for &tile in batch {
            let fetcher = self.clone();
            let job = Arc::clone(job);
            let sink = Arc::clone(sink);
            let cancel = cancel.clone();
            let workers = Arc::clone(&workers);

            tasks.spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return TileOutcome::Cancelled;
                };
                if cancel.is_cancelled() {
                    return TileOutcome::Cancelled;
                }
                fetcher.resolve_tile(tile, &job, sink.as_ref()).await
            });
        }

        let mut outcomes = Vec::with_capacity(batch.len());
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!("Tile worker panicked: {}", e);
                    outcomes.push(TileOutcome::Failed);
                }
            }
        }
        outcomes
    }

    /// Resolve one tile: cache hit or fetch, then convert and mirror
    pub async fn resolve_tile(
        &self,
        tile: TileCoord,
        job: &FetchJob,
        sink: &dyn ProgressSink,
    ) -> TileOutcome {
        let _guard = self.cache.lock_tile(&job.style, tile).await;

        let result = if self.cache.exists(&job.style, tile, ArtifactKind::Raw).await {
            self.finish_cached(tile, job, sink).await
        } else {
            self.download(tile, job, sink).await
        };

        result.unwrap_or_else(|e| {
            tracing::error!("Tile {} failed: {}", tile, e);
            sink.emit(ProgressEvent::failed(tile));
            TileOutcome::Failed
        })
    }

    async fn finish_cached(
        &self,
        tile: TileCoord,
        job: &FetchJob,
        sink: &dyn ProgressSink,
    ) -> Result<TileOutcome> {
        let finalized = self.finalize(tile, job, false).await?;

        sink.emit(ProgressEvent::skipped(tile, finalized.size_bytes));
        if finalized.converted {
            sink.emit(ProgressEvent::converted(tile));
        }
        Ok(TileOutcome::Skipped {
            converted: finalized.converted,
        })
    }

    async fn download(
        &self,
        tile: TileCoord,
        job: &FetchJob,
        sink: &dyn ProgressSink,
    ) -> Result<TileOutcome> {
        let url = job.template.render(tile);
        let body = self.fetch_with_retry(&url).await?;
        self.cache.write_raw(&job.style, tile, &body).await?;

        let finalized = self.finalize(tile, job, true).await?;

        sink.emit(ProgressEvent::downloaded(tile, finalized.size_bytes));
        if finalized.converted {
            sink.emit(ProgressEvent::converted(tile));
        }
        Ok(TileOutcome::Downloaded {
            converted: finalized.converted,
        })
    }

    /// GET with bounded retries; backoff is only slept between attempts
    async fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let retry = self.config.retry;
        let timeout = self.config.request_timeout;
        let mut attempt = 0;

        loop {
            tracing::debug!("GET {} (attempt {})", url, attempt + 1);

            let error = match tokio::time::timeout(timeout, self.client.get(url)).await {
                Ok(Ok(response)) if response.is_ok() => return Ok(response.body),
                Ok(Ok(response)) => NetworkError::HttpError {
                    status: response.status,
                },
                Ok(Err(e)) => NetworkError::from(e),
                Err(_) => NetworkError::Timeout {
                    seconds: timeout.as_secs(),
                },
            };

            attempt += 1;
            if attempt >= retry.max_attempts {
                return Err(NetworkError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                }
                .into());
            }

            let delay = retry.delay_for(attempt - 1);
            tracing::warn!("{} failed ({}), retrying in {:?}", url, error, delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Convert and mirror on the blocking pool
    async fn finalize(&self, tile: TileCoord, job: &FetchJob, fresh: bool) -> Result<Finalized> {
        let raw = self.cache.artifact_path(&job.style, tile, ArtifactKind::Raw);
        let packed = self
            .cache
            .artifact_path(&job.style, tile, ArtifactKind::Packed);
        let conversion = job.conversion;
        let mirror = job.mirror.clone();

        tokio::task::spawn_blocking(move || {
            finalize_tile(conversion, mirror.as_ref(), &raw, &packed, fresh)
        })
        .await
        .map_err(|e| TileDownloaderError::Io(std::io::Error::other(e)))?
    }
}

fn finalize_tile(
    conversion: ConversionPolicy,
    mirror: Option<&OutputMirror>,
    raw: &Path,
    packed: &Path,
    fresh: bool,
) -> Result<Finalized> {
    let converted = conversion.apply(raw, packed, fresh)?;

    if let Some(mirror) = mirror {
        let mut artifacts: Vec<PathBuf> = vec![raw.to_path_buf()];
        if conversion.pack_rgb565 {
            artifacts.push(packed.to_path_buf());
        }
        for artifact in &artifacts {
            mirror.mirror(artifact)?;
        }
    }

    Ok(Finalized {
        converted,
        size_bytes: std::fs::metadata(raw)?.len(),
    })
}
