//! Entry point tying sources, cache, fetcher and cancellation together.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::cancel::CancellationController;
use crate::convert::ConversionPolicy;
use crate::fetch::{FetchJob, ProgressEvent, ProgressSink, TileFetcher, UrlTemplate};
use crate::http::{HttpClient, create_client_with_config};
use crate::mirror::OutputMirror;
use crate::session::{
    DownloadRequest, DownloadSession, SessionError, SessionSummary, WorldDownloadRequest,
};
use crate::tile::TileSelection;
use crate::{DownloadConfig, MapSources, Paths, Result, StyleName, TileDownloaderError};

/// Map tile downloader
///
/// Long-lived: owns the configured map sources, the cache and the worker
/// pool. Each `run_*` call validates a request, builds a [`DownloadSession`]
/// and drives it to completion or cancellation.
pub struct Downloader {
    sources: MapSources,
    paths: Paths,
    fetcher: TileFetcher,
    cancellation: CancellationController,
}

impl Downloader {
    pub fn new(
        client: Arc<dyn HttpClient>,
        sources: MapSources,
        paths: Paths,
        config: DownloadConfig,
    ) -> Self {
        let cache = CacheStore::new(&paths.cache_root);
        Self {
            sources,
            paths,
            fetcher: TileFetcher::new(client, cache, config),
            cancellation: CancellationController::new(),
        }
    }

    /// Build a downloader on the default HTTP client for the enabled features
    pub fn with_default_client(
        sources: MapSources,
        paths: Paths,
        config: DownloadConfig,
    ) -> Result<Self> {
        let client = create_client_with_config(config.http_config())
            .map_err(TileDownloaderError::Config)?;
        Ok(Self::new(client, sources, paths, config))
    }

    pub fn sources(&self) -> &MapSources {
        &self.sources
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn cache(&self) -> &CacheStore {
        self.fetcher.cache()
    }

    pub fn config(&self) -> &DownloadConfig {
        self.fetcher.config()
    }

    /// Validate a polygon request and resolve its tiles
    pub async fn prepare(&self, request: &DownloadRequest) -> Result<DownloadSession> {
        self.prepare_selection(
            &request.map_style,
            request.selection(),
            request.conversion(),
            request.output_dir.as_deref(),
        )
        .await
    }

    /// Validate a world request and resolve its tiles
    pub async fn prepare_world(&self, request: &WorldDownloadRequest) -> Result<DownloadSession> {
        self.prepare_selection(
            &request.map_style,
            TileSelection::World,
            request.conversion(),
            request.output_dir.as_deref(),
        )
        .await
    }

    /// Checks run before any filesystem work: style, then geometry
    async fn prepare_selection(
        &self,
        map_style: &str,
        selection: TileSelection,
        conversion: ConversionPolicy,
        output_dir: Option<&str>,
    ) -> Result<DownloadSession> {
        let style_label = self.sources.resolve_style_name(map_style)?.to_string();
        let style = StyleName::sanitize(&style_label);
        if style.is_empty() {
            return Err(TileDownloaderError::Config(format!(
                "Map style '{}' has no usable directory name",
                style_label
            )));
        }

        selection.validate()?;
        let tiles = selection.resolve()?;

        let style_output_dir: PathBuf = self.paths.style_output_dir(&style, output_dir);
        tokio::fs::create_dir_all(&style_output_dir).await?;

        let job = FetchJob {
            template: UrlTemplate::new(map_style, self.config().subdomains.clone()),
            conversion,
            mirror: Some(OutputMirror::new(
                self.cache().style_dir(&style),
                &style_output_dir,
            )),
            style,
        };

        Ok(DownloadSession::new(
            style_label,
            job,
            tiles,
            style_output_dir,
            self.cancellation.start(),
        ))
    }

    /// Run a polygon download end to end
    pub async fn run_polygons(
        &self,
        request: &DownloadRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> std::result::Result<SessionSummary, SessionError> {
        let session = self.prepare(request).await?;
        Ok(session.run(&self.fetcher, sink).await)
    }

    /// Run a world basemap download end to end
    pub async fn run_world(
        &self,
        request: &WorldDownloadRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> std::result::Result<SessionSummary, SessionError> {
        let session = self.prepare_world(request).await?;
        Ok(session.run(&self.fetcher, sink).await)
    }

    /// Run an already prepared session
    pub async fn run(&self, session: DownloadSession, sink: Arc<dyn ProgressSink>) -> SessionSummary {
        session.run(&self.fetcher, sink).await
    }

    /// Run a prepared session, cancelling it once `signal` resolves
    ///
    /// The session's token is armed before `signal` is first polled, so a
    /// signal that is already pending still stops the run before any fetch.
    pub async fn run_until<F>(
        &self,
        session: DownloadSession,
        sink: Arc<dyn ProgressSink>,
        signal: F,
    ) -> SessionSummary
    where
        F: Future<Output = ()>,
    {
        let token = session.cancellation_token().clone();
        let run = session.run(&self.fetcher, Arc::clone(&sink));
        tokio::pin!(run);

        tokio::select! {
            biased;
            _ = signal => {
                token.cancel();
                tracing::info!("Cancellation requested");
                sink.emit(ProgressEvent::DownloadCancelled);
                run.await
            }
            summary = &mut run => summary,
        }
    }

    /// Cancel the running session and report it to `sink`
    ///
    /// Returns whether a session was actually running.
    pub fn cancel(&self, sink: &dyn ProgressSink) -> bool {
        let was_running = self.cancellation.cancel();
        sink.emit(ProgressEvent::DownloadCancelled);
        was_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::CollectingSink;
    use crate::http::MockHttpClient;
    use crate::{DownloadConfigBuilder, TileCoord};
    use tempfile::TempDir;

    const URL: &str = "https://{s}.tiles.test/{z}/{x}/{y}.png";

    fn downloader(temp: &TempDir, client: Arc<MockHttpClient>) -> Downloader {
        Downloader::new(
            client,
            MapSources::new().with_source("Test Map", URL),
            Paths::new(temp.path().join("cache"), temp.path().join("out")),
            DownloadConfigBuilder::for_testing().build(),
        )
    }

    fn tiny_square() -> Vec<[f64; 2]> {
        vec![
            [52.5200, 13.4000],
            [52.5201, 13.4000],
            [52.5201, 13.4001],
            [52.5200, 13.4001],
        ]
    }

    #[tokio::test]
    async fn test_unknown_style_is_rejected_before_any_work() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockHttpClient::new());
        let downloader = downloader(&temp, Arc::clone(&client));
        let sink = Arc::new(CollectingSink::new());

        let request = DownloadRequest::new(vec![tiny_square()], 0, 2, "https://other/{z}/{x}/{y}");
        let err = downloader.run_polygons(&request, sink.clone()).await.unwrap_err();

        assert!(matches!(err, SessionError::Rejected(_)));
        assert!(sink.events().is_empty());
        assert_eq!(client.request_count(), 0);
        assert!(!temp.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_invalid_zoom_is_rejected() {
        let temp = TempDir::new().unwrap();
        let downloader = downloader(&temp, Arc::new(MockHttpClient::new()));

        let request = DownloadRequest::new(vec![tiny_square()], 5, 3, URL);
        let err = downloader
            .run_polygons(&request, Arc::new(CollectingSink::new()))
            .await
            .unwrap_err();
        assert!(err.message().contains("Invalid zoom range"));

        let request = DownloadRequest::new(Vec::new(), 0, 3, URL);
        let err = downloader
            .run_polygons(&request, Arc::new(CollectingSink::new()))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "No polygons provided");
    }

    #[tokio::test]
    async fn test_polygon_session_writes_cache_and_output() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockHttpClient::new());
        let downloader = downloader(&temp, Arc::clone(&client));
        let sink = Arc::new(CollectingSink::new());

        let request = DownloadRequest::new(vec![tiny_square()], 0, 2, URL);
        let summary = downloader.run_polygons(&request, sink.clone()).await.unwrap();

        assert_eq!(summary.total_tiles, 3);
        assert_eq!(summary.downloaded, 3);
        assert!(summary.is_complete());
        assert_eq!(summary.output_dir, temp.path().join("out/Test-Map"));

        let tile = TileCoord::containing(52.52, 13.40, 2);
        let relative = format!("{}/{}/{}.png", tile.z, tile.x, tile.y);
        assert!(temp.path().join("cache/Test-Map").join(&relative).exists());
        assert!(temp.path().join("out/Test-Map").join(&relative).exists());

        let names = sink.names();
        assert_eq!(names[names.len() - 2..], ["tiles_downloaded", "download_complete"]);
    }

    #[tokio::test]
    async fn test_output_dir_override() {
        let temp = TempDir::new().unwrap();
        let downloader = downloader(&temp, Arc::new(MockHttpClient::new()));
        let chosen = temp.path().join("chosen");

        let request = DownloadRequest::new(vec![tiny_square()], 0, 0, URL)
            .with_output_dir(chosen.display().to_string());
        let summary = downloader
            .run_polygons(&request, Arc::new(CollectingSink::new()))
            .await
            .unwrap();

        assert_eq!(summary.output_dir, chosen.join("Test-Map"));
        assert!(chosen.join("Test-Map/0/0/0.png").exists());
    }

    #[tokio::test]
    async fn test_signal_before_run_cancels_session() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockHttpClient::new());
        let downloader = downloader(&temp, Arc::clone(&client));
        let sink = Arc::new(CollectingSink::new());

        let session = downloader
            .prepare(&DownloadRequest::new(vec![tiny_square()], 0, 2, URL))
            .await
            .unwrap();
        let summary = downloader
            .run_until(session, sink.clone(), std::future::ready(()))
            .await;

        assert!(summary.cancelled);
        assert_eq!(summary.not_started, 3);
        assert_eq!(client.request_count(), 0);
        assert_eq!(sink.names(), vec!["download_cancelled", "download_started"]);
    }

    #[tokio::test]
    async fn test_pending_signal_lets_session_finish() {
        let temp = TempDir::new().unwrap();
        let downloader = downloader(&temp, Arc::new(MockHttpClient::new()));
        let sink = Arc::new(CollectingSink::new());

        let session = downloader
            .prepare(&DownloadRequest::new(vec![tiny_square()], 0, 2, URL))
            .await
            .unwrap();
        let summary = downloader
            .run_until(session, sink.clone(), std::future::pending())
            .await;

        assert!(summary.is_complete());
        assert_eq!(summary.downloaded, 3);
        assert_eq!(sink.names().last(), Some(&"download_complete"));
    }

    #[tokio::test]
    async fn test_cancel_emits_event() {
        let temp = TempDir::new().unwrap();
        let downloader = downloader(&temp, Arc::new(MockHttpClient::new()));
        let sink = CollectingSink::new();

        assert!(!downloader.cancel(&sink));
        assert_eq!(sink.names(), vec!["download_cancelled"]);
    }
}
