//! Read-side queries over the configured sources and the cache.
//!
//! Style arguments are names as they appear in a URL path segment; they are
//! percent-decoded and sanitized before touching the filesystem.

use std::path::Path;

use crate::{Downloader, Result, StyleName, TileCoord};

impl Downloader {
    /// Configured styles as (display name, URL template), sorted by name
    pub fn list_styles(&self) -> Vec<(String, String)> {
        self.sources()
            .iter()
            .map(|(name, url)| (name.to_string(), url.to_string()))
            .collect()
    }

    /// Output root used when a request does not name one
    pub fn default_output_dir(&self) -> &Path {
        &self.paths().default_output_root
    }

    /// Bytes of a cached raw tile, `None` when it is not cached
    pub async fn cached_tile(&self, style: &str, z: u8, x: u32, y: u32) -> Result<Option<Vec<u8>>> {
        let style = StyleName::from_url_segment(style);
        if style.is_empty() {
            return Ok(None);
        }
        self.cache().read_raw(&style, TileCoord::new(z, x, y)).await
    }

    /// Remove a style's whole cache subtree; `false` when there was none
    pub async fn delete_style_cache(&self, style: &str) -> Result<bool> {
        self.cache()
            .delete_style(&StyleName::from_url_segment(style))
            .await
    }

    /// Every cached raw tile of a style as `[z, x, y]`
    pub async fn list_cached_tiles(&self, style: &str) -> Result<Vec<[u32; 3]>> {
        let tiles = self
            .cache()
            .cached_tiles(&StyleName::from_url_segment(style))
            .await?;
        Ok(tiles
            .into_iter()
            .map(|tile| [tile.z as u32, tile.x, tile.y])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::http::MockHttpClient;
    use crate::{DownloadConfig, Downloader, MapSources, Paths, StyleName, TileCoord};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn downloader(temp: &TempDir) -> Downloader {
        Downloader::new(
            Arc::new(MockHttpClient::new()),
            MapSources::new()
                .with_source("OpenStreetMap", "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png")
                .with_source("Dark Matter", "https://basemaps.test/dark/{z}/{x}/{y}.png"),
            Paths::new(temp.path().join("cache"), temp.path().join("out")),
            DownloadConfig::default(),
        )
    }

    #[test]
    fn test_list_styles_and_default_output() {
        let temp = TempDir::new().unwrap();
        let downloader = downloader(&temp);

        let names: Vec<String> = downloader.list_styles().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Dark Matter", "OpenStreetMap"]);
        assert_eq!(downloader.default_output_dir(), temp.path().join("out"));
    }

    #[tokio::test]
    async fn test_cached_tile_by_url_segment() {
        let temp = TempDir::new().unwrap();
        let downloader = downloader(&temp);
        let style = StyleName::sanitize("Dark Matter");
        downloader
            .cache()
            .write_raw(&style, TileCoord::new(3, 4, 5), b"png-bytes")
            .await
            .unwrap();

        assert_eq!(
            downloader.cached_tile("Dark%20Matter", 3, 4, 5).await.unwrap(),
            Some(b"png-bytes".to_vec())
        );
        assert_eq!(downloader.cached_tile("Dark-Matter", 3, 4, 6).await.unwrap(), None);
        assert_eq!(downloader.cached_tile("%%%", 3, 4, 5).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_and_delete_cached_tiles() {
        let temp = TempDir::new().unwrap();
        let downloader = downloader(&temp);
        let style = StyleName::sanitize("OpenStreetMap");
        for tile in [TileCoord::new(1, 1, 0), TileCoord::new(0, 0, 0)] {
            downloader.cache().write_raw(&style, tile, b"x").await.unwrap();
        }

        assert_eq!(
            downloader.list_cached_tiles("OpenStreetMap").await.unwrap(),
            vec![[0, 0, 0], [1, 1, 0]]
        );

        assert!(downloader.delete_style_cache("OpenStreetMap").await.unwrap());
        assert!(!downloader.delete_style_cache("OpenStreetMap").await.unwrap());
        assert!(downloader.list_cached_tiles("OpenStreetMap").await.unwrap().is_empty());
    }
}
