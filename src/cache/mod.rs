//! On-disk tile cache.
//!
//! Layout, relative to the cache root:
//! ```text
//! <style>/<z>/<x>/<y>.png          raw tile as served
//! <style>/rgb565/<z>/<x>/<y>.bin   packed 16-bit pixel dump
//! ```
//! Paths are a pure function of style, tile and artifact kind. A file that
//! exists is authoritative and is never fetched again.

mod locks;

pub use locks::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Result, StyleName, TileCoord};

/// Directory holding packed artifacts inside a style directory
pub const PACKED_DIR: &str = "rgb565";

/// Kind of artifact stored for a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The image as fetched (possibly palette-reduced in place)
    Raw,
    /// Big-endian RGB565 pixel dump
    Packed,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Raw => "png",
            Self::Packed => "bin",
        }
    }
}

/// Flat-file tile cache keyed by style and tile coordinate
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    locks: Arc<TileLocks>,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::new(TileLocks::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<style>`
    pub fn style_dir(&self, style: &StyleName) -> PathBuf {
        self.root.join(style)
    }

    /// Path of an artifact, whether or not it exists
    pub fn artifact_path(&self, style: &StyleName, tile: TileCoord, kind: ArtifactKind) -> PathBuf {
        let base = match kind {
            ArtifactKind::Raw => self.style_dir(style),
            ArtifactKind::Packed => self.style_dir(style).join(PACKED_DIR),
        };
        base.join(tile.z.to_string())
            .join(tile.x.to_string())
            .join(format!("{}.{}", tile.y, kind.extension()))
    }

    pub async fn exists(&self, style: &StyleName, tile: TileCoord, kind: ArtifactKind) -> bool {
        tokio::fs::try_exists(self.artifact_path(style, tile, kind))
            .await
            .unwrap_or(false)
    }

    /// Store a fetched tile, creating parent directories first
    pub async fn write_raw(&self, style: &StyleName, tile: TileCoord, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.artifact_path(style, tile, ArtifactKind::Raw);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staged = staging_path(&path);
        tokio::fs::write(&staged, bytes).await?;
        tokio::fs::rename(&staged, &path).await?;
        Ok(path)
    }

    /// Bytes of a cached raw tile, `None` if it is not cached
    pub async fn read_raw(&self, style: &StyleName, tile: TileCoord) -> Result<Option<Vec<u8>>> {
        let path = self.artifact_path(style, tile, ArtifactKind::Raw);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a style's whole cache subtree; `false` if there was none
    pub async fn delete_style(&self, style: &StyleName) -> Result<bool> {
        let dir = self.style_dir(style);
        if style.is_empty() || !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&dir).await?;
        tracing::info!("Deleted cache for style '{}' at {}", style, dir.display());
        Ok(true)
    }

    /// All raw tiles cached for a style, sorted by (z, x, y)
    ///
    /// Walks `<style>/<z>/<x>/<y>.png`; any directory or file whose name does
    /// not parse as an integer is skipped.
    pub async fn cached_tiles(&self, style: &StyleName) -> Result<Vec<TileCoord>> {
        let style_dir = self.style_dir(style);
        let mut tiles = Vec::new();
        if style.is_empty() || !tokio::fs::try_exists(&style_dir).await.unwrap_or(false) {
            return Ok(tiles);
        }

        for (z, z_dir) in numeric_subdirs::<u8>(&style_dir).await? {
            for (x, x_dir) in numeric_subdirs::<u32>(&z_dir).await? {
                let mut entries = tokio::fs::read_dir(&x_dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if !entry.file_type().await?.is_file()
                        || path.extension().and_then(|e| e.to_str()) != Some("png")
                    {
                        continue;
                    }
                    if let Some(y) = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(|s| s.parse::<u32>().ok())
                    {
                        tiles.push(TileCoord::new(z, x, y));
                    }
                }
            }
        }

        tiles.sort();
        Ok(tiles)
    }

    /// Serialize writers of the same (style, tile)
    pub async fn lock_tile(&self, style: &StyleName, tile: TileCoord) -> TileGuard {
        self.locks.acquire(style, tile).await
    }
}

/// Sibling a file is written to before being renamed over `path`
///
/// The `.part` suffix keeps an interrupted write from ever looking like a
/// cached artifact.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Replace `path` with `bytes` without leaving a partial file behind
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let staged = staging_path(path);
    std::fs::write(&staged, bytes)?;
    std::fs::rename(&staged, path)
}

async fn numeric_subdirs<T: std::str::FromStr>(dir: &Path) -> Result<Vec<(T, PathBuf)>> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        if let Some(value) = entry.file_name().to_str().and_then(|n| n.parse::<T>().ok()) {
            found.push((value, entry.path()));
        }
    }
    Ok(found)
}
