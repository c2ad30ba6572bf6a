use std::path::{Path, PathBuf};

use crate::StyleName;

/// Directory roots used by a downloader instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Root of the tile cache
    pub cache_root: PathBuf,
    /// Output root used when a request does not name one
    pub default_output_root: PathBuf,
}

impl Paths {
    pub fn new(cache_root: impl Into<PathBuf>, default_output_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            default_output_root: default_output_root.into(),
        }
    }

    /// Standard layout under a base directory
    ///
    /// The cache lives in `<base>/tile-cache`. Output defaults to
    /// `~/Downloads/MapTileDownloader` when a Downloads folder exists,
    /// `<base>/downloads/output` otherwise.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let default_output_root = dirs::home_dir()
            .map(|home| home.join("Downloads"))
            .filter(|downloads| downloads.is_dir())
            .map(|downloads| downloads.join("MapTileDownloader"))
            .unwrap_or_else(|| base.join("downloads").join("output"));

        Self {
            cache_root: base.join("tile-cache"),
            default_output_root,
        }
    }

    /// Output root for a request; blank input selects the default, `~` expands
    pub fn output_root(&self, requested: Option<&str>) -> PathBuf {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(path) => expand_home(path),
            None => self.default_output_root.clone(),
        }
    }

    /// `<output_root>/<style>`
    pub fn style_output_dir(&self, style: &StyleName, requested: Option<&str>) -> PathBuf {
        self.output_root(requested).join(style)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
