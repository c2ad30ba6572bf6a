//! Copies cache artifacts into a user-chosen output tree.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::Result;

/// Mirrors artifacts from one style's cache directory into its output directory
///
/// The relative layout under the cache directory is reproduced under the
/// output directory. Copies always overwrite and keep the source mtime.
#[derive(Debug, Clone)]
pub struct OutputMirror {
    style_cache_dir: PathBuf,
    style_output_dir: PathBuf,
}

impl OutputMirror {
    pub fn new(style_cache_dir: impl Into<PathBuf>, style_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            style_cache_dir: style_cache_dir.into(),
            style_output_dir: style_output_dir.into(),
        }
    }

    pub fn style_cache_dir(&self) -> &Path {
        &self.style_cache_dir
    }

    pub fn style_output_dir(&self) -> &Path {
        &self.style_output_dir
    }

    /// Whether copying would write into (or out of) the cache tree itself
    pub fn is_self_referential(&self) -> bool {
        let cache = normalize(&self.style_cache_dir);
        let output = normalize(&self.style_output_dir);
        output.starts_with(&cache) || cache.starts_with(&output)
    }

    /// Copy one artifact; returns the destination, or `None` if skipped
    pub fn mirror(&self, artifact_path: &Path) -> Result<Option<PathBuf>> {
        if self.is_self_referential() {
            tracing::debug!(
                "Output {} overlaps cache {}, not mirroring",
                self.style_output_dir.display(),
                self.style_cache_dir.display()
            );
            return Ok(None);
        }

        let Ok(relative) = artifact_path.strip_prefix(&self.style_cache_dir) else {
            tracing::warn!(
                "{} is outside {}, not mirroring",
                artifact_path.display(),
                self.style_cache_dir.display()
            );
            return Ok(None);
        };

        let destination = self.style_output_dir.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(artifact_path, &destination)?;

        if let Ok(modified) = fs::metadata(artifact_path).and_then(|m| m.modified()) {
            File::options()
                .write(true)
                .open(&destination)
                .and_then(|file| file.set_modified(modified))?;
        }

        Ok(Some(destination))
    }
}

/// Canonical form when the path exists, the path itself otherwise
fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
