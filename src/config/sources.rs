use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{Result, TileDownloaderError};

/// Configured map styles: display name to URL template
///
/// Loaded from a flat JSON object such as
/// `{"OpenStreetMap": "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapSources {
    sources: BTreeMap<String, String>,
}

impl MapSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a style
    pub fn with_source(mut self, name: impl Into<String>, url_template: impl Into<String>) -> Self {
        self.sources.insert(name.into(), url_template.into());
        self
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TileDownloaderError::Config(format!("Invalid map sources JSON: {}", e)))
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TileDownloaderError::Config(format!(
                "Cannot read map sources from {}: {}",
                path.display(),
                e
            ))
        })?;
        let sources = Self::from_json(&json)?;
        tracing::info!("Loaded {} map sources from {}", sources.len(), path.display());
        Ok(sources)
    }

    /// Style display names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// All (name, URL template) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    /// Display name of the style whose template is exactly `url`
    pub fn resolve_style_name(&self, url: &str) -> Result<&str> {
        self.sources
            .iter()
            .find(|(_, template)| template.as_str() == url)
            .map(|(name, _)| name.as_str())
            .ok_or_else(|| TileDownloaderError::StyleNotFound {
                url: url.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OSM: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

    #[test]
    fn test_parse_and_resolve() {
        let sources = MapSources::from_json(&format!(
            r#"{{"OpenStreetMap": "{}", "Esri World Imagery": "https://server/{{z}}/{{y}}/{{x}}"}}"#,
            OSM
        ))
        .unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources.resolve_style_name(OSM).unwrap(), "OpenStreetMap");
        assert_eq!(
            sources.names().collect::<Vec<_>>(),
            vec!["Esri World Imagery", "OpenStreetMap"]
        );
    }

    #[test]
    fn test_unknown_url_is_style_not_found() {
        let sources = MapSources::new().with_source("OpenStreetMap", OSM);
        match sources.resolve_style_name("https://unknown/{z}/{x}/{y}.png") {
            Err(TileDownloaderError::StyleNotFound { url }) => {
                assert!(url.contains("unknown"));
            }
            other => panic!("Expected StyleNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            MapSources::from_json("[1, 2]"),
            Err(TileDownloaderError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("map_sources.json");
        std::fs::write(&path, format!(r#"{{"OpenStreetMap": "{}"}}"#, OSM)).unwrap();

        let sources = MapSources::load(&path).unwrap();
        assert_eq!(sources.url_for("OpenStreetMap"), Some(OSM));

        assert!(MapSources::load(temp.path().join("missing.json")).is_err());
    }
}
