//! Tile identity: slippy-map coordinates, their geographic bounds, and
//! filesystem-safe style names.

mod bounds;
mod resolver;

pub use bounds::*;
pub use resolver::*;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.051129;
pub const MAX_LAT: f64 = 85.051129;

const TILE_EPSILON: f64 = 1e-14;

/// Slippy-map tile address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u8,
    /// Column, 0 at the antimeridian going east
    pub x: u32,
    /// Row, 0 at the north edge
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at this zoom
    pub fn tiles_per_axis(zoom: u8) -> u32 {
        1u32 << zoom
    }

    /// The tile containing the given point at `zoom`
    ///
    /// Points on or beyond the projection edges clamp to the outermost tile.
    pub fn containing(lat: f64, lon: f64, zoom: u8) -> Self {
        let n = Self::tiles_per_axis(zoom);
        let x = lon / 360.0 + 0.5;
        let sin_lat = lat.to_radians().sin();
        let y = 0.5 - 0.25 * ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / PI;

        Self {
            z: zoom,
            x: Self::axis_index(x, n),
            y: Self::axis_index(y, n),
        }
    }

    fn axis_index(fraction: f64, n: u32) -> u32 {
        if fraction.is_nan() || fraction <= 0.0 {
            0
        } else if fraction >= 1.0 {
            n - 1
        } else {
            (((fraction + TILE_EPSILON) * n as f64).floor() as u32).min(n - 1)
        }
    }

    /// Geographic bounds of this tile
    pub fn bounds(&self) -> TileBounds {
        let n = Self::tiles_per_axis(self.z) as f64;
        let lon = |x: f64| x / n * 360.0 - 180.0;
        let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();

        TileBounds::new(
            lon(self.x as f64),
            lat(self.y as f64 + 1.0),
            lon(self.x as f64 + 1.0),
            lat(self.y as f64),
        )
    }

    /// Identifier used in progress events, `z/x/y`
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Filesystem-safe name of a map style
///
/// Whitespace runs become a single `-` and everything outside
/// `[A-Za-z0-9_-]` is dropped. Sanitizing a sanitized name is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleName(String);

impl StyleName {
    pub fn sanitize(name: &str) -> Self {
        let mut sanitized = String::with_capacity(name.len());
        let mut in_whitespace = false;

        for ch in name.chars() {
            if ch.is_whitespace() {
                if !in_whitespace {
                    sanitized.push('-');
                }
                in_whitespace = true;
                continue;
            }
            in_whitespace = false;
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                sanitized.push(ch);
            }
        }

        Self(sanitized)
    }

    /// Sanitize a percent-encoded URL path segment
    pub fn from_url_segment(segment: &str) -> Self {
        match urlencoding::decode(segment) {
            Ok(decoded) => Self::sanitize(&decoded),
            Err(_) => Self::sanitize(segment),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StyleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for StyleName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}
