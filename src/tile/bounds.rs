use geo::{Rect, coord};
use serde::{Deserialize, Serialize};

/// Geographic bounding box of a tile, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    /// Western longitude boundary
    pub west: f64,
    /// Southern latitude boundary
    pub south: f64,
    /// Eastern longitude boundary
    pub east: f64,
    /// Northern latitude boundary
    pub north: f64,
}

impl TileBounds {
    /// Create a new bounding box from coordinates
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// The box as a `geo` rectangle in (lon, lat) space
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.west, y: self.south },
            coord! { x: self.east, y: self.north },
        )
    }
}
