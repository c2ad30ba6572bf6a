use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use super::{MAX_LAT, MIN_LAT, TileCoord};
use crate::{Result, TileDownloaderError};

/// Highest zoom accepted for polygon downloads
pub const MAX_ZOOM: u8 = 19;

/// Highest zoom of the world basemap pyramid
pub const WORLD_MAX_ZOOM: u8 = 7;

/// Nudge applied to the south-east corner so a bbox edge that lies exactly on
/// a tile boundary does not pull in the neighbouring tile.
const LL_EPSILON: f64 = 1e-11;

/// A polygon ring as `[lat, lng]` pairs
pub type Ring = Vec<[f64; 2]>;

/// What area a download session covers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TileSelection {
    /// Tiles intersecting any of the polygons, for every zoom in the range
    Polygons {
        polygons: Vec<Ring>,
        min_zoom: u8,
        max_zoom: u8,
    },
    /// The complete pyramid for zoom 0 through [`WORLD_MAX_ZOOM`]
    World,
}

impl TileSelection {
    pub fn polygons(polygons: Vec<Ring>, min_zoom: u8, max_zoom: u8) -> Self {
        Self::Polygons {
            polygons,
            min_zoom,
            max_zoom,
        }
    }

    /// Check the selection without enumerating tiles
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Polygons {
                polygons,
                min_zoom,
                max_zoom,
            } => {
                validate_zoom_range(*min_zoom, *max_zoom)?;
                if polygons.is_empty() {
                    return Err(TileDownloaderError::Validation(
                        "No polygons provided".to_string(),
                    ));
                }
                for (index, ring) in polygons.iter().enumerate() {
                    validate_ring(index, ring)?;
                }
                Ok(())
            }
            Self::World => Ok(()),
        }
    }

    /// Resolve the selection into an ordered tile list
    pub fn resolve(&self) -> Result<Vec<TileCoord>> {
        match self {
            Self::Polygons {
                polygons,
                min_zoom,
                max_zoom,
            } => tiles_for_polygons(polygons, *min_zoom, *max_zoom),
            Self::World => Ok(world_tiles()),
        }
    }
}

/// Zoom range must lie within 0..=19 with min <= max
pub fn validate_zoom_range(min_zoom: u8, max_zoom: u8) -> Result<()> {
    if max_zoom > MAX_ZOOM || min_zoom > max_zoom {
        return Err(TileDownloaderError::Validation(format!(
            "Invalid zoom range {}-{} (must be 0-{}, min <= max)",
            min_zoom, max_zoom, MAX_ZOOM
        )));
    }
    Ok(())
}

fn validate_ring(index: usize, ring: &Ring) -> Result<()> {
    if ring.len() < 3 {
        return Err(TileDownloaderError::Validation(format!(
            "Polygon {} has {} points, at least 3 are required",
            index,
            ring.len()
        )));
    }
    if ring
        .iter()
        .any(|[lat, lng]| !lat.is_finite() || !lng.is_finite())
    {
        return Err(TileDownloaderError::Validation(format!(
            "Polygon {} contains a non-finite coordinate",
            index
        )));
    }
    Ok(())
}

fn ring_to_polygon(ring: &Ring) -> Polygon<f64> {
    let exterior: LineString<f64> = ring
        .iter()
        .map(|[lat, lng]| Coord { x: *lng, y: *lat })
        .collect();
    Polygon::new(exterior, Vec::new())
}

/// Tiles that intersect at least one polygon, for each zoom in range
///
/// Candidates come from the bounding box of the polygons' union; each is kept
/// only if its own box intersects an individual polygon, so concave or
/// disjoint areas do not over-fetch. Ordered by zoom ascending, x descending,
/// y ascending.
pub fn tiles_for_polygons(rings: &[Ring], min_zoom: u8, max_zoom: u8) -> Result<Vec<TileCoord>> {
    validate_zoom_range(min_zoom, max_zoom)?;
    if rings.is_empty() {
        return Err(TileDownloaderError::Validation(
            "No polygons provided".to_string(),
        ));
    }
    for (index, ring) in rings.iter().enumerate() {
        validate_ring(index, ring)?;
    }

    let area = MultiPolygon::new(rings.iter().map(ring_to_polygon).collect());
    let extent = area.bounding_rect().ok_or_else(|| {
        TileDownloaderError::Validation("Polygons have no geographic extent".to_string())
    })?;

    let mut tiles = Vec::new();
    for zoom in min_zoom..=max_zoom {
        for tile in tiles_in_bbox(
            extent.min().x,
            extent.min().y,
            extent.max().x,
            extent.max().y,
            zoom,
        ) {
            let tile_rect = tile.bounds().to_rect();
            if area.0.iter().any(|polygon| tile_rect.intersects(polygon)) {
                tiles.push(tile);
            }
        }
    }

    tiles.sort_by(|a, b| a.z.cmp(&b.z).then(b.x.cmp(&a.x)).then(a.y.cmp(&b.y)));

    tracing::debug!(
        "Resolved {} polygon(s) at zoom {}-{} to {} tiles",
        rings.len(),
        min_zoom,
        max_zoom,
        tiles.len()
    );

    Ok(tiles)
}

/// Every tile whose box touches the (west, south, east, north) rectangle
pub fn tiles_in_bbox(
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    zoom: u8,
) -> impl Iterator<Item = TileCoord> {
    let west = west.max(-180.0);
    let south = south.max(MIN_LAT);
    let east = east.min(180.0);
    let north = north.min(MAX_LAT);

    let upper_left = TileCoord::containing(north, west, zoom);
    let lower_right = TileCoord::containing(south + LL_EPSILON, east - LL_EPSILON, zoom);

    (upper_left.x..=lower_right.x).flat_map(move |x| {
        (upper_left.y..=lower_right.y).map(move |y| TileCoord::new(zoom, x, y))
    })
}

/// The full pyramid for zoom 0..=7, ordered by zoom, x, y
pub fn world_tiles() -> Vec<TileCoord> {
    let mut tiles = Vec::new();
    for zoom in 0..=WORLD_MAX_ZOOM {
        let n = TileCoord::tiles_per_axis(zoom);
        for x in 0..n {
            for y in 0..n {
                tiles.push(TileCoord::new(zoom, x, y));
            }
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(south: f64, west: f64, north: f64, east: f64) -> Ring {
        vec![
            [south, west],
            [north, west],
            [north, east],
            [south, east],
            [south, west],
        ]
    }

    #[test]
    fn test_polygon_inside_single_tile() {
        let tile = TileCoord::containing(52.52, 13.40, 12);
        let bounds = tile.bounds();
        let (lat, lon) = (
            (bounds.south + bounds.north) / 2.0,
            (bounds.west + bounds.east) / 2.0,
        );
        let dlat = (bounds.north - bounds.south) / 10.0;
        let dlon = (bounds.east - bounds.west) / 10.0;
        let ring = square(lat - dlat, lon - dlon, lat + dlat, lon + dlon);

        let tiles = tiles_for_polygons(&[ring], 12, 12).unwrap();
        assert_eq!(tiles, vec![tile]);
    }

    #[test]
    fn test_one_tile_per_zoom_for_tiny_polygon() {
        let ring = square(52.5200, 13.4000, 52.5201, 13.4001);
        let tiles = tiles_for_polygons(&[ring], 0, 3).unwrap();

        assert_eq!(tiles.len(), 4);
        for (zoom, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.z as usize, zoom);
        }
    }

    #[test]
    fn test_order_is_zoom_asc_x_desc_y_asc() {
        // Spans four tiles at zoom 1 around the origin
        let ring = square(-10.0, -10.0, 10.0, 10.0);
        let tiles = tiles_for_polygons(&[ring], 0, 1).unwrap();

        assert_eq!(
            tiles,
            vec![
                TileCoord::new(0, 0, 0),
                TileCoord::new(1, 1, 0),
                TileCoord::new(1, 1, 1),
                TileCoord::new(1, 0, 0),
                TileCoord::new(1, 0, 1),
            ]
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let polygons = vec![
            square(48.0, 2.0, 49.0, 3.0),
            square(51.0, -1.0, 52.0, 0.5),
        ];
        let first = tiles_for_polygons(&polygons, 5, 9).unwrap();
        let second = tiles_for_polygons(&polygons, 5, 9).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_l_shaped_area_skips_empty_corner() {
        // Two disjoint squares on opposite corners of a 2x2 block at zoom 1;
        // their union's bbox covers all four tiles.
        let polygons = vec![
            square(10.0, -60.0, 60.0, -10.0), // north-west tile (1, 0, 0)
            square(-60.0, 10.0, -10.0, 60.0), // south-east tile (1, 1, 1)
        ];
        let tiles = tiles_for_polygons(&polygons, 1, 1).unwrap();

        assert_eq!(tiles, vec![TileCoord::new(1, 1, 1), TileCoord::new(1, 0, 0)]);
    }

    #[test]
    fn test_invalid_zoom_range() {
        let ring = square(0.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            tiles_for_polygons(&[ring.clone()], 5, 4),
            Err(TileDownloaderError::Validation(_))
        ));
        assert!(matches!(
            tiles_for_polygons(&[ring], 0, 20),
            Err(TileDownloaderError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_polygon_set() {
        let result = tiles_for_polygons(&[], 0, 5);
        match result {
            Err(TileDownloaderError::Validation(msg)) => assert!(msg.contains("No polygons")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let ring = vec![[0.0, 0.0], [1.0, 1.0]];
        assert!(tiles_for_polygons(&[ring], 0, 1).is_err());
    }

    #[test]
    fn test_world_tiles() {
        let tiles = world_tiles();
        let expected: usize = (0..=WORLD_MAX_ZOOM).map(|z| 4usize.pow(z as u32)).sum();

        assert_eq!(tiles.len(), expected);
        assert_eq!(tiles[0], TileCoord::new(0, 0, 0));
        assert_eq!(tiles[1], TileCoord::new(1, 0, 0));
        assert_eq!(tiles[2], TileCoord::new(1, 0, 1));
        assert_eq!(*tiles.last().unwrap(), TileCoord::new(7, 127, 127));
    }

    #[test]
    fn test_selection_validate_and_resolve() {
        let selection = TileSelection::polygons(vec![square(0.0, 0.0, 1.0, 1.0)], 2, 2);
        assert!(selection.validate().is_ok());
        assert_eq!(selection.resolve().unwrap().len(), 1);

        assert!(TileSelection::polygons(Vec::new(), 0, 1).validate().is_err());
        assert!(TileSelection::World.validate().is_ok());
    }
}
