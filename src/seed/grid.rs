//! Slippy-map tile arithmetic.
//!
//! Converts geographic coordinates and bounding boxes into XYZ tile
//! indices using the spherical-Mercator scheme shared by OSM-style tile
//! servers. All conversions saturate at the edges of the grid, so inputs
//! outside the Mercator domain map to edge tiles instead of failing.

use std::f64::consts::PI;

/// Latitude limit of the spherical-Mercator projection.
const MAX_LAT: f64 = 85.051129;

/// Nudge applied to the lower-right corner of a bounding box so that
/// edges lying exactly on tile boundaries do not pull in an extra
/// row/column of tiles.
const LL_EPSILON: f64 = 1e-11;

/// Counteracts precision loss near tile boundaries when flooring.
const EPSILON: f64 = 1e-14;

/// A single XYZ tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

/// Geographic bounding box in degrees.
///
/// `west > east` is legal and means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    /// Build from a `[west, south, east, north]` quadruple.
    pub fn from_bbox(bbox: [f64; 4]) -> Self {
        Self {
            west: bbox[0],
            south: bbox[1],
            east: bbox[2],
            north: bbox[3],
        }
    }
}

/// Inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
    pub zoom: u8,
}

impl TileRange {
    /// Number of tiles in the range. Inverted ranges are empty.
    pub fn count(&self) -> u64 {
        if self.max_x < self.min_x || self.max_y < self.min_y {
            return 0;
        }
        let width = u64::from(self.max_x - self.min_x) + 1;
        let height = u64::from(self.max_y - self.min_y) + 1;
        width * height
    }

    /// Iterate the range in column-major order (x outer, y inner).
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let zoom = self.zoom;
        let ys = self.min_y..=self.max_y;
        (self.min_x..=self.max_x)
            .flat_map(move |x| ys.clone().map(move |y| TileCoord { x, y, z: zoom }))
    }
}

/// Tile containing the given point at the given zoom.
pub fn tile_at(lng: f64, lat: f64, zoom: u8) -> TileCoord {
    let x = lng / 360.0 + 0.5;
    let sinlat = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sinlat) / (1.0 - sinlat)).ln() / PI;

    let z2 = f64::powi(2.0, i32::from(zoom));
    let max_index = (1u32 << zoom) - 1;

    let xtile = if x <= 0.0 {
        0
    } else if x >= 1.0 {
        max_index
    } else {
        (((x + EPSILON) * z2).floor() as u32).min(max_index)
    };
    let ytile = if y <= 0.0 {
        0
    } else if y >= 1.0 {
        max_index
    } else {
        (((y + EPSILON) * z2).floor() as u32).min(max_index)
    };

    TileCoord {
        x: xtile,
        y: ytile,
        z: zoom,
    }
}

/// Tile ranges covering a bounding box at one zoom level.
///
/// Returns one range normally, two when the box crosses the antimeridian
/// (western half first). Out-of-domain edges are clamped to the Mercator
/// limits before conversion.
pub fn coverage(bounds: &Bounds, zoom: u8) -> Vec<TileRange> {
    let boxes = if bounds.west > bounds.east {
        vec![
            Bounds {
                west: -180.0,
                ..*bounds
            },
            Bounds {
                east: 180.0,
                ..*bounds
            },
        ]
    } else {
        vec![*bounds]
    };

    boxes
        .iter()
        .map(|b| {
            let west = b.west.max(-180.0);
            let south = b.south.max(-MAX_LAT);
            let east = b.east.min(180.0);
            let north = b.north.min(MAX_LAT);

            let upper_left = tile_at(west, north, zoom);
            let lower_right = tile_at(east - LL_EPSILON, south + LL_EPSILON, zoom);

            TileRange {
                min_x: upper_left.x,
                max_x: lower_right.x,
                min_y: upper_left.y,
                max_y: lower_right.y,
                zoom,
            }
        })
        .collect()
}
