//! Tile coordinate math.
//!
//! A tile is addressed by `(z, x, y)` with `z <= 22`, in the usual top-left
//! origin pyramid: `(0, 0)` is the north-west tile of every zoom. On
//! construction the tile derives its Web-Mercator envelope and its buffered
//! pixel envelope; the pixel projection maps the envelope onto a
//! `[0, extent]²` grid with y growing downward.

use crate::geom::{Extent, Point2};
use crate::webmercator::{self, from_webmercator, to_webmercator};
use crate::{Error, Result};

/// Default simplification tolerance fed into `z_epsilon`.
pub const DEFAULT_TOLERANCE: f64 = 10.0;
/// Default tile extent in pixels.
pub const DEFAULT_EXTENT: f64 = 32_768.0;
/// Default clip buffer in pixels.
pub const DEFAULT_BUFFER: f64 = 64.0;
/// Deepest zoom level supported.
pub const MAX_Z: u32 = 22;

const ID_SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub z: u32,
    pub x: u32,
    pub y: u32,

    pub buffer: f64,
    pub extent: f64,
    pub tolerance: f64,

    env_geo: Extent,
    env_px: Extent,
}

impl Tile {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self::with_options(z, x, y, DEFAULT_BUFFER, DEFAULT_EXTENT, DEFAULT_TOLERANCE)
    }

    pub fn with_options(z: u32, x: u32, y: u32, buffer: f64, extent: f64, tolerance: f64) -> Self {
        let mut t = Self {
            z,
            x,
            y,
            buffer,
            extent,
            tolerance,
            env_geo: Extent::empty(),
            env_px: Extent::empty(),
        };
        t.init();
        t
    }

    fn init(&mut self) {
        let max = webmercator::max_x_extent();
        let res = (max * 2.0) / (self.z as f64).exp2();
        let min_x = -max + self.x as f64 * res;
        let max_y = max - self.y as f64 * res;
        self.env_geo = Extent::new(min_x, max_y - res, min_x + res, max_y);
        self.env_px = Extent::new(
            -self.buffer,
            -self.buffer,
            self.extent + self.buffer,
            self.extent + self.buffer,
        );
    }

    /// `"x.y.z"`.
    pub fn id(&self) -> String {
        xyz_to_id(self.x, self.y, self.z)
    }

    /// Web-Mercator envelope of the unbuffered tile.
    pub fn env_geo(&self) -> &Extent {
        &self.env_geo
    }

    /// Pixel-space clip rectangle, `[-buffer, extent + buffer]` per axis.
    pub fn pixel_buffered_bounds(&self) -> &Extent {
        &self.env_px
    }

    /// Geographic bounds `(lon_west, lat_south, lon_east, lat_north)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (
            tile_to_lon(self.x, self.z),
            tile_to_lat(self.y + 1, self.z),
            tile_to_lon(self.x + 1, self.z),
            tile_to_lat(self.y, self.z),
        )
    }

    pub fn parent(&self) -> Option<Tile> {
        if self.z == 0 {
            return None;
        }
        Some(Tile::with_options(
            self.z - 1,
            self.x / 2,
            self.y / 2,
            self.buffer,
            self.extent,
            self.tolerance,
        ))
    }

    pub fn children(&self) -> Option<[Tile; 4]> {
        if self.z >= MAX_Z {
            return None;
        }
        let (z, x, y) = (self.z + 1, self.x * 2, self.y * 2);
        let mk = |x, y| Tile::with_options(z, x, y, self.buffer, self.extent, self.tolerance);
        Some([mk(x, y), mk(x + 1, y), mk(x, y + 1), mk(x + 1, y + 1)])
    }

    /// Same zoom, Chebyshev distance one.
    pub fn is_neighbor(&self, other: &Tile) -> bool {
        if self.z != other.z {
            return false;
        }
        let dx = (self.x as i64 - other.x as i64).abs();
        let dy = (self.y as i64 - other.y as i64).abs();
        dx <= 1 && dy <= 1 && (dx, dy) != (0, 0)
    }

    /// Meters per pixel at this zoom.
    pub fn z_res(&self) -> f64 {
        webmercator::max_x_extent() * 2.0 / (self.extent * (self.z as f64).exp2())
    }

    /// Per-zoom simplification tolerance; zero disables simplification at
    /// the deepest zoom.
    pub fn z_epsilon(&self) -> f64 {
        if self.z == MAX_Z || self.tolerance <= 0.0 {
            return 0.0;
        }
        self.tolerance / ((self.z as f64).exp2() * self.extent)
    }

    /// Web-Mercator to the tile's integer pixel grid; y flips because pixel
    /// space has its origin top-left.
    pub fn merc_to_pixel(&self, merc: Point2) -> Point2 {
        let px = ((merc.x - self.env_geo.min_x) * self.extent / self.env_geo.width()).floor();
        let py = ((self.env_geo.max_y - merc.y) * self.extent / self.env_geo.height()).floor();
        Point2::new(px, py)
    }

    /// Inverse of [`Tile::merc_to_pixel`], up to the flooring.
    pub fn pixel_to_merc(&self, pt: Point2) -> Point2 {
        let x = pt.x.trunc();
        let y = pt.y.trunc();
        Point2::new(
            x * self.env_geo.width() / self.extent + self.env_geo.min_x,
            self.env_geo.max_y - y * self.env_geo.height() / self.extent,
        )
    }

    /// Project a point in `srid` onto this tile's integer pixel grid.
    pub fn to_pixel(&self, srid: u64, pt: Point2) -> Result<Point2> {
        Ok(self.merc_to_pixel(to_webmercator(srid, pt)?))
    }

    /// Inverse of [`Tile::to_pixel`], up to the flooring.
    pub fn from_pixel(&self, srid: u64, pt: Point2) -> Result<Point2> {
        from_webmercator(srid, self.pixel_to_merc(pt))
    }
}

pub fn xyz_to_id(x: u32, y: u32, z: u32) -> String {
    format!("{}{}{}{}{}", x, ID_SEPARATOR, y, ID_SEPARATOR, z)
}

pub fn xyz_from_id(id: &str) -> Result<(u32, u32, u32)> {
    let mut parts = id.split(ID_SEPARATOR);
    let parse = |p: Option<&str>| -> Result<u32> {
        p.and_then(|s| s.parse().ok()).ok_or(Error::InvalidTile)
    };
    let x = parse(parts.next())?;
    let y = parse(parts.next())?;
    let z = parse(parts.next())?;
    if parts.next().is_some() || z > MAX_Z {
        return Err(Error::InvalidTile);
    }
    Ok((x, y, z))
}

/// Slippy-map tile index to the longitude of its western edge.
pub fn tile_to_lon(x: u32, z: u32) -> f64 {
    x as f64 / (z as f64).exp2() * 360.0 - 180.0
}

/// Slippy-map tile index to the latitude of its northern edge.
pub fn tile_to_lat(y: u32, z: u32) -> f64 {
    let n = std::f64::consts::PI * (1.0 - 2.0 * y as f64 / (z as f64).exp2());
    n.sinh().atan().to_degrees()
}

/// Tile indices containing a lon/lat position.
pub fn lonlat_to_tile(lon: f64, lat: f64, z: u32) -> (u32, u32) {
    let n = (z as f64).exp2();
    let x = ((lon + 180.0) / 360.0 * n).floor();
    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n).floor();
    let clamp = |v: f64| v.max(0.0).min(n - 1.0) as u32;
    (clamp(x), clamp(y))
}
