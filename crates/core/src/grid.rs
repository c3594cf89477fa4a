//! Tile pyramid enumeration over a bounding box.
//!
//! The grid holds a Web-Mercator bounding box and, per zoom, yields the
//! row-major range of tile indices intersecting it. Tile y is measured down
//! from the top of the mercator square (top-left-origin pyramid): at z=1 the
//! tile (0, 0) covers the north-west quadrant.

use crate::geom::{Extent, Point2};
use crate::webmercator::{self, to_webmercator};
use crate::Result;

#[derive(Debug, Clone)]
pub struct Grid {
    bounds: Extent,
    skip: Option<(u32, u32, u32)>,
}

impl Grid {
    /// Grid over a bounding box already in Web-Mercator meters.
    pub fn merc(bounds: Extent) -> Self {
        Self { bounds, skip: None }
    }

    /// Grid over the whole world.
    pub fn world() -> Self {
        let max = webmercator::max_x_extent();
        Self::merc(Extent::new(-max, -max, max, max))
    }

    /// Grid over `[west, south, east, north]` expressed in `srid`.
    pub fn new(bound: [f64; 4], srid: u64) -> Result<Self> {
        let min = to_webmercator(srid, Point2::new(bound[0], bound[1]))?;
        let max = to_webmercator(srid, Point2::new(bound[2], bound[3]))?;
        Ok(Self::merc(Extent::new(min.x, min.y, max.x, max.y)))
    }

    /// Inclusive tile index range `(x_min, y_min, x_max, y_max)` affected at
    /// zoom `z`.
    pub fn tile_bounds(&self, z: u32) -> (u32, u32, u32, u32) {
        let max = webmercator::max_x_extent();
        let n = (z as f64).exp2();
        let span = max * 2.0 / n;
        let last = (n - 1.0) as u32;

        let clamp = |v: f64| v.max(0.0).min(n - 1.0) as u32;
        let x_min = clamp(((self.bounds.min_x + max) / span).floor());
        let x_max = clamp(((self.bounds.max_x + max) / span).floor()).min(last);
        // Tile y runs north to south: the north edge (max_y) gives y_min.
        let y_min = clamp(((max - self.bounds.max_y) / span).floor());
        let y_max = clamp(((max - self.bounds.min_y) / span).floor()).min(last);
        (x_min, y_min, x_max, y_max)
    }

    /// Row-major `(x, y)` tile coordinates at zoom `z`, honouring a
    /// previously requested resume point.
    pub fn zoom_tiles(&self, z: u32) -> Vec<(u32, u32)> {
        let (x_min, y_min, x_max, y_max) = self.tile_bounds(z);
        let resume = match self.skip {
            Some((sz, sx, sy)) if sz == z => Some((sx, sy)),
            _ => None,
        };

        let mut out = Vec::new();
        for y in y_min..=y_max {
            for x in x_min..=x_max {
                if let Some((sx, sy)) = resume {
                    if y < sy || (y == sy && x < sx) {
                        continue;
                    }
                }
                out.push((x, y));
            }
        }
        out
    }

    /// Total tile count across `zooms`, for progress initialisation.
    pub fn count(&self, zooms: &[u32]) -> usize {
        zooms
            .iter()
            .map(|&z| {
                let (x_min, y_min, x_max, y_max) = self.tile_bounds(z);
                ((x_max - x_min + 1) as usize) * ((y_max - y_min + 1) as usize)
            })
            .sum()
    }

    /// Resume support: enumeration of zoom `z` starts at `(x, y)`; later
    /// zooms start fresh.
    pub fn skip_before(&mut self, z: u32, x: u32, y: u32) {
        self.skip = Some((z, x, y));
    }
}
