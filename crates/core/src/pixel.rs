//! Projection of whole geometries onto a tile's pixel grid.
//!
//! A pure transform: every coordinate maps through the tile's pixel
//! projection and nothing is dropped here; the clip stage decides what
//! survives. Input coordinates are expected in Web-Mercator (the pipeline
//! reprojects before this stage); other SRIDs go through the projector
//! first, and an unknown SRID fails before any point is touched.

use crate::geom::{Geometry, Point2};
use crate::tile::Tile;
use crate::webmercator::{lat_to_y, lon_to_x, x_to_lon, y_to_lat, SRID_WEB_MERCATOR, SRID_WGS84};
use crate::{Error, Result};

/// Project `geom` (in `srid` coordinates) onto the pixel grid of `tile`.
pub fn to_tile_pixels(geom: &Geometry, tile: &Tile, srid: u64) -> Result<Geometry> {
    let forward: fn(Point2) -> Point2 = match srid {
        SRID_WEB_MERCATOR => |pt| pt,
        SRID_WGS84 => |pt| Point2::new(lon_to_x(pt.x), lat_to_y(pt.y)),
        other => return Err(Error::UnsupportedSrid(other)),
    };
    Ok(geom.map_points(&|pt| tile.merc_to_pixel(forward(pt))))
}

/// Project back from pixel space into `srid` coordinates.
pub fn from_tile_pixels(geom: &Geometry, tile: &Tile, srid: u64) -> Result<Geometry> {
    let inverse: fn(Point2) -> Point2 = match srid {
        SRID_WEB_MERCATOR => |pt| pt,
        SRID_WGS84 => |pt| Point2::new(x_to_lon(pt.x), y_to_lat(pt.y)),
        other => return Err(Error::UnsupportedSrid(other)),
    };
    Ok(geom.map_points(&|pt| inverse(tile.pixel_to_merc(pt))))
}

/// Convenience for the common case: input already in Web-Mercator.
pub fn prepare_geometry(geom: &Geometry, tile: &Tile) -> Geometry {
    geom.map_points(&|pt| tile.merc_to_pixel(pt))
}
