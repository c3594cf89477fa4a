//! Web-Mercator (EPSG:3857) forward and inverse projection, plus the SRID
//! dispatch used everywhere a coordinate system enters the pipeline.
//!
//! Spherical formulas; latitude is clamped to the mercator limit before the
//! forward transform so the projection stays finite at the poles.

use crate::geom::Point2;
use crate::{Error, Result};

pub const SRID_WEB_MERCATOR: u64 = 3857;
pub const SRID_WGS84: u64 = 4326;

/// WGS-84 semi-major axis in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Eastern edge of the projection in meters (~20 037 508.34).
pub fn max_x_extent() -> f64 {
    lon_to_x(180.0)
}

/// Northern edge of the projection in meters; equals `max_x_extent` by
/// construction of the square mercator world.
pub fn max_y_extent() -> f64 {
    lat_to_y(max_latitude())
}

/// The latitude at which the mercator square closes, ~85.051129°.
pub fn max_latitude() -> f64 {
    (2.0 * (std::f64::consts::PI).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees()
}

pub fn lon_to_x(lon: f64) -> f64 {
    EARTH_RADIUS * lon.to_radians()
}

pub fn lat_to_y(lat: f64) -> f64 {
    let lat = lat.clamp(-max_latitude(), max_latitude());
    EARTH_RADIUS * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln()
}

pub fn x_to_lon(x: f64) -> f64 {
    (x / EARTH_RADIUS).to_degrees()
}

pub fn y_to_lat(y: f64) -> f64 {
    (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees()
}

/// Reproject a point from `srid` into Web-Mercator.
pub fn to_webmercator(srid: u64, pt: Point2) -> Result<Point2> {
    match srid {
        SRID_WEB_MERCATOR => Ok(pt),
        SRID_WGS84 => Ok(Point2::new(lon_to_x(pt.x), lat_to_y(pt.y))),
        other => Err(Error::UnsupportedSrid(other)),
    }
}

/// Reproject a Web-Mercator point into `srid`.
pub fn from_webmercator(srid: u64, pt: Point2) -> Result<Point2> {
    match srid {
        SRID_WEB_MERCATOR => Ok(pt),
        SRID_WGS84 => Ok(Point2::new(x_to_lon(pt.x), y_to_lat(pt.y))),
        other => Err(Error::UnsupportedSrid(other)),
    }
}
