//! Feature source collaborator.
//!
//! The tile's Web-Mercator envelope is the selection predicate; whether a
//! provider adds its own buffer on top is its business. The scheduler calls
//! `get_data_by_tile` from up to `concurrency` threads at once, which is why
//! the trait requires `Send + Sync`; a provider wrapping a single-threaded
//! resource must be driven with `concurrency = 1`.

use crate::geom::{Extent, Feature, Layer};
use crate::tile::Tile;
use crate::webmercator::{to_webmercator, SRID_WGS84};
use crate::{geom::Point2, Result};

pub trait Provider: Send + Sync {
    /// Layers of features whose geometry intersects the tile envelope.
    fn get_data_by_tile(&self, tile: &Tile) -> Vec<Layer>;

    /// SRID of the returned coordinates.
    fn get_srid(&self) -> u64;
}

/// In-memory provider over a fixed feature list, selecting by bounding-box
/// intersection with the tile envelope. Used by tests and the CLI.
pub struct MemoryProvider {
    layer_name: String,
    srid: u64,
    features: Vec<Feature>,
    /// Web-Mercator bbox per feature, parallel to `features`.
    extents: Vec<Extent>,
}

impl MemoryProvider {
    pub fn new(layer_name: impl Into<String>, srid: u64, features: Vec<Feature>) -> Result<Self> {
        let mut extents = Vec::with_capacity(features.len());
        for f in &features {
            let e = f.geometry.extent();
            let min = to_webmercator(srid, Point2::new(e.min_x, e.min_y))?;
            let max = to_webmercator(srid, Point2::new(e.max_x, e.max_y))?;
            extents.push(Extent::new(min.x, min.y, max.x, max.y));
        }
        Ok(Self {
            layer_name: layer_name.into(),
            srid,
            features,
            extents,
        })
    }

    pub fn wgs84(layer_name: impl Into<String>, features: Vec<Feature>) -> Result<Self> {
        Self::new(layer_name, SRID_WGS84, features)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Provider for MemoryProvider {
    fn get_data_by_tile(&self, tile: &Tile) -> Vec<Layer> {
        let env = tile.env_geo();
        let features: Vec<Feature> = self
            .features
            .iter()
            .zip(&self.extents)
            .filter(|(_, e)| e.intersects(env))
            .map(|(f, _)| f.clone())
            .collect();
        if features.is_empty() {
            return Vec::new();
        }
        vec![Layer {
            name: self.layer_name.clone(),
            features,
            srid: self.srid,
        }]
    }

    fn get_srid(&self) -> u64 {
        self.srid
    }
}
