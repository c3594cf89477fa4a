//! Vector map tile generation.
//!
//! This library turns geographic feature sources into tile pyramids. For
//! every tile of a requested `(zoom, x, y)` pyramid it pulls the features
//! intersecting the tile envelope from a [`provider::Provider`], runs them
//! through the geometry pipeline (reproject to Web-Mercator, simplify at a
//! zoom-derived tolerance, project to integer pixel coordinates, clip to the
//! buffered tile rectangle, repair invalid polygons) and hands the result
//! to a pluggable [`exporter::Exporter`] (MVT, GeoJSON or SVG).
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use vector_tiler_core::geom::{Feature, Geometry};
//! use vector_tiler_core::mvt::MvtExporter;
//! use vector_tiler_core::provider::MemoryProvider;
//! use vector_tiler_core::tiler::{Tiler, TilerConfig};
//!
//! let provider = MemoryProvider::wgs84(
//!     "points",
//!     vec![Feature::new(Geometry::point(4.9, 52.37))],
//! )?;
//! let config = TilerConfig {
//!     min_zoom: 0,
//!     max_zoom: 8,
//!     output_dir: "./tiles".into(),
//!     ..Default::default()
//! };
//! let tiler = Tiler::new(config, Arc::new(provider), Arc::new(MvtExporter::new()))?;
//! tiler.run()?;
//! # Ok::<(), vector_tiler_core::Error>(())
//! ```

use thiserror::Error as ThisError;

// Include the protobuf-generated code
pub mod vector_tile {
    include!(concat!(env!("OUT_DIR"), "/vector_tile.rs"));
}

pub mod clip;
pub mod exporter;
pub mod geojson;
pub mod geom;
pub mod grid;
pub mod hitmap;
pub mod makevalid;
pub mod mvt;
pub mod pixel;
pub mod progress;
pub mod provider;
pub mod simplify;
pub mod svg;
pub mod sweep;
pub mod tile;
pub mod tiler;
pub mod webmercator;

/// Everything that can go wrong while generating tiles.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("invalid tile")]
    InvalidTile,

    #[error("invalid output path")]
    InvalidPath,

    #[error("unsupported SRID {0}")]
    UnsupportedSrid(u64),

    #[error("expected an even number of coordinates, got {0}")]
    InvalidCoordCount(usize),

    #[error("unable to clean multipolygon: no interior left")]
    UnableToCleanMultiPolygon,

    #[error("non-manifold vertex at ({x}, {y})")]
    NonManifoldVertex { x: f64, y: f64 },

    #[error("all layers are empty")]
    EmptyLayers,

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_cause() {
        assert_eq!(
            Error::UnsupportedSrid(2154).to_string(),
            "unsupported SRID 2154"
        );
        assert_eq!(Error::Cancelled.to_string(), "cancelled");
        assert!(Error::NonManifoldVertex { x: 1.5, y: -2.0 }
            .to_string()
            .contains("(1.5, -2)"));
    }

    #[test]
    fn test_io_error_wraps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::from(io);
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("denied"));
    }
}
