//! Tile export contract.
//!
//! A backend turns one processed tile (its layers of pixel-space features)
//! into bytes, either at a filesystem path or into a caller-supplied writer.
//! Backends are shared across the scheduler's workers and guard their own
//! writers internally.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::geom::Layer;
use crate::tile::Tile;
use crate::{Error, Result};

pub trait Exporter: Send + Sync {
    /// Write the tile to `path`, creating parent directories on demand.
    fn save_tile(&self, layers: &[Layer], tile: &Tile, path: &Path) -> Result<()>;

    /// Write the tile's bytes into `writer`.
    fn save_tile_to_writer(
        &self,
        layers: &[Layer],
        tile: &Tile,
        writer: &mut dyn Write,
    ) -> Result<()>;

    /// File extension without the dot.
    fn extension(&self) -> &str;

    /// `{z}/{x}/{y}.{ext}` under the output directory.
    fn relative_tile_path(&self, z: u32, x: u32, y: u32) -> PathBuf {
        PathBuf::from(z.to_string())
            .join(x.to_string())
            .join(format!("{}.{}", y, self.extension()))
    }
}

/// Shared save-to-path plumbing: reject empty paths, create the parent
/// directory tree.
pub(crate) fn prepare_output_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidPath);
    }
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}
