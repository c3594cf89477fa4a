//! The tiling scheduler.
//!
//! One producer enumerates the pyramid and feeds a bounded channel; a pool
//! of workers pops tiles, runs each through the geometry pipeline
//! (reproject, simplify, pixel-project, clip, make-valid) and hands the
//! result to the exporter. Cancellation is cooperative: every channel
//! send/recv races the token, and workers check it between features.
//!
//! Failure semantics are first-error-wins: the first per-tile error cancels
//! the run and becomes the return value of [`Tiler::run`]; later errors are
//! only warned to the progress sink. A failing *feature* never kills its
//! tile; it is logged and dropped.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::clip::clip_geometry;
use crate::exporter::Exporter;
use crate::geom::{Feature, Geometry, Layer};
use crate::grid::Grid;
use crate::makevalid::clean_geometry;
use crate::pixel::prepare_geometry;
use crate::progress::Progress;
use crate::provider::Provider;
use crate::simplify::simplify_geometry;
use crate::tile::{Tile, DEFAULT_BUFFER, DEFAULT_EXTENT, DEFAULT_TOLERANCE};
use crate::webmercator::{to_webmercator, SRID_WEB_MERCATOR, SRID_WGS84};
use crate::{Error, Result};

/// Scheduler configuration. Zero-valued numeric fields fall back to the
/// documented defaults at construction; there is no global mutable state.
#[derive(Debug, Clone)]
pub struct TilerConfig {
    pub tile_extent: u64,
    pub tile_buffer: u64,
    pub simplify_geometries: bool,
    pub simplification_max_zoom: u32,
    pub concurrency: usize,
    pub min_zoom: u32,
    pub max_zoom: u32,
    /// When non-empty, overrides the `min_zoom..=max_zoom` range.
    pub specific_zooms: Vec<u32>,
    /// `[west, south, east, north]` in `srid` coordinates.
    pub bound: [f64; 4],
    /// SRID of `bound`.
    pub srid: u64,
    pub output_dir: PathBuf,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            tile_extent: DEFAULT_EXTENT as u64,
            tile_buffer: DEFAULT_BUFFER as u64,
            simplify_geometries: true,
            simplification_max_zoom: 10,
            concurrency: 4,
            min_zoom: 0,
            max_zoom: 14,
            specific_zooms: Vec::new(),
            bound: [-180.0, -90.0, 180.0, 90.0],
            srid: SRID_WGS84,
            output_dir: PathBuf::from("./tiles"),
        }
    }
}

impl TilerConfig {
    /// Fill zero values from the defaults.
    fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.tile_extent == 0 {
            self.tile_extent = defaults.tile_extent;
        }
        if self.tile_buffer == 0 {
            self.tile_buffer = defaults.tile_buffer;
        }
        if self.concurrency == 0 {
            self.concurrency = defaults.concurrency;
        }
        if self.simplification_max_zoom == 0 {
            self.simplification_max_zoom = defaults.simplification_max_zoom;
        }
        if self.output_dir.as_os_str().is_empty() {
            self.output_dir = defaults.output_dir;
        }
        self
    }

    fn zoom_levels(&self) -> Vec<u32> {
        if !self.specific_zooms.is_empty() {
            return self.specific_zooms.clone();
        }
        (self.min_zoom..=self.max_zoom).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct TileTask {
    z: u32,
    x: u32,
    y: u32,
}

/// Cooperative cancellation: an atomic flag plus a channel that closes when
/// the token fires, so blocked sends and recvs wake immediately.
#[derive(Clone)]
struct CancelToken {
    flag: Arc<AtomicBool>,
    holder: Arc<Mutex<Option<Sender<()>>>>,
    done: Receiver<()>,
}

impl CancelToken {
    fn new() -> Self {
        let (tx, rx) = bounded::<()>(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            holder: Arc::new(Mutex::new(Some(tx))),
            done: rx,
        }
    }

    fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Dropping the sender disconnects `done`, waking every select.
        self.holder.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn done(&self) -> &Receiver<()> {
        &self.done
    }
}

pub struct Tiler {
    config: TilerConfig,
    provider: Arc<dyn Provider>,
    exporter: Arc<dyn Exporter>,
    progress: Option<Arc<dyn Progress>>,
    grid: Grid,
    cancel: CancelToken,
    first_error: Mutex<Option<Error>>,
    processed: AtomicUsize,
    total: AtomicUsize,
}

impl Tiler {
    pub fn new(
        config: TilerConfig,
        provider: Arc<dyn Provider>,
        exporter: Arc<dyn Exporter>,
    ) -> Result<Self> {
        let config = config.normalized();
        let grid = Grid::new(config.bound, config.srid)?;
        Ok(Self {
            config,
            provider,
            exporter,
            progress: None,
            grid,
            cancel: CancelToken::new(),
            first_error: Mutex::new(None),
            processed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Resume support: skip every tile of zoom `z` before `(x, y)`.
    pub fn skip_before(&mut self, z: u32, x: u32, y: u32) {
        self.grid.skip_before(z, x, y);
    }

    /// Cancel a running [`Tiler::run`] from another thread.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn progress(&self) -> Option<&dyn Progress> {
        self.progress.as_deref()
    }

    /// Capture the first error, warn on the rest, cancel either way.
    fn report_error(&self, err: Error) {
        let mut slot = self.first_error.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            if let Some(p) = self.progress() {
                p.warn(&format!("tiling stopped: {}", err));
            }
            *slot = Some(err);
            drop(slot);
            self.cancel.cancel();
        } else if let Some(p) = self.progress() {
            p.warn(&format!("error after cancellation: {}", err));
        }
    }

    /// Drive the whole pyramid. Returns the first error, `Cancelled` when
    /// stopped without one, `Ok(())` on a full run.
    pub fn run(&self) -> Result<()> {
        let zooms = self.config.zoom_levels();
        let total = self.grid.count(&zooms);
        self.total.store(total, Ordering::SeqCst);
        if let Some(p) = self.progress() {
            p.init(total);
        }

        let workers = self.config.concurrency.max(1);
        let (task_tx, task_rx) = bounded::<TileTask>(workers * 2);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let task_rx = task_rx.clone();
                scope.spawn(move || self.worker(task_rx));
            }
            drop(task_rx);

            // Producer: this thread.
            'produce: for &z in &zooms {
                for (x, y) in self.grid.zoom_tiles(z) {
                    let task = TileTask { z, x, y };
                    select! {
                        send(task_tx, task) -> res => {
                            if res.is_err() {
                                break 'produce;
                            }
                        }
                        recv(self.cancel.done()) -> _ => break 'produce,
                    }
                }
            }
            drop(task_tx);
        });

        if let Some(p) = self.progress() {
            p.complete();
        }

        let first = self
            .first_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match first {
            Some(err) => Err(err),
            None if self.cancel.is_cancelled() => Err(Error::Cancelled),
            None => Ok(()),
        }
    }

    fn worker(&self, tasks: Receiver<TileTask>) {
        loop {
            select! {
                recv(tasks) -> task => {
                    let Ok(task) = task else { return };
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    if let Err(err) = self.process_tile(task) {
                        self.report_error(err);
                    }
                }
                recv(self.cancel.done()) -> _ => return,
            }
        }
    }

    fn make_tile(&self, task: TileTask) -> Tile {
        Tile::with_options(
            task.z,
            task.x,
            task.y,
            self.config.tile_buffer as f64,
            self.config.tile_extent as f64,
            DEFAULT_TOLERANCE,
        )
    }

    fn process_tile(&self, task: TileTask) -> Result<()> {
        let current = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        if let Some(p) = self.progress() {
            p.update(current, total);
            p.log(&format!(
                "tile {}/{}/{} ({}/{})",
                task.z, task.x, task.y, current, total
            ));
        }

        let tile = self.make_tile(task);
        let layers = self.provider.get_data_by_tile(&tile);
        if layers.is_empty() {
            return Ok(());
        }

        let srid = self.provider.get_srid();
        let mut out_layers = Vec::with_capacity(layers.len());
        for layer in layers {
            // Discard outstanding work promptly once cancelled; the tile is
            // never exported.
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let mut out = Layer {
                name: layer.name.clone(),
                features: Vec::with_capacity(layer.features.len()),
                srid: SRID_WEB_MERCATOR,
            };
            for feature in &layer.features {
                match self.process_feature(feature, &tile, srid) {
                    Ok(Some(f)) => out.features.push(f),
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!(
                            "tile {}: dropping feature with invalid geometry: {}",
                            tile.id(),
                            err
                        );
                    }
                }
            }
            out_layers.push(out);
        }

        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let path = self.config.output_dir.join(self.exporter.relative_tile_path(
            task.z,
            task.x,
            task.y,
        ));
        self.exporter.save_tile(&out_layers, &tile, &path)
    }

    /// The per-feature pipeline:
    /// reproject → simplify → pixel-project → clip → make-valid.
    fn process_feature(
        &self,
        feature: &Feature,
        tile: &Tile,
        provider_srid: u64,
    ) -> Result<Option<Feature>> {
        let srid = if feature.srid != 0 {
            feature.srid
        } else {
            provider_srid
        };

        let mut geom = if srid != SRID_WEB_MERCATOR {
            reproject_geometry(&feature.geometry, srid)?
        } else {
            feature.geometry.clone()
        };

        if self.config.simplify_geometries && tile.z < self.config.simplification_max_zoom {
            geom = match simplify_geometry(&geom, tile.z_epsilon()) {
                Some(g) => g,
                None => return Ok(None),
            };
        }

        let geom = prepare_geometry(&geom, tile);

        let Some(geom) = clip_geometry(&geom, tile.pixel_buffered_bounds()) else {
            return Ok(None);
        };

        let geom = match geom {
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => clean_geometry(&geom)?,
            other => other,
        };

        Ok(Some(Feature {
            geometry: geom,
            properties: feature.properties.clone(),
            srid: SRID_WEB_MERCATOR,
        }))
    }
}

fn reproject_geometry(geom: &Geometry, srid: u64) -> Result<Geometry> {
    // Validate once, then map infallibly.
    to_webmercator(srid, crate::geom::Point2::new(0.0, 0.0))?;
    Ok(geom.map_points(&|pt| {
        to_webmercator(srid, pt).unwrap_or(pt)
    }))
}
