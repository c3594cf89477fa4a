//! CLI for vector-tiler: tile a GeoJSON FeatureCollection into a pyramid.
//!
//! This is a thin wrapper around the vector-tiler-core library.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use vector_tiler_core::exporter::Exporter;
use vector_tiler_core::geojson::{features_from_json, GeoJsonExporter};
use vector_tiler_core::mvt::MvtExporter;
use vector_tiler_core::progress::LogProgress;
use vector_tiler_core::provider::MemoryProvider;
use vector_tiler_core::svg::SvgExporter;
use vector_tiler_core::tiler::{Tiler, TilerConfig};
use vector_tiler_core::webmercator::SRID_WGS84;

#[derive(Parser, Debug)]
#[command(
    name = "vector-tiler",
    about = "Generate MVT/GeoJSON/SVG tile pyramids from a GeoJSON file",
    version
)]
struct Args {
    /// Input GeoJSON file (FeatureCollection, lon/lat)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory for the tile pyramid
    #[arg(long, default_value = "./tiles")]
    output: PathBuf,

    /// Output format (mvt, geojson, svg)
    #[arg(long, default_value = "mvt")]
    format: String,

    /// Layer name in the generated tiles
    #[arg(long, default_value = "layer")]
    layer: String,

    /// Minimum zoom level
    #[arg(long, default_value = "0")]
    min_zoom: u32,

    /// Maximum zoom level
    #[arg(long, default_value = "14")]
    max_zoom: u32,

    /// Generate only these zoom levels (repeatable; overrides the range)
    #[arg(long = "zoom")]
    zooms: Vec<u32>,

    /// Tile extent in pixels
    #[arg(long, default_value = "32768")]
    extent: u64,

    /// Clip buffer in pixels
    #[arg(long, default_value = "64")]
    buffer: u64,

    /// Worker threads
    #[arg(long, default_value = "4")]
    concurrency: usize,

    /// Bounding box west,south,east,north in lon/lat
    #[arg(long, value_delimiter = ',', num_args = 4)]
    bound: Option<Vec<f64>>,

    /// Disable zoom-based simplification
    #[arg(long)]
    no_simplify: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn exporter(&self) -> Result<Arc<dyn Exporter>> {
        match self.format.to_lowercase().as_str() {
            "mvt" => Ok(Arc::new(MvtExporter::new())),
            "geojson" => Ok(Arc::new(GeoJsonExporter::new())),
            "svg" => Ok(Arc::new(SvgExporter::new())),
            other => anyhow::bail!("unknown format {:?} (expected mvt, geojson or svg)", other),
        }
    }

    fn bound(&self) -> Result<[f64; 4]> {
        match &self.bound {
            None => Ok([-180.0, -90.0, 180.0, 90.0]),
            Some(v) if v.len() == 4 => Ok([v[0], v[1], v[2], v[3]]),
            Some(v) => anyhow::bail!("--bound needs 4 values, got {}", v.len()),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.input.display()))?;
    let features =
        features_from_json(&doc, SRID_WGS84).context("converting GeoJSON features")?;
    log::info!("loaded {} features from {}", features.len(), args.input.display());

    let provider =
        MemoryProvider::wgs84(args.layer.clone(), features).context("indexing features")?;

    let config = TilerConfig {
        tile_extent: args.extent,
        tile_buffer: args.buffer,
        simplify_geometries: !args.no_simplify,
        concurrency: args.concurrency,
        min_zoom: args.min_zoom,
        max_zoom: args.max_zoom,
        specific_zooms: args.zooms.clone(),
        bound: args.bound()?,
        output_dir: args.output.clone(),
        ..Default::default()
    };

    let tiler = Tiler::new(config, Arc::new(provider), args.exporter()?)
        .context("configuring tiler")?
        .with_progress(Arc::new(LogProgress));
    tiler.run().context("generating tiles")?;

    log::info!("tiles written to {}", args.output.display());
    Ok(())
}
