//! SVG exporter backend.
//!
//! Renders each tile as one `<svg>` document: a `<g>` per layer, a
//! `<circle>`, `<path>` or `<polygon>` per feature, scaled from tile pixel
//! space onto the configured canvas. `properties.style` and
//! `properties.color` pass straight through into the markup; a debug grid
//! (coarse lines with a finer sub-grid) can be switched on to eyeball
//! coordinate placement.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::exporter::{prepare_output_path, Exporter};
use crate::geom::{Geometry, Layer, Point2, Polygon, PropertyValue};
use crate::tile::Tile;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SvgOptions {
    pub width: u32,
    pub height: u32,
    /// Draw the coarse + fine debug grid under the features.
    pub grid: bool,
    pub default_style: String,
    pub default_point_color: String,
    pub point_radius: f64,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            grid: false,
            default_style: "fill:none;stroke:blue;stroke-width:1".to_string(),
            default_point_color: "red".to_string(),
            point_radius: 2.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SvgExporter {
    pub options: SvgOptions,
    lock: Mutex<()>,
}

impl SvgExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SvgOptions) -> Self {
        Self {
            options,
            lock: Mutex::new(()),
        }
    }

    fn scale(&self, tile: &Tile, pt: Point2) -> (f64, f64) {
        let sx = self.options.width as f64 / tile.extent;
        let sy = self.options.height as f64 / tile.extent;
        (pt.x * sx, pt.y * sy)
    }

    fn grid_markup(&self, out: &mut String) {
        let (w, h) = (self.options.width as f64, self.options.height as f64);
        // Fine sub-grid at a tenth of the coarse spacing.
        for (step, stroke) in [(w / 100.0, "#f0f0f0"), (w / 10.0, "#d0d0d0")] {
            let mut x = step;
            while x < w {
                let _ = writeln!(
                    out,
                    r#"  <line x1="{x:.1}" y1="0" x2="{x:.1}" y2="{h:.1}" stroke="{stroke}" stroke-width="0.5"/>"#
                );
                x += step;
            }
            let mut y = step;
            while y < h {
                let _ = writeln!(
                    out,
                    r#"  <line x1="0" y1="{y:.1}" x2="{w:.1}" y2="{y:.1}" stroke="{stroke}" stroke-width="0.5"/>"#
                );
                y += step;
            }
        }
    }

    fn path_data(&self, tile: &Tile, pts: &[Point2], close: bool) -> String {
        let mut d = String::new();
        for (i, &pt) in pts.iter().enumerate() {
            let (x, y) = self.scale(tile, pt);
            let cmd = if i == 0 { 'M' } else { 'L' };
            let _ = write!(d, "{}{:.2} {:.2} ", cmd, x, y);
        }
        if close {
            d.push('Z');
        }
        d.trim_end().to_string()
    }

    fn polygon_markup(&self, tile: &Tile, poly: &Polygon, style: &str, out: &mut String) {
        // One path with a subpath per ring; even-odd fill keeps holes open.
        let mut d = String::new();
        for ring in &poly.rings {
            let _ = write!(d, "{} ", self.path_data(tile, &ring.0, true));
        }
        let _ = writeln!(
            out,
            r#"    <path d="{}" fill-rule="evenodd" style="{}"/>"#,
            d.trim_end(),
            style
        );
    }

    fn geometry_markup(
        &self,
        tile: &Tile,
        geom: &Geometry,
        style: &str,
        color: &str,
        out: &mut String,
    ) {
        match geom {
            Geometry::Point { xy, .. } => {
                let (x, y) = self.scale(tile, *xy);
                let _ = writeln!(
                    out,
                    r#"    <circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}"/>"#,
                    x, y, self.options.point_radius, color
                );
            }
            Geometry::MultiPoint(pts) => {
                for &pt in pts {
                    let (x, y) = self.scale(tile, pt);
                    let _ = writeln!(
                        out,
                        r#"    <circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}"/>"#,
                        x, y, self.options.point_radius, color
                    );
                }
            }
            Geometry::LineString(ln) => {
                let _ = writeln!(
                    out,
                    r#"    <path d="{}" style="{}"/>"#,
                    self.path_data(tile, &ln.0, false),
                    style
                );
            }
            Geometry::MultiLineString(lns) => {
                for ln in lns {
                    let _ = writeln!(
                        out,
                        r#"    <path d="{}" style="{}"/>"#,
                        self.path_data(tile, &ln.0, false),
                        style
                    );
                }
            }
            Geometry::Polygon(p) => self.polygon_markup(tile, p, style, out),
            Geometry::MultiPolygon(mp) => {
                for p in &mp.0 {
                    self.polygon_markup(tile, p, style, out);
                }
            }
            Geometry::Collection(gs) => {
                for g in gs {
                    self.geometry_markup(tile, g, style, color, out);
                }
            }
        }
    }

    /// Render the full document.
    pub fn generate(&self, layers: &[Layer], tile: &Tile) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
            self.options.width, self.options.height
        );
        let _ = writeln!(out, "  <!-- tile {} -->", tile.id());
        if self.options.grid {
            self.grid_markup(&mut out);
        }
        for layer in layers {
            let _ = writeln!(out, r#"  <g id="{}">"#, xml_escape(&layer.name));
            for feature in &layer.features {
                let style = match feature.properties.get("style") {
                    Some(PropertyValue::String(s)) => s.clone(),
                    _ => self.options.default_style.clone(),
                };
                let color = match feature.properties.get("color") {
                    Some(PropertyValue::String(s)) => s.clone(),
                    _ => self.options.default_point_color.clone(),
                };
                self.geometry_markup(tile, &feature.geometry, &style, &color, &mut out);
            }
            let _ = writeln!(out, "  </g>");
        }
        out.push_str("</svg>\n");
        Ok(out)
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Exporter for SvgExporter {
    fn save_tile(&self, layers: &[Layer], tile: &Tile, path: &Path) -> Result<()> {
        let data = self.generate(layers, tile)?;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        prepare_output_path(path)?;
        std::fs::write(path, data).map_err(Error::from)
    }

    fn save_tile_to_writer(
        &self,
        layers: &[Layer],
        tile: &Tile,
        writer: &mut dyn Write,
    ) -> Result<()> {
        let data = self.generate(layers, tile)?;
        writer.write_all(data.as_bytes())?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "svg"
    }
}
