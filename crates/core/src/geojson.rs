//! GeoJSON exporter backend and feature parsing.
//!
//! Exports one RFC-7946 `FeatureCollection` per tile, with the tile address
//! under top-level `properties.{zoom,x,y}`. Geometry can be written in raw
//! pixel coordinates (the default, handy for debugging tile output) or
//! converted back to lon/lat through the tile's inverse projection.
//!
//! The module also parses GeoJSON geometry and feature collections, which is
//! how the CLI feeds files into a [`crate::provider::MemoryProvider`].

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::exporter::{prepare_output_path, Exporter};
use crate::geom::{
    Feature, Geometry, Layer, Point2, Polygon, Polyline, Properties, PropertyValue, Ring,
};
use crate::tile::Tile;
use crate::webmercator::SRID_WGS84;
use crate::{Error, Result};

/// Coordinate space of exported geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeoJsonCoords {
    /// Tile pixel coordinates as they come out of the pipeline.
    #[default]
    Pixel,
    /// Lon/lat, via the tile's inverse pixel projection.
    Geographic,
}

#[derive(Debug, Clone, Default)]
pub struct GeoJsonOptions {
    pub coords: GeoJsonCoords,
    /// Pretty-print the JSON output.
    pub indent: bool,
}

#[derive(Debug, Default)]
pub struct GeoJsonExporter {
    pub options: GeoJsonOptions,
    lock: Mutex<()>,
}

impl GeoJsonExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: GeoJsonOptions) -> Self {
        Self {
            options,
            lock: Mutex::new(()),
        }
    }

    fn feature_geometry(&self, geometry: &Geometry, tile: &Tile) -> Result<Value> {
        let geometry = match self.options.coords {
            GeoJsonCoords::Pixel => geometry.clone(),
            GeoJsonCoords::Geographic => {
                crate::pixel::from_tile_pixels(geometry, tile, SRID_WGS84)?
            }
        };
        Ok(geometry_to_json(&geometry))
    }

    fn collection(&self, layers: &[Layer], tile: &Tile) -> Result<Value> {
        let mut features = Vec::new();
        for layer in layers {
            for feature in &layer.features {
                features.push(json!({
                    "type": "Feature",
                    "geometry": self.feature_geometry(&feature.geometry, tile)?,
                    "properties": feature.properties,
                }));
            }
        }
        Ok(json!({
            "type": "FeatureCollection",
            "features": features,
            "properties": { "zoom": tile.z, "x": tile.x, "y": tile.y },
        }))
    }

    fn write(&self, layers: &[Layer], tile: &Tile, writer: &mut dyn Write) -> Result<()> {
        let collection = self.collection(layers, tile)?;
        let out = if self.options.indent {
            serde_json::to_vec_pretty(&collection)
        } else {
            serde_json::to_vec(&collection)
        }
        .map_err(|e| Error::Encode(e.to_string()))?;
        writer.write_all(&out)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl Exporter for GeoJsonExporter {
    fn save_tile(&self, layers: &[Layer], tile: &Tile, path: &Path) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        prepare_output_path(path)?;
        let mut file = std::fs::File::create(path)?;
        self.write(layers, tile, &mut file)
    }

    fn save_tile_to_writer(
        &self,
        layers: &[Layer],
        tile: &Tile,
        writer: &mut dyn Write,
    ) -> Result<()> {
        self.write(layers, tile, writer)
    }

    fn extension(&self) -> &str {
        "geojson"
    }
}

// ============================================================================
// Geometry → JSON
// ============================================================================

fn position(pt: Point2) -> Value {
    json!([pt.x, pt.y])
}

fn positions(pts: &[Point2]) -> Value {
    Value::Array(pts.iter().map(|&p| position(p)).collect())
}

/// A ring re-closed the way GeoJSON wants it.
fn closed_ring(ring: &Ring) -> Value {
    let mut arr: Vec<Value> = ring.0.iter().map(|&p| position(p)).collect();
    if let Some(first) = ring.0.first() {
        arr.push(position(*first));
    }
    Value::Array(arr)
}

fn polygon_coords(poly: &Polygon) -> Value {
    Value::Array(poly.rings.iter().map(closed_ring).collect())
}

pub fn geometry_to_json(geom: &Geometry) -> Value {
    match geom {
        Geometry::Point { xy, z } => {
            let coords = match z {
                Some(z) => json!([xy.x, xy.y, z]),
                None => position(*xy),
            };
            json!({ "type": "Point", "coordinates": coords })
        }
        Geometry::MultiPoint(pts) => {
            json!({ "type": "MultiPoint", "coordinates": positions(pts) })
        }
        Geometry::LineString(ln) => {
            json!({ "type": "LineString", "coordinates": positions(&ln.0) })
        }
        Geometry::MultiLineString(lns) => {
            let coords: Vec<Value> = lns.iter().map(|ln| positions(&ln.0)).collect();
            json!({ "type": "MultiLineString", "coordinates": coords })
        }
        Geometry::Polygon(p) => {
            json!({ "type": "Polygon", "coordinates": polygon_coords(p) })
        }
        Geometry::MultiPolygon(mp) => {
            let coords: Vec<Value> = mp.0.iter().map(polygon_coords).collect();
            json!({ "type": "MultiPolygon", "coordinates": coords })
        }
        Geometry::Collection(gs) => {
            let geoms: Vec<Value> = gs.iter().map(geometry_to_json).collect();
            json!({ "type": "GeometryCollection", "geometries": geoms })
        }
    }
}

// ============================================================================
// JSON → Geometry
// ============================================================================

fn parse_position(v: &Value) -> Result<(Point2, Option<f64>)> {
    let arr = v.as_array().ok_or_else(|| bad("position must be an array"))?;
    if arr.len() < 2 {
        return Err(Error::InvalidCoordCount(arr.len()));
    }
    let x = arr[0].as_f64().ok_or_else(|| bad("position x not a number"))?;
    let y = arr[1].as_f64().ok_or_else(|| bad("position y not a number"))?;
    Ok((Point2::new(x, y), arr.get(2).and_then(Value::as_f64)))
}

fn parse_positions(v: &Value) -> Result<Vec<Point2>> {
    v.as_array()
        .ok_or_else(|| bad("coordinates must be an array"))?
        .iter()
        .map(|p| parse_position(p).map(|(pt, _)| pt))
        .collect()
}

fn parse_polygon(v: &Value) -> Result<Polygon> {
    let rings = v
        .as_array()
        .ok_or_else(|| bad("polygon coordinates must be an array"))?
        .iter()
        .map(|ring| parse_positions(ring).map(Ring::new))
        .collect::<Result<Vec<Ring>>>()?;
    Ok(Polygon::new(rings))
}

fn bad(msg: &str) -> Error {
    Error::Encode(msg.to_string())
}

/// Parse a GeoJSON geometry object.
pub fn geometry_from_json(v: &Value) -> Result<Geometry> {
    let kind = v
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| bad("geometry has no type"))?;
    let coords = || v.get("coordinates").ok_or_else(|| bad("geometry has no coordinates"));
    match kind {
        "Point" => {
            let (xy, z) = parse_position(coords()?)?;
            Ok(Geometry::Point { xy, z })
        }
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_positions(coords()?)?)),
        "LineString" => Ok(Geometry::LineString(Polyline(parse_positions(coords()?)?))),
        "MultiLineString" => {
            let lines = coords()?
                .as_array()
                .ok_or_else(|| bad("multilinestring coordinates must be an array"))?
                .iter()
                .map(|ln| parse_positions(ln).map(Polyline))
                .collect::<Result<Vec<Polyline>>>()?;
            Ok(Geometry::MultiLineString(lines))
        }
        "Polygon" => Ok(Geometry::Polygon(parse_polygon(coords()?)?)),
        "MultiPolygon" => {
            let polys = coords()?
                .as_array()
                .ok_or_else(|| bad("multipolygon coordinates must be an array"))?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<Polygon>>>()?;
            Ok(Geometry::MultiPolygon(crate::geom::MultiPolygon(polys)))
        }
        "GeometryCollection" => {
            let geoms = v
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| bad("collection has no geometries"))?
                .iter()
                .map(geometry_from_json)
                .collect::<Result<Vec<Geometry>>>()?;
            Ok(Geometry::Collection(geoms))
        }
        other => Err(bad(&format!("unsupported geometry type {:?}", other))),
    }
}

fn parse_properties(v: Option<&Value>) -> Properties {
    let mut props = Properties::new();
    let Some(Value::Object(map)) = v else {
        return props;
    };
    for (k, v) in map {
        let value = match v {
            Value::String(s) => PropertyValue::String(s.clone()),
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PropertyValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    PropertyValue::UInt(u)
                } else {
                    PropertyValue::Double(n.as_f64().unwrap_or_default())
                }
            }
            // Nested values pass through as serialized text.
            other => PropertyValue::String(other.to_string()),
        };
        props.insert(k.clone(), value);
    }
    props
}

/// Parse a `FeatureCollection` (or a bare geometry / single feature) into
/// features tagged with `srid`.
pub fn features_from_json(v: &Value, srid: u64) -> Result<Vec<Feature>> {
    let kind = v.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "FeatureCollection" => {
            let raw = v
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| bad("feature collection has no features"))?;
            raw.iter().map(|f| feature_from_json(f, srid)).collect()
        }
        "Feature" => Ok(vec![feature_from_json(v, srid)?]),
        _ => Ok(vec![Feature {
            geometry: geometry_from_json(v)?,
            properties: Properties::new(),
            srid,
        }]),
    }
}

fn feature_from_json(v: &Value, srid: u64) -> Result<Feature> {
    let geometry = geometry_from_json(
        v.get("geometry")
            .ok_or_else(|| bad("feature has no geometry"))?,
    )?;
    Ok(Feature {
        geometry,
        properties: parse_properties(v.get("properties")),
        srid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_feature() -> Feature {
        Feature::new(Geometry::Polygon(Polygon::new(vec![Ring(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ])])))
    }

    #[test]
    fn test_collection_carries_tile_address() {
        let exporter = GeoJsonExporter::new();
        let tile = Tile::new(3, 2, 5);
        let mut layer = Layer::new("l");
        layer.features.push(square_feature());

        let mut buf = Vec::new();
        exporter
            .save_tile_to_writer(&[layer], &tile, &mut buf)
            .unwrap();
        let v: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["type"], "FeatureCollection");
        assert_eq!(v["properties"]["zoom"], 3);
        assert_eq!(v["properties"]["x"], 2);
        assert_eq!(v["properties"]["y"], 5);
        assert_eq!(v["features"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_rings_reclosed_on_export() {
        let v = geometry_to_json(&square_feature().geometry);
        let ring = v["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
    }

    #[test]
    fn test_geometry_json_round_trip() {
        let geoms = vec![
            Geometry::point(1.5, -2.5),
            Geometry::MultiPoint(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)]),
            Geometry::LineString(Polyline(vec![Point2::new(0.0, 0.0), Point2::new(5.0, 5.0)])),
            square_feature().geometry,
        ];
        for g in geoms {
            let parsed = geometry_from_json(&geometry_to_json(&g)).unwrap();
            assert_eq!(parsed, g, "round trip changed the geometry");
        }
    }

    #[test]
    fn test_point_z_preserved() {
        let g = Geometry::Point {
            xy: Point2::new(1.0, 2.0),
            z: Some(3.0),
        };
        let parsed = geometry_from_json(&geometry_to_json(&g)).unwrap();
        assert_eq!(parsed, g);
    }

    #[test]
    fn test_parse_feature_collection() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [4.0, 52.0] },
                    "properties": { "name": "here", "pop": 8000, "open": true }
                }
            ]
        });
        let features = features_from_json(&doc, SRID_WGS84).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].srid, SRID_WGS84);
        assert_eq!(
            features[0].properties.get("name"),
            Some(&PropertyValue::String("here".into()))
        );
        assert_eq!(features[0].properties.get("pop"), Some(&PropertyValue::Int(8000)));
        assert_eq!(features[0].properties.get("open"), Some(&PropertyValue::Bool(true)));
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let doc = json!({ "type": "Blob", "coordinates": [] });
        assert!(geometry_from_json(&doc).is_err());
    }

    #[test]
    fn test_geographic_export_uses_inverse_projection() {
        let exporter = GeoJsonExporter::with_options(GeoJsonOptions {
            coords: GeoJsonCoords::Geographic,
            indent: false,
        });
        let tile = Tile::with_options(0, 0, 0, 0.0, 4096.0, 0.0);
        let mut layer = Layer::new("l");
        layer.features.push(Feature::new(Geometry::Point {
            xy: Point2::new(2048.0, 2048.0),
            z: None,
        }));

        let mut buf = Vec::new();
        exporter
            .save_tile_to_writer(&[layer], &tile, &mut buf)
            .unwrap();
        let v: Value = serde_json::from_slice(&buf).unwrap();
        let coords = v["features"][0]["geometry"]["coordinates"].as_array().unwrap();
        assert!(coords[0].as_f64().unwrap().abs() < 1e-6);
        assert!(coords[1].as_f64().unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_save_tile_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = GeoJsonExporter::new();
        let tile = Tile::new(1, 0, 0);
        let path = dir.path().join("1/0/0.geojson");
        let mut layer = Layer::new("l");
        layer.features.push(square_feature());
        exporter.save_tile(&[layer], &tile, &path).unwrap();
        let v: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(v["type"], "FeatureCollection");
    }
}
