//! Mapbox Vector Tile encoding and the MVT exporter backend.
//!
//! Features arrive in integer pixel coordinates, so encoding is command
//! packing only:
//!
//! - **Zigzag encoding** maps signed deltas onto unsigned varint-friendly
//!   values.
//! - **Command encoding** packs MoveTo/LineTo/ClosePath with repeat counts.
//! - **Layer building** deduplicates the key and value tables.
//!
//! Polygon rings are forced to the spec winding before encoding: exterior
//! rings positive area in tile coordinates (y down), holes negative.
//!
//! Reference: <https://github.com/mapbox/vector-tile-spec>

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use prost::Message;

use crate::exporter::{prepare_output_path, Exporter};
use crate::geom::{Geometry, Layer, Point2, Polygon, PropertyValue, Ring, Winding};
use crate::tile::Tile;
use crate::vector_tile::{self, tile::GeomType};
use crate::{Error, Result};

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// Zigzag-encode a signed delta: 0, -1, 1, -2, 2 → 0, 1, 2, 3, 4.
#[inline]
pub fn zigzag_encode(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

#[inline]
pub fn zigzag_decode(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Pack `(command_id | (count << 3))`.
#[inline]
pub fn command_encode(command_id: u32, count: u32) -> u32 {
    (command_id & 0x7) | (count << 3)
}

#[inline]
pub fn command_decode(command: u32) -> (u32, u32) {
    (command & 0x7, command >> 3)
}

#[inline]
fn px(pt: Point2) -> (i32, i32) {
    (pt.x as i32, pt.y as i32)
}

struct Cursor {
    x: i32,
    y: i32,
}

impl Cursor {
    fn new() -> Self {
        Self { x: 0, y: 0 }
    }

    fn delta(&mut self, pt: Point2) -> (u32, u32) {
        let (x, y) = px(pt);
        let d = (zigzag_encode(x - self.x), zigzag_encode(y - self.y));
        self.x = x;
        self.y = y;
        d
    }
}

fn encode_points(pts: &[Point2], cursor: &mut Cursor, out: &mut Vec<u32>) {
    if pts.is_empty() {
        return;
    }
    out.push(command_encode(CMD_MOVE_TO, pts.len() as u32));
    for &pt in pts {
        let (dx, dy) = cursor.delta(pt);
        out.push(dx);
        out.push(dy);
    }
}

fn encode_polyline(pts: &[Point2], cursor: &mut Cursor, out: &mut Vec<u32>) {
    if pts.len() < 2 {
        return;
    }
    out.push(command_encode(CMD_MOVE_TO, 1));
    let (dx, dy) = cursor.delta(pts[0]);
    out.push(dx);
    out.push(dy);
    out.push(command_encode(CMD_LINE_TO, (pts.len() - 1) as u32));
    for &pt in &pts[1..] {
        let (dx, dy) = cursor.delta(pt);
        out.push(dx);
        out.push(dy);
    }
}

fn encode_ring(ring: &Ring, winding: Winding, cursor: &mut Cursor, out: &mut Vec<u32>) {
    if ring.len() < 3 {
        return;
    }
    let mut ring = ring.clone();
    ring.set_winding(winding);
    ring.normalize();

    out.push(command_encode(CMD_MOVE_TO, 1));
    let (dx, dy) = cursor.delta(ring.0[0]);
    out.push(dx);
    out.push(dy);
    out.push(command_encode(CMD_LINE_TO, (ring.len() - 1) as u32));
    for &pt in &ring.0[1..] {
        let (dx, dy) = cursor.delta(pt);
        out.push(dx);
        out.push(dy);
    }
    out.push(command_encode(CMD_CLOSE_PATH, 1));
}

fn encode_polygon(poly: &Polygon, cursor: &mut Cursor, out: &mut Vec<u32>) {
    for (i, ring) in poly.rings.iter().enumerate() {
        let winding = if i == 0 {
            Winding::Clockwise
        } else {
            Winding::CounterClockwise
        };
        encode_ring(ring, winding, cursor, out);
    }
}

/// Encode a geometry into MVT commands plus its wire geometry type.
/// Collections are not representable in MVT and come back `Unknown`/empty.
pub fn encode_geometry(geom: &Geometry) -> (Vec<u32>, GeomType) {
    let mut out = Vec::new();
    let mut cursor = Cursor::new();
    match geom {
        Geometry::Point { xy, .. } => {
            encode_points(std::slice::from_ref(xy), &mut cursor, &mut out);
            (out, GeomType::Point)
        }
        Geometry::MultiPoint(pts) => {
            encode_points(pts, &mut cursor, &mut out);
            (out, GeomType::Point)
        }
        Geometry::LineString(ln) => {
            encode_polyline(&ln.0, &mut cursor, &mut out);
            (out, GeomType::Linestring)
        }
        Geometry::MultiLineString(lns) => {
            for ln in lns {
                encode_polyline(&ln.0, &mut cursor, &mut out);
            }
            (out, GeomType::Linestring)
        }
        Geometry::Polygon(p) => {
            encode_polygon(p, &mut cursor, &mut out);
            (out, GeomType::Polygon)
        }
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 {
                encode_polygon(p, &mut cursor, &mut out);
            }
            (out, GeomType::Polygon)
        }
        Geometry::Collection(_) => (out, GeomType::Unknown),
    }
}

fn property_to_value(v: &PropertyValue) -> vector_tile::tile::Value {
    let mut out = vector_tile::tile::Value::default();
    match v {
        PropertyValue::String(s) => out.string_value = Some(s.clone()),
        PropertyValue::Float(f) => out.float_value = Some(*f),
        PropertyValue::Double(d) => out.double_value = Some(*d),
        PropertyValue::Int(i) => out.int_value = Some(*i),
        PropertyValue::UInt(u) => out.uint_value = Some(*u),
        PropertyValue::Bool(b) => out.bool_value = Some(*b),
    }
    out
}

/// Builds one wire layer, deduplicating keys and values.
pub struct LayerBuilder {
    name: String,
    extent: u32,
    features: Vec<vector_tile::tile::Feature>,
    keys: Vec<String>,
    key_index: HashMap<String, u32>,
    values: Vec<vector_tile::tile::Value>,
    value_index: HashMap<String, u32>,
}

impl LayerBuilder {
    pub fn new(name: impl Into<String>, extent: u32) -> Self {
        Self {
            name: name.into(),
            extent,
            features: Vec::new(),
            keys: Vec::new(),
            key_index: HashMap::new(),
            values: Vec::new(),
            value_index: HashMap::new(),
        }
    }

    fn key_idx(&mut self, key: &str) -> u32 {
        if let Some(&idx) = self.key_index.get(key) {
            return idx;
        }
        let idx = self.keys.len() as u32;
        self.keys.push(key.to_string());
        self.key_index.insert(key.to_string(), idx);
        idx
    }

    fn value_idx(&mut self, value: &PropertyValue) -> u32 {
        let lookup = format!("{:?}", value);
        if let Some(&idx) = self.value_index.get(&lookup) {
            return idx;
        }
        let idx = self.values.len() as u32;
        self.values.push(property_to_value(value));
        self.value_index.insert(lookup, idx);
        idx
    }

    pub fn add_feature(
        &mut self,
        id: Option<u64>,
        geometry: &Geometry,
        properties: &crate::geom::Properties,
    ) {
        let (commands, geom_type) = encode_geometry(geometry);
        if commands.is_empty() {
            return;
        }

        let mut tags = Vec::with_capacity(properties.len() * 2);
        for (key, value) in properties {
            let k = self.key_idx(key);
            let v = self.value_idx(value);
            tags.push(k);
            tags.push(v);
        }

        self.features.push(vector_tile::tile::Feature {
            id,
            tags,
            r#type: Some(geom_type as i32),
            geometry: commands,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn build(self) -> vector_tile::tile::Layer {
        vector_tile::tile::Layer {
            version: 2,
            name: self.name,
            features: self.features,
            keys: self.keys,
            values: self.values,
            extent: Some(self.extent),
        }
    }
}

/// The encoding of a tile with no layers; what `use_empty_tile` writes.
pub fn empty_tile_bytes() -> Vec<u8> {
    vector_tile::Tile::default().encode_to_vec()
}

#[derive(Debug, Clone)]
pub struct MvtOptions {
    /// Emit the empty-tile encoding instead of failing when every layer is
    /// empty.
    pub use_empty_tile: bool,
}

impl Default for MvtOptions {
    fn default() -> Self {
        Self {
            use_empty_tile: true,
        }
    }
}

/// MVT exporter backend.
#[derive(Debug, Default)]
pub struct MvtExporter {
    pub options: MvtOptions,
    lock: Mutex<()>,
}

impl MvtExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: MvtOptions) -> Self {
        Self {
            options,
            lock: Mutex::new(()),
        }
    }

    /// Encode `layers` into MVT protobuf bytes.
    pub fn generate(&self, layers: &[Layer], tile: &Tile) -> Result<Vec<u8>> {
        let mut wire_layers = Vec::new();
        for layer in layers {
            let mut builder = LayerBuilder::new(&layer.name, tile.extent as u32);
            for (i, feature) in layer.features.iter().enumerate() {
                builder.add_feature(Some(i as u64), &feature.geometry, &feature.properties);
            }
            if !builder.is_empty() {
                wire_layers.push(builder.build());
            }
        }

        if wire_layers.is_empty() {
            if self.options.use_empty_tile {
                return Ok(empty_tile_bytes());
            }
            return Err(Error::EmptyLayers);
        }

        Ok(vector_tile::Tile {
            layers: wire_layers,
        }
        .encode_to_vec())
    }
}

impl Exporter for MvtExporter {
    fn save_tile(&self, layers: &[Layer], tile: &Tile, path: &Path) -> Result<()> {
        let data = self.generate(layers, tile)?;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        prepare_output_path(path)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn save_tile_to_writer(
        &self,
        layers: &[Layer],
        tile: &Tile,
        writer: &mut dyn Write,
    ) -> Result<()> {
        let data = self.generate(layers, tile)?;
        writer.write_all(&data)?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "mvt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Feature, Polyline, Properties};

    fn pt2(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    // ========== Zigzag ==========

    #[test]
    fn test_zigzag_known_values() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(2), 4);
        assert_eq!(zigzag_encode(100), 200);
        assert_eq!(zigzag_encode(-100), 199);
    }

    #[test]
    fn test_zigzag_round_trip() {
        for n in -1000..=1000 {
            assert_eq!(zigzag_decode(zigzag_encode(n)), n);
        }
    }

    // ========== Commands ==========

    #[test]
    fn test_command_encode_known_values() {
        assert_eq!(command_encode(CMD_MOVE_TO, 1), 9);
        assert_eq!(command_encode(CMD_LINE_TO, 3), 26);
        assert_eq!(command_encode(CMD_CLOSE_PATH, 1), 15);
    }

    #[test]
    fn test_command_round_trip() {
        for id in [CMD_MOVE_TO, CMD_LINE_TO, CMD_CLOSE_PATH] {
            for count in 1..=64 {
                assert_eq!(command_decode(command_encode(id, count)), (id, count));
            }
        }
    }

    // ========== Geometry encoding ==========

    #[test]
    fn test_encode_point() {
        let (commands, t) = encode_geometry(&Geometry::point(25.0, 17.0));
        assert_eq!(t, GeomType::Point);
        assert_eq!(
            commands,
            vec![command_encode(CMD_MOVE_TO, 1), zigzag_encode(25), zigzag_encode(17)]
        );
    }

    #[test]
    fn test_encode_linestring_deltas() {
        let g = Geometry::LineString(Polyline(vec![pt2(2.0, 2.0), pt2(2.0, 10.0), pt2(10.0, 10.0)]));
        let (commands, t) = encode_geometry(&g);
        assert_eq!(t, GeomType::Linestring);
        // Example straight from the MVT spec.
        assert_eq!(commands, vec![9, 4, 4, 18, 0, 16, 16, 0]);
    }

    #[test]
    fn test_encode_polygon_closes() {
        let g = Geometry::Polygon(Polygon::new(vec![Ring(vec![
            pt2(0.0, 0.0),
            pt2(10.0, 0.0),
            pt2(10.0, 10.0),
            pt2(0.0, 10.0),
        ])]));
        let (commands, t) = encode_geometry(&g);
        assert_eq!(t, GeomType::Polygon);
        assert_eq!(command_decode(commands[0]).0, CMD_MOVE_TO);
        assert_eq!(command_decode(*commands.last().unwrap()).0, CMD_CLOSE_PATH);
        // MoveTo + pair + LineTo + 3 pairs + ClosePath.
        assert_eq!(commands.len(), 1 + 2 + 1 + 6 + 1);
    }

    #[test]
    fn test_polygon_winding_normalised() {
        // Same square, opposite input windings: identical encodings.
        let cw = Geometry::Polygon(Polygon::new(vec![Ring(vec![
            pt2(0.0, 0.0),
            pt2(10.0, 0.0),
            pt2(10.0, 10.0),
            pt2(0.0, 10.0),
        ])]));
        let ccw = Geometry::Polygon(Polygon::new(vec![Ring(vec![
            pt2(0.0, 0.0),
            pt2(0.0, 10.0),
            pt2(10.0, 10.0),
            pt2(10.0, 0.0),
        ])]));
        assert_eq!(encode_geometry(&cw).0, encode_geometry(&ccw).0);
    }

    // ========== Layer building ==========

    fn props(kv: &[(&str, PropertyValue)]) -> Properties {
        kv.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_layer_builder_dedup() {
        let mut builder = LayerBuilder::new("roads", 4096);
        builder.add_feature(
            Some(1),
            &Geometry::point(1.0, 1.0),
            &props(&[("kind", PropertyValue::String("street".into()))]),
        );
        builder.add_feature(
            Some(2),
            &Geometry::point(2.0, 2.0),
            &props(&[("kind", PropertyValue::String("street".into()))]),
        );
        builder.add_feature(
            Some(3),
            &Geometry::point(3.0, 3.0),
            &props(&[("kind", PropertyValue::String("rail".into()))]),
        );
        let layer = builder.build();
        assert_eq!(layer.version, 2);
        assert_eq!(layer.features.len(), 3);
        assert_eq!(layer.keys, vec!["kind"]);
        assert_eq!(layer.values.len(), 2);
        assert_eq!(layer.extent, Some(4096));
    }

    #[test]
    fn test_empty_geometry_skipped() {
        let mut builder = LayerBuilder::new("x", 4096);
        builder.add_feature(
            None,
            &Geometry::LineString(Polyline(vec![pt2(0.0, 0.0)])),
            &Properties::new(),
        );
        assert!(builder.is_empty());
    }

    // ========== Exporter ==========

    fn one_feature_layer() -> Layer {
        let mut layer = Layer::new("test");
        layer.features.push(Feature::new(Geometry::point(100.0, 200.0)));
        layer
    }

    #[test]
    fn test_generate_decodes_back() {
        let exporter = MvtExporter::new();
        let tile = Tile::with_options(0, 0, 0, 0.0, 4096.0, 0.0);
        let data = exporter.generate(&[one_feature_layer()], &tile).unwrap();
        let decoded = vector_tile::Tile::decode(data.as_slice()).unwrap();
        assert_eq!(decoded.layers.len(), 1);
        assert_eq!(decoded.layers[0].name, "test");
        assert_eq!(decoded.layers[0].extent, Some(4096));
        assert_eq!(decoded.layers[0].features.len(), 1);
        assert_eq!(decoded.layers[0].features[0].r#type, Some(GeomType::Point as i32));
    }

    #[test]
    fn test_empty_layers_behaviour() {
        let tile = Tile::new(1, 0, 0);

        let lenient = MvtExporter::new();
        assert_eq!(
            lenient.generate(&[], &tile).unwrap(),
            empty_tile_bytes()
        );

        let strict = MvtExporter::with_options(MvtOptions {
            use_empty_tile: false,
        });
        assert!(matches!(strict.generate(&[], &tile), Err(Error::EmptyLayers)));
    }

    #[test]
    fn test_save_tile_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = MvtExporter::new();
        let tile = Tile::with_options(0, 0, 0, 0.0, 4096.0, 0.0);
        let path = dir
            .path()
            .join(exporter.relative_tile_path(tile.z, tile.x, tile.y));
        exporter
            .save_tile(&[one_feature_layer()], &tile, &path)
            .unwrap();
        assert!(path.is_file());
        assert!(path.ends_with("0/0/0.mvt"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(vector_tile::Tile::decode(bytes.as_slice()).is_ok());
    }
}
