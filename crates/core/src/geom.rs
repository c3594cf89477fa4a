//! Geometry value types.
//!
//! One coordinate newtype ([`Point2`]) is used across the whole core; rings
//! are stored *unclosed* (the first point is not repeated at the end), and
//! winding is defined in tile-pixel space where y grows downward: a ring with
//! positive signed area reads clockwise on screen and is an outer shell, a
//! negative-area ring is a hole.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Error, Result};

/// Absolute per-axis tolerance for approximate point equality.
pub const POINT_TOLERANCE: f64 = 1e-6;

/// A 2D coordinate. Geographic stages hold degrees or Web-Mercator meters;
/// after the pixel projection the components are whole numbers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// Bit-exact hashable key for a [`Point2`]. The make-valid engine keys its
/// vertex maps on this; `-0.0` is folded into `0.0` so the two compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointKey(u64, u64);

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Equality within [`POINT_TOLERANCE`] on each axis.
    pub fn approx_eq(&self, other: Point2) -> bool {
        (self.x - other.x).abs() < POINT_TOLERANCE && (self.y - other.y).abs() < POINT_TOLERANCE
    }

    /// Drop the fractional part of both components (toward zero).
    pub fn truncate(self) -> Point2 {
        Point2::new(self.x.trunc(), self.y.trunc())
    }

    pub fn key(self) -> PointKey {
        let x = if self.x == 0.0 { 0.0 } else { self.x };
        let y = if self.y == 0.0 { 0.0 } else { self.y };
        PointKey(x.to_bits(), y.to_bits())
    }
}

/// Lexicographic x-then-y ordering, the ordering used by the sweep line and
/// by ring normalization.
pub fn xy_order(a: Point2, b: Point2) -> std::cmp::Ordering {
    a.x.partial_cmp(&b.x)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An inverted extent that any `expand_point` call will overwrite.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn from_points<I: IntoIterator<Item = Point2>>(pts: I) -> Self {
        let mut e = Self::empty();
        for pt in pts {
            e.expand_point(pt);
        }
        e
    }

    pub fn contains(&self, pt: Point2) -> bool {
        pt.x >= self.min_x && pt.x <= self.max_x && pt.y >= self.min_y && pt.y <= self.max_y
    }

    pub fn contains_extent(&self, other: &Extent) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Grow (or shrink, for negative `d`) by `d` on every side.
    pub fn expand(&self, d: f64) -> Extent {
        Extent::new(self.min_x - d, self.min_y - d, self.max_x + d, self.max_y + d)
    }

    pub fn expand_point(&mut self, pt: Point2) {
        self.min_x = self.min_x.min(pt.x);
        self.min_y = self.min_y.min(pt.y);
        self.max_x = self.max_x.max(pt.x);
        self.max_y = self.max_y.max(pt.y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn scale(&self, factor: f64) -> Extent {
        Extent::new(
            self.min_x * factor,
            self.min_y * factor,
            self.max_x * factor,
            self.max_y * factor,
        )
    }
}

/// Ring winding in pixel space (y down): `Clockwise` is what a viewer sees as
/// clockwise, and carries positive signed area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
    Degenerate,
}

/// An open point sequence (first point != last).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polyline(pub Vec<Point2>);

impl Polyline {
    pub fn new(pts: Vec<Point2>) -> Self {
        Self(pts)
    }

    /// Build from a flat `[x0, y0, x1, y1, ..]` list.
    pub fn from_flat(coords: &[f64]) -> Result<Self> {
        if coords.len() % 2 != 0 {
            return Err(Error::InvalidCoordCount(coords.len()));
        }
        Ok(Self(
            coords
                .chunks_exact(2)
                .map(|c| Point2::new(c[0], c[1]))
                .collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of per-segment Manhattan lengths.
    pub fn manhattan_length(&self) -> f64 {
        self.0
            .windows(2)
            .map(|w| (w[1].x - w[0].x).abs() + (w[1].y - w[0].y).abs())
            .sum()
    }

    pub fn extent(&self) -> Extent {
        Extent::from_points(self.0.iter().copied())
    }
}

/// A ring with implicit closure: the edge from the last point back to the
/// first is understood, never stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ring(pub Vec<Point2>);

impl Ring {
    pub fn new(mut pts: Vec<Point2>) -> Self {
        // Strip an explicit closing point if the caller provided one.
        while pts.len() > 1 && pts[0].approx_eq(pts[pts.len() - 1]) {
            pts.pop();
        }
        Self(pts)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shoelace area with sign. Positive means clockwise on screen in
    /// pixel space (y down).
    pub fn signed_area(&self) -> f64 {
        let pts = &self.0;
        let n = pts.len();
        if n < 3 {
            return 0.0;
        }
        let mut area = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            area += pts[i].x * pts[j].y;
            area -= pts[j].x * pts[i].y;
        }
        area / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn winding(&self) -> Winding {
        let a = self.signed_area();
        if a > 0.0 {
            Winding::Clockwise
        } else if a < 0.0 {
            Winding::CounterClockwise
        } else {
            Winding::Degenerate
        }
    }

    /// Reverse in place so the ring winds as requested.
    pub fn set_winding(&mut self, w: Winding) {
        let cur = self.winding();
        if cur != Winding::Degenerate && cur != w {
            self.0.reverse();
        }
    }

    /// Rotate so the lexicographically smallest vertex comes first,
    /// preserving direction. Makes ring equality order-independent.
    pub fn normalize(&mut self) {
        if self.0.len() < 2 {
            return;
        }
        let mut min_idx = 0;
        for i in 1..self.0.len() {
            if xy_order(self.0[i], self.0[min_idx]) == std::cmp::Ordering::Less {
                min_idx = i;
            }
        }
        if min_idx != 0 {
            self.0.rotate_left(min_idx);
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::from_points(self.0.iter().copied())
    }
}

/// Ring 0 is the shell, the rest are holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub rings: Vec<Ring>,
}

impl Polygon {
    pub fn new(rings: Vec<Ring>) -> Self {
        Self { rings }
    }

    pub fn shell(&self) -> Option<&Ring> {
        self.rings.first()
    }

    pub fn holes(&self) -> &[Ring] {
        if self.rings.is_empty() {
            &[]
        } else {
            &self.rings[1..]
        }
    }

    /// Area of the shell.
    pub fn area(&self) -> f64 {
        self.shell().map(Ring::area).unwrap_or(0.0)
    }

    pub fn extent(&self) -> Extent {
        self.shell().map(Ring::extent).unwrap_or_else(Extent::empty)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiPolygon(pub Vec<Polygon>);

impl MultiPolygon {
    pub fn area(&self) -> f64 {
        self.0.iter().map(Polygon::area).sum()
    }
}

/// Tagged geometry variant; every pipeline stage matches exhaustively.
///
/// Points carry an opaque z value that survives all transforms untouched;
/// polylines and polygons are two-dimensional.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point { xy: Point2, z: Option<f64> },
    MultiPoint(Vec<Point2>),
    LineString(Polyline),
    MultiLineString(Vec<Polyline>),
    Polygon(Polygon),
    MultiPolygon(MultiPolygon),
    Collection(Vec<Geometry>),
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point {
            xy: Point2::new(x, y),
            z: None,
        }
    }

    /// Bounding box over every coordinate in the geometry.
    pub fn extent(&self) -> Extent {
        let mut e = Extent::empty();
        self.each_point(&mut |pt| e.expand_point(pt));
        e
    }

    fn each_point(&self, f: &mut impl FnMut(Point2)) {
        match self {
            Geometry::Point { xy, .. } => f(*xy),
            Geometry::MultiPoint(pts) => pts.iter().copied().for_each(f),
            Geometry::LineString(ln) => ln.0.iter().copied().for_each(f),
            Geometry::MultiLineString(lns) => {
                for ln in lns {
                    ln.0.iter().copied().for_each(&mut *f);
                }
            }
            Geometry::Polygon(p) => {
                for r in &p.rings {
                    r.0.iter().copied().for_each(&mut *f);
                }
            }
            Geometry::MultiPolygon(mp) => {
                for p in &mp.0 {
                    for r in &p.rings {
                        r.0.iter().copied().for_each(&mut *f);
                    }
                }
            }
            Geometry::Collection(gs) => {
                for g in gs {
                    g.each_point(&mut *f);
                }
            }
        }
    }

    /// Apply `f` to every coordinate, rebuilding the geometry.
    pub fn map_points(&self, f: &impl Fn(Point2) -> Point2) -> Geometry {
        match self {
            Geometry::Point { xy, z } => Geometry::Point { xy: f(*xy), z: *z },
            Geometry::MultiPoint(pts) => {
                Geometry::MultiPoint(pts.iter().map(|p| f(*p)).collect())
            }
            Geometry::LineString(ln) => {
                Geometry::LineString(Polyline(ln.0.iter().map(|p| f(*p)).collect()))
            }
            Geometry::MultiLineString(lns) => Geometry::MultiLineString(
                lns.iter()
                    .map(|ln| Polyline(ln.0.iter().map(|p| f(*p)).collect()))
                    .collect(),
            ),
            Geometry::Polygon(p) => Geometry::Polygon(map_polygon(p, f)),
            Geometry::MultiPolygon(mp) => {
                Geometry::MultiPolygon(MultiPolygon(mp.0.iter().map(|p| map_polygon(p, f)).collect()))
            }
            Geometry::Collection(gs) => {
                Geometry::Collection(gs.iter().map(|g| g.map_points(f)).collect())
            }
        }
    }
}

fn map_polygon(p: &Polygon, f: &impl Fn(Point2) -> Point2) -> Polygon {
    Polygon::new(
        p.rings
            .iter()
            .map(|r| Ring(r.0.iter().map(|pt| f(*pt)).collect()))
            .collect(),
    )
}

/// A scalar feature attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Float(f32),
    Double(f64),
    Int(i64),
    UInt(u64),
    Bool(bool),
}

pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
    pub srid: u64,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            properties: Properties::new(),
            srid: crate::webmercator::SRID_WGS84,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub features: Vec<Feature>,
    pub srid: u64,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
            srid: crate::webmercator::SRID_WGS84,
        }
    }
}
