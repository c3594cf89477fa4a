//! Point-in-polygon hit-map.
//!
//! Build once, query many times: every polygon edge becomes a sweep event
//! keyed by its smaller-x endpoint, with y scaled to centi-units and
//! truncated so collinear comparisons normalise. A query ray-casts leftward
//! counting crossings; landing exactly on an edge reports inside.
//!
//! A multi-polygon registers one segment per ring, shells labelled
//! [`Label::Inside`] and holes [`Label::Outside`]; the label of the last
//! added segment containing the point wins, which is how holes mask their
//! shells.

use crate::geom::{Extent, MultiPolygon, Point2, Polygon, Ring};
use crate::sweep::{slope_intercept, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Inside,
    Outside,
}

impl Label {
    pub fn flip(self) -> Label {
        match self {
            Label::Inside => Label::Outside,
            Label::Outside => Label::Inside,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SegEvent {
    x1: f64,
    y1: i64,
    x2: f64,
    y2: i64,
    m: f64,
    b: f64,
    m_defined: bool,
}

fn centi(y: f64) -> i64 {
    (y * 100.0) as i64
}

#[derive(Debug, Clone, Default)]
struct SegEvents(Vec<SegEvent>);

impl SegEvents {
    fn add(&mut self, l: Segment) {
        if l[0] == l[1] {
            return;
        }
        // Key by the smaller-x endpoint; vertical edges by the smaller y.
        let (a, b) = if l[0].x < l[1].x || (l[0].x == l[1].x && l[0].y > l[1].y) {
            (l[0], l[1])
        } else {
            (l[1], l[0])
        };
        let (m, bb, m_defined) = slope_intercept(l);
        self.0.push(SegEvent {
            x1: a.x,
            y1: centi(a.y),
            x2: b.x,
            y2: centi(b.y),
            m,
            b: bb,
            m_defined,
        });
    }

    fn sort(&mut self) {
        self.0.sort_by(|a, b| {
            a.x1.partial_cmp(&b.x1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.y1.cmp(&b.y1))
        });
    }

    fn contains(&self, pt: Point2) -> bool {
        let y100 = centi(pt.y);
        let mut count = 0;
        for ev in self.0.iter().take_while(|ev| ev.x1 <= pt.x) {
            let (uy, ly) = if ev.y1 <= ev.y2 {
                (ev.y1, ev.y2)
            } else {
                (ev.y2, ev.y1)
            };
            if y100 < uy || y100 > ly {
                continue;
            }

            // Horizontal edge at the query height: on-edge is inside.
            if ev.y1 == ev.y2 && y100 == ev.y1 {
                if ev.x1 <= pt.x && pt.x <= ev.x2 {
                    return true;
                }
                continue;
            }

            // Ray through a vertex: count it only when the other endpoint
            // lies strictly below the ray, so shared vertices of adjacent
            // edges are not double counted.
            if y100 == ev.y1 && ev.x1 < pt.x {
                if ev.y2 <= y100 {
                    count += 1;
                }
                continue;
            }
            if y100 == ev.y2 && ev.x2 < pt.x {
                if ev.y1 <= y100 {
                    count += 1;
                }
                continue;
            }

            if !ev.m_defined && pt.x == ev.x1 {
                return true;
            }

            if pt.x > ev.x2 {
                count += 1;
                continue;
            }

            let y = centi(ev.m * pt.x + ev.b);
            if y == y100 {
                return true;
            }
            if (ev.m < 0.0 && y < y100) || (ev.m > 0.0 && y > y100) {
                count += 1;
            }
        }
        count % 2 != 0
    }
}

/// One labelled ring of events with its bounding box for cheap rejection.
#[derive(Debug, Clone)]
pub struct HitSegment {
    bbox: Extent,
    label: Label,
    events: SegEvents,
}

impl HitSegment {
    pub fn from_ring(label: Label, ring: &Ring) -> Self {
        let mut events = SegEvents::default();
        let pts = &ring.0;
        let mut j = pts.len().wrapping_sub(1);
        for i in 0..pts.len() {
            events.add([pts[j], pts[i]]);
            j = i;
        }
        events.sort();
        Self {
            bbox: ring.extent(),
            label,
            events,
        }
    }

    pub fn from_segments(label: Label, lines: &[Segment]) -> Self {
        let mut events = SegEvents::default();
        let mut bbox = Extent::empty();
        for l in lines {
            bbox.expand_point(l[0]);
            bbox.expand_point(l[1]);
            events.add(*l);
        }
        events.sort();
        Self {
            bbox,
            label,
            events,
        }
    }

    pub fn contains(&self, pt: Point2) -> bool {
        self.bbox.contains(pt) && self.events.contains(pt)
    }
}

/// The hit-map proper: an ordered stack of labelled ring segments.
#[derive(Debug, Clone, Default)]
pub struct HitMap {
    segments: Vec<HitSegment>,
}

impl HitMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, seg: HitSegment) {
        self.segments.push(seg);
    }

    /// Label of the last added segment containing the point; `Outside` when
    /// no segment does.
    pub fn label_for(&self, pt: Point2) -> Label {
        for seg in self.segments.iter().rev() {
            if seg.contains(pt) {
                return seg.label;
            }
        }
        Label::Outside
    }

    pub fn from_polygon(p: &Polygon) -> Self {
        let mut hm = Self::new();
        for (i, ring) in p.rings.iter().enumerate() {
            let label = if i == 0 { Label::Inside } else { Label::Outside };
            hm.push(HitSegment::from_ring(label, ring));
        }
        hm
    }

    pub fn from_multipolygon(mp: &MultiPolygon) -> Self {
        let mut hm = Self::new();
        for p in &mp.0 {
            for (i, ring) in p.rings.iter().enumerate() {
                let label = if i == 0 { Label::Inside } else { Label::Outside };
                hm.push(HitSegment::from_ring(label, ring));
            }
        }
        hm
    }
}
