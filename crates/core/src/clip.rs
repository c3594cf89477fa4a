//! Geometry clipping against the buffered tile rectangle.
//!
//! Runs in pixel space after the tile projection. Polylines use a
//! Cohen-Sutherland style vertex walk that emits one output chain per
//! contiguous inside run; polygons use Sutherland-Hodgman with one pass per
//! rectangle edge. The shell gates hole processing: a polygon whose shell is
//! clipped away disappears, holes that vanish are dropped alone.

use crate::geom::{xy_order, Extent, Geometry, MultiPolygon, Point2, Polygon, Polyline, Ring};
use crate::sweep::{in_between, line_intersection, Segment};

/// Intersections of a segment with the rectangle boundary, deduplicated and
/// sorted lexicographically. A segment meets an axis-aligned rectangle in at
/// most two points.
fn rect_intersections(rect: &Extent, seg: Segment) -> Vec<Point2> {
    let edges: [Segment; 4] = [
        [
            Point2::new(rect.min_x, rect.min_y),
            Point2::new(rect.max_x, rect.min_y),
        ],
        [
            Point2::new(rect.max_x, rect.min_y),
            Point2::new(rect.max_x, rect.max_y),
        ],
        [
            Point2::new(rect.max_x, rect.max_y),
            Point2::new(rect.min_x, rect.max_y),
        ],
        [
            Point2::new(rect.min_x, rect.max_y),
            Point2::new(rect.min_x, rect.min_y),
        ],
    ];

    let mut pts: Vec<Point2> = Vec::new();
    'edges: for edge in edges {
        if let Some(pt) = line_intersection(edge, seg) {
            if !in_between(edge, pt) || !in_between(seg, pt) {
                continue;
            }
            for existing in &pts {
                if existing.approx_eq(pt) {
                    continue 'edges;
                }
            }
            pts.push(pt);
        }
    }
    pts.sort_by(|a, b| xy_order(*a, *b));
    pts
}

/// Clip an open polyline to `rect`, splitting it into the chains that remain
/// inside. A segment with both endpoints outside can still cross the
/// rectangle; its two boundary intersections come out as a standalone
/// two-point polyline.
pub fn clip_polyline(line: &Polyline, rect: &Extent) -> Vec<Polyline> {
    let pts = &line.0;
    if pts.len() < 2 {
        return Vec::new();
    }
    if pts.iter().all(|pt| rect.contains(*pt)) {
        return vec![line.clone()];
    }

    let mut out: Vec<Polyline> = Vec::new();
    let mut chain: Vec<Point2> = Vec::new();

    let mut prev_in = rect.contains(pts[0]);
    if prev_in {
        chain.push(pts[0]);
    }

    for i in 1..pts.len() {
        let cur_in = rect.contains(pts[i]);
        let seg: Segment = [pts[i - 1], pts[i]];
        match (prev_in, cur_in) {
            (false, true) => {
                // Entering: the entry intersection precedes the vertex. Two
                // hits can happen when the segment grazes a corner; pick the
                // one nearer the outside endpoint, decided by whether the
                // segment and the hit pair sort the same way.
                let hits = rect_intersections(rect, seg);
                match hits.len() {
                    0 => {}
                    1 => chain.push(hits[0]),
                    _ => {
                        let seg_less = xy_order(seg[0], seg[1]) == std::cmp::Ordering::Less;
                        let idx = if seg_less { 0 } else { 1 };
                        chain.push(hits[idx]);
                    }
                }
                chain.push(pts[i]);
            }
            (false, false) => {
                let hits = rect_intersections(rect, seg);
                if hits.len() > 1 {
                    let seg_less = xy_order(seg[0], seg[1]) == std::cmp::Ordering::Less;
                    let (f, s) = if seg_less { (0, 1) } else { (1, 0) };
                    out.push(Polyline(vec![hits[f], hits[s]]));
                }
                chain.clear();
            }
            (true, true) => chain.push(pts[i]),
            (true, false) => {
                let hits = rect_intersections(rect, seg);
                if let Some(last) = chain.last().copied() {
                    for hit in hits {
                        if !hit.approx_eq(last) {
                            chain.push(hit);
                        }
                    }
                }
                if chain.len() > 1 {
                    out.push(Polyline(std::mem::take(&mut chain)));
                }
                chain.clear();
            }
        }
        prev_in = cur_in;
    }
    if chain.len() > 1 {
        out.push(Polyline(chain));
    }
    out
}

/// One Sutherland-Hodgman pass: keep vertices passing `inside`, inserting the
/// boundary intersection wherever the ring crosses the clip line.
fn clip_ring_edge<F, I>(vertices: &[Point2], inside: F, intersect: I) -> Vec<Point2>
where
    F: Fn(Point2) -> bool,
    I: Fn(Point2, Point2) -> Point2,
{
    if vertices.is_empty() {
        return Vec::new();
    }
    let mut output = Vec::with_capacity(vertices.len() + 4);
    let mut s = vertices[vertices.len() - 1];
    for &e in vertices {
        if inside(e) {
            if !inside(s) {
                output.push(intersect(s, e));
            }
            output.push(e);
        } else if inside(s) {
            output.push(intersect(s, e));
        }
        s = e;
    }
    output
}

/// Sutherland-Hodgman over the four rectangle edges, left/right/bottom/top.
/// Returns `None` when the ring degenerates (under 3 distinct points).
pub fn clip_ring(ring: &Ring, rect: &Extent) -> Option<Ring> {
    if ring.len() < 3 {
        return None;
    }
    let mut pts = ring.0.clone();

    let passes: [(&dyn Fn(Point2) -> bool, &dyn Fn(Point2, Point2) -> Point2); 4] = [
        (
            &|p: Point2| p.x >= rect.min_x,
            &|s: Point2, e: Point2| {
                let t = (rect.min_x - s.x) / (e.x - s.x);
                Point2::new(rect.min_x, s.y + t * (e.y - s.y))
            },
        ),
        (
            &|p: Point2| p.x <= rect.max_x,
            &|s: Point2, e: Point2| {
                let t = (rect.max_x - s.x) / (e.x - s.x);
                Point2::new(rect.max_x, s.y + t * (e.y - s.y))
            },
        ),
        (
            &|p: Point2| p.y >= rect.min_y,
            &|s: Point2, e: Point2| {
                let t = (rect.min_y - s.y) / (e.y - s.y);
                Point2::new(s.x + t * (e.x - s.x), rect.min_y)
            },
        ),
        (
            &|p: Point2| p.y <= rect.max_y,
            &|s: Point2, e: Point2| {
                let t = (rect.max_y - s.y) / (e.y - s.y);
                Point2::new(s.x + t * (e.x - s.x), rect.max_y)
            },
        ),
    ];

    for (inside, intersect) in passes {
        pts = clip_ring_edge(&pts, inside, intersect);
        // Collapse duplicates the pass may have produced at corners.
        pts.dedup_by(|a, b| a.approx_eq(*b));
        while pts.len() > 1 && pts[0].approx_eq(pts[pts.len() - 1]) {
            pts.pop();
        }
        if pts.len() < 3 {
            return None;
        }
    }

    let mut ring = Ring(pts);
    ring.normalize();
    Some(ring)
}

/// Clip a polygon; shell first, holes only if the shell survives.
pub fn clip_polygon(poly: &Polygon, rect: &Extent) -> Option<Polygon> {
    let shell = poly.shell()?;

    let poly_extent = poly.extent();
    if !rect.intersects(&poly_extent) {
        return None;
    }
    if rect.contains_extent(&poly_extent) {
        let mut out = poly.clone();
        for ring in &mut out.rings {
            ring.normalize();
        }
        return Some(out);
    }

    let shell = clip_ring(shell, rect)?;
    let mut rings = vec![shell];
    for hole in poly.holes() {
        if let Some(clipped) = clip_ring(hole, rect) {
            rings.push(clipped);
        }
    }
    Some(Polygon::new(rings))
}

/// Clip any geometry to `rect`. `None` means nothing is left.
pub fn clip_geometry(geom: &Geometry, rect: &Extent) -> Option<Geometry> {
    match geom {
        Geometry::Point { xy, .. } => rect.contains(*xy).then(|| geom.clone()),
        Geometry::MultiPoint(pts) => {
            let kept: Vec<Point2> = pts.iter().copied().filter(|p| rect.contains(*p)).collect();
            if kept.is_empty() {
                None
            } else {
                Some(Geometry::MultiPoint(kept))
            }
        }
        Geometry::LineString(ln) => {
            let mut chains = clip_polyline(ln, rect);
            match chains.len() {
                0 => None,
                1 => Some(Geometry::LineString(chains.remove(0))),
                _ => Some(Geometry::MultiLineString(chains)),
            }
        }
        Geometry::MultiLineString(lns) => {
            let chains: Vec<Polyline> = lns.iter().flat_map(|ln| clip_polyline(ln, rect)).collect();
            if chains.is_empty() {
                None
            } else {
                Some(Geometry::MultiLineString(chains))
            }
        }
        Geometry::Polygon(p) => clip_polygon(p, rect).map(Geometry::Polygon),
        Geometry::MultiPolygon(mp) => {
            let polys: Vec<Polygon> = mp.0.iter().filter_map(|p| clip_polygon(p, rect)).collect();
            if polys.is_empty() {
                None
            } else {
                Some(Geometry::MultiPolygon(MultiPolygon(polys)))
            }
        }
        Geometry::Collection(gs) => {
            let kept: Vec<Geometry> = gs.iter().filter_map(|g| clip_geometry(g, rect)).collect();
            if kept.is_empty() {
                None
            } else {
                Some(Geometry::Collection(kept))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Extent {
        Extent::new(x0, y0, x1, y1)
    }

    // ========== Polyline Clipping ==========

    #[test]
    fn test_polyline_crossing_buffered_tile() {
        // Tile rect [0,0,10,10] with a 2 px buffer.
        let r = rect(0.0, 0.0, 10.0, 10.0).expand(2.0);
        let line = Polyline(pts(&[(-10.0, 5.0), (10.0, 5.0)]));
        let out = clip_polyline(&line, &r);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, pts(&[(-2.0, 5.0), (10.0, 5.0)]));
    }

    #[test]
    fn test_polyline_fully_inside() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let line = Polyline(pts(&[(1.0, 1.0), (9.0, 9.0)]));
        let out = clip_polyline(&line, &r);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], line);
    }

    #[test]
    fn test_polyline_fully_outside() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let line = Polyline(pts(&[(20.0, 20.0), (30.0, 30.0)]));
        assert!(clip_polyline(&line, &r).is_empty());
    }

    #[test]
    fn test_polyline_through_and_out() {
        // Both endpoints outside, segment crossing the whole rectangle.
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let line = Polyline(pts(&[(-5.0, 5.0), (15.0, 5.0)]));
        let out = clip_polyline(&line, &r);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, pts(&[(0.0, 5.0), (10.0, 5.0)]));
    }

    #[test]
    fn test_polyline_multiple_chains() {
        // In, out, and back in: two chains.
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let line = Polyline(pts(&[
            (1.0, 5.0),
            (15.0, 5.0),
            (15.0, 8.0),
            (1.0, 8.0),
        ]));
        let out = clip_polyline(&line, &r);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, pts(&[(1.0, 5.0), (10.0, 5.0)]));
        assert_eq!(out[1].0, pts(&[(10.0, 8.0), (1.0, 8.0)]));
    }

    #[test]
    fn test_clip_containment_property() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let line = Polyline(pts(&[
            (-3.0, -3.0),
            (5.0, 12.0),
            (12.0, 5.0),
            (5.0, -4.0),
            (-1.0, 5.0),
        ]));
        for chain in clip_polyline(&line, &r) {
            for pt in chain.0 {
                assert!(
                    pt.x >= -1e-9 && pt.x <= 10.0 + 1e-9 && pt.y >= -1e-9 && pt.y <= 10.0 + 1e-9,
                    "vertex {:?} escaped the clip rectangle",
                    pt
                );
            }
        }
    }

    // ========== Polygon Clipping ==========

    #[test]
    fn test_polygon_partial_overlap() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let poly = Polygon::new(vec![Ring(pts(&[
            (-5.0, -5.0),
            (5.0, -5.0),
            (5.0, 5.0),
            (-5.0, 5.0),
        ]))]);
        let out = clip_polygon(&poly, &r).expect("overlapping polygon survives");
        let shell = out.shell().unwrap();
        assert_eq!(shell.len(), 4);
        for pt in &shell.0 {
            assert!(pt.x >= 0.0 && pt.x <= 10.0 && pt.y >= 0.0 && pt.y <= 10.0);
        }
        assert_eq!(shell.area(), 25.0);
    }

    #[test]
    fn test_polygon_outside_dropped() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let poly = Polygon::new(vec![Ring(pts(&[
            (20.0, 20.0),
            (30.0, 20.0),
            (30.0, 30.0),
            (20.0, 30.0),
        ]))]);
        assert!(clip_polygon(&poly, &r).is_none());
    }

    #[test]
    fn test_polygon_fully_inside_untouched() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let poly = Polygon::new(vec![Ring(pts(&[(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0)]))]);
        let out = clip_polygon(&poly, &r).unwrap();
        assert_eq!(out.shell().unwrap().area(), 36.0);
    }

    #[test]
    fn test_hole_survives_half_clip() {
        // Shell 100x100 with a centered 20x20 hole, clipped to the right half.
        let r = rect(50.0, 0.0, 100.0, 100.0);
        let poly = Polygon::new(vec![
            Ring(pts(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)])),
            Ring(pts(&[(40.0, 40.0), (60.0, 40.0), (60.0, 60.0), (40.0, 60.0)])),
        ]);
        let out = clip_polygon(&poly, &r).expect("clip keeps the right half");
        assert_eq!(out.rings.len(), 2);

        let mut shell = out.rings[0].clone();
        shell.normalize();
        assert_eq!(
            shell.0,
            pts(&[(50.0, 0.0), (100.0, 0.0), (100.0, 100.0), (50.0, 100.0)])
        );

        let mut hole = out.rings[1].clone();
        hole.normalize();
        assert_eq!(
            hole.0,
            pts(&[(50.0, 40.0), (60.0, 40.0), (60.0, 60.0), (50.0, 60.0)])
        );
    }

    #[test]
    fn test_hole_outside_clip_dropped() {
        let r = rect(0.0, 0.0, 30.0, 100.0);
        let poly = Polygon::new(vec![
            Ring(pts(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)])),
            Ring(pts(&[(40.0, 40.0), (60.0, 40.0), (60.0, 60.0), (40.0, 60.0)])),
        ]);
        let out = clip_polygon(&poly, &r).unwrap();
        assert_eq!(out.rings.len(), 1, "hole outside the clip must vanish");
    }

    #[test]
    fn test_shell_clipped_away_drops_polygon() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        // Degenerate sliver fully right of the rect.
        let poly = Polygon::new(vec![Ring(pts(&[(11.0, 0.0), (12.0, 0.0), (12.0, 1.0)]))]);
        assert!(clip_polygon(&poly, &r).is_none());
    }

    #[test]
    fn test_ring_normalized_after_clip() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let poly = Polygon::new(vec![Ring(pts(&[
            (5.0, -5.0),
            (15.0, 5.0),
            (5.0, 15.0),
            (-5.0, 5.0),
        ]))]);
        let out = clip_polygon(&poly, &r).unwrap();
        let shell = &out.rings[0];
        let smallest = shell
            .0
            .iter()
            .copied()
            .min_by(|a, b| xy_order(*a, *b))
            .unwrap();
        assert_eq!(shell.0[0], smallest);
    }

    // ========== Geometry Dispatch ==========

    #[test]
    fn test_clip_geometry_point() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        assert!(clip_geometry(&Geometry::point(5.0, 5.0), &r).is_some());
        assert!(clip_geometry(&Geometry::point(15.0, 5.0), &r).is_none());
    }

    #[test]
    fn test_clip_geometry_multipoint_filters() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let g = Geometry::MultiPoint(pts(&[(5.0, 5.0), (50.0, 5.0)]));
        match clip_geometry(&g, &r) {
            Some(Geometry::MultiPoint(kept)) => assert_eq!(kept, pts(&[(5.0, 5.0)])),
            other => panic!("expected multipoint, got {:?}", other),
        }
    }

    #[test]
    fn test_clip_geometry_line_splits_to_multi() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let g = Geometry::LineString(Polyline(pts(&[
            (1.0, 2.0),
            (15.0, 2.0),
            (15.0, 8.0),
            (1.0, 8.0),
        ])));
        assert!(matches!(
            clip_geometry(&g, &r),
            Some(Geometry::MultiLineString(_))
        ));
    }
}
