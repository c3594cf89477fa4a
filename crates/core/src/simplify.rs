//! Zoom-based geometry simplification (Ramer-Douglas-Peucker).
//!
//! The tolerance is the tile's per-zoom epsilon (`Tile::z_epsilon`); the
//! recursion compares *squared* perpendicular distances against the squared
//! tolerance, so no square roots are taken on the hot path. Simplification
//! runs only below the configured maximum zoom; at or above it the geometry
//! passes through untouched (the scheduler enforces that switch).

use crate::geom::{Geometry, MultiPolygon, Point2, Polygon, Polyline, Ring};
use crate::sweep::{slope_intercept, Segment};

/// Squared perpendicular distance from `pt` to the carrier line of `chord`.
fn perp_dist_sq(chord: Segment, pt: Point2) -> f64 {
    let dx = chord[1].x - chord[0].x;
    let dy = chord[1].y - chord[0].y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        let ex = pt.x - chord[0].x;
        let ey = pt.y - chord[0].y;
        return ex * ex + ey * ey;
    }
    let cross = dy * pt.x - dx * pt.y + chord[1].x * chord[0].y - chord[1].y * chord[0].x;
    (cross * cross) / len_sq
}

/// Douglas-Peucker over an open point sequence with squared tolerance.
/// The first and last points always survive.
pub fn douglas_peucker(points: &[Point2], sq_tolerance: f64) -> Vec<Point2> {
    if sq_tolerance <= 0.0 || points.len() <= 2 {
        return points.to_vec();
    }

    let chord = [points[0], points[points.len() - 1]];
    let mut dmax = 0.0;
    let mut idx = 0;
    for (i, pt) in points.iter().enumerate().take(points.len() - 1).skip(1) {
        let d = perp_dist_sq(chord, *pt);
        if d > dmax {
            dmax = d;
            idx = i;
        }
    }

    if dmax > sq_tolerance {
        let mut left = douglas_peucker(&points[..=idx], sq_tolerance);
        let right = douglas_peucker(&points[idx..], sq_tolerance);
        // The split point appears in both halves; keep it once.
        left.extend_from_slice(&right[1..]);
        left
    } else {
        vec![points[0], points[points.len() - 1]]
    }
}

/// Drop interior vertices that sit on the line through their neighbours,
/// comparing slope/definedness the way ring clean-up does everywhere else in
/// the pipeline. Treats the sequence as a ring (wraps at the end).
fn drop_collinear(pts: &[Point2]) -> Vec<Point2> {
    if pts.len() <= 4 {
        return pts.to_vec();
    }
    let mut out = vec![pts[0]];
    let mut anchor = 0;
    for i in 1..pts.len() {
        let next = if i + 1 >= pts.len() { 0 } else { i + 1 };
        let (m1, _, def1) = slope_intercept([pts[anchor], pts[i]]);
        let (m2, _, def2) = slope_intercept([pts[anchor], pts[next]]);
        if m1 != m2 || def1 != def2 {
            out.push(pts[i]);
            anchor = i;
        }
    }
    out
}

fn simplify_polyline(line: &Polyline, tolerance: f64) -> Option<Polyline> {
    // Short or sub-tolerance lines are not worth touching.
    if line.len() <= 4 || line.manhattan_length() < tolerance {
        return Some(line.clone());
    }
    let pts = douglas_peucker(&line.0, tolerance * tolerance);
    if pts.len() < 2 {
        return None;
    }
    Some(Polyline(pts))
}

/// `None` means the ring degenerated; the caller decides whether that kills
/// just the hole or the whole polygon.
fn simplify_ring(ring: &Ring, sq_tolerance: f64) -> Option<Ring> {
    if ring.len() < 3 {
        return None;
    }
    let pts = drop_collinear(&ring.0);
    if pts.len() <= 4 {
        return Some(Ring(pts));
    }
    let pts = douglas_peucker(&pts, sq_tolerance);
    if pts.len() < 3 {
        return None;
    }
    Some(Ring(pts))
}

fn simplify_polygon(poly: &Polygon, tolerance: f64) -> Option<Polygon> {
    if poly.rings.is_empty() {
        return None;
    }
    let sq_tolerance = tolerance * tolerance;

    // A shell already smaller than the tolerance square will not gain
    // anything from simplification.
    if poly.area() < sq_tolerance {
        return Some(poly.clone());
    }

    let mut rings = Vec::with_capacity(poly.rings.len());
    for (i, ring) in poly.rings.iter().enumerate() {
        match simplify_ring(ring, sq_tolerance) {
            Some(r) => rings.push(r),
            None if i == 0 => return None,
            None => continue,
        }
    }
    Some(Polygon::new(rings))
}

/// Simplify at tolerance `epsilon`; points pass through, degenerate results
/// collapse to `None`.
pub fn simplify_geometry(geom: &Geometry, epsilon: f64) -> Option<Geometry> {
    if epsilon <= 0.0 {
        return Some(geom.clone());
    }
    match geom {
        Geometry::Point { .. } | Geometry::MultiPoint(_) => Some(geom.clone()),
        Geometry::LineString(ln) => simplify_polyline(ln, epsilon).map(Geometry::LineString),
        Geometry::MultiLineString(lns) => {
            let out: Vec<Polyline> = lns
                .iter()
                .filter_map(|ln| simplify_polyline(ln, epsilon))
                .collect();
            if out.is_empty() {
                None
            } else {
                Some(Geometry::MultiLineString(out))
            }
        }
        Geometry::Polygon(p) => simplify_polygon(p, epsilon).map(Geometry::Polygon),
        Geometry::MultiPolygon(mp) => {
            let out: Vec<Polygon> = mp
                .0
                .iter()
                .filter_map(|p| simplify_polygon(p, epsilon))
                .collect();
            if out.is_empty() {
                None
            } else {
                Some(Geometry::MultiPolygon(MultiPolygon(out)))
            }
        }
        Geometry::Collection(gs) => {
            let out: Vec<Geometry> = gs
                .iter()
                .filter_map(|g| simplify_geometry(g, epsilon))
                .collect();
            if out.is_empty() {
                None
            } else {
                Some(Geometry::Collection(out))
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

    #[test]
    fn test_straight_line_collapses_to_endpoints() {
        let line = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)]);
        let out = douglas_peucker(&line, 0.1 * 0.1);
        assert_eq!(out, pts(&[(0.0, 0.0), (4.0, 4.0)]));
    }

    #[test]
    fn test_spike_survives_tolerance() {
        let line = pts(&[(0.0, 0.0), (5.0, 8.0), (10.0, 0.0)]);
        let out = douglas_peucker(&line, 1.0);
        assert_eq!(out, line);
    }

    #[test]
    fn test_penultimate_point_considered() {
        // A deviation on the second-to-last point must be kept; a buggy loop
        // bound would silently drop it.
        let line = pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 5.0), (4.0, 0.0)]);
        let out = douglas_peucker(&line, 0.01);
        assert!(
            out.contains(&Point2::new(3.0, 5.0)),
            "penultimate deviation dropped: {:?}",
            out
        );
    }

    #[test]
    fn test_zero_tolerance_passthrough() {
        let line = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(douglas_peucker(&line, 0.0), line);
    }

    #[test]
    fn test_idempotence() {
        let line = pts(&[
            (0.0, 0.0),
            (1.0, 0.2),
            (2.0, -0.1),
            (3.0, 4.0),
            (4.0, 4.2),
            (5.0, 0.0),
            (6.0, 0.3),
            (7.0, 0.0),
        ]);
        let once = douglas_peucker(&line, 0.25);
        let twice = douglas_peucker(&once, 0.25);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_output_is_subsequence() {
        let line = pts(&[
            (0.0, 0.0),
            (1.0, 1.5),
            (2.0, -0.5),
            (3.0, 0.2),
            (4.0, 0.0),
        ]);
        let out = douglas_peucker(&line, 1.0);
        let mut cursor = 0;
        for pt in &out {
            let pos = line[cursor..].iter().position(|p| p == pt);
            assert!(pos.is_some(), "{:?} not in order in input", pt);
            cursor += pos.unwrap();
        }
        assert_eq!(out.first(), line.first());
        assert_eq!(out.last(), line.last());
    }

    #[test]
    fn test_simplify_geometry_points_unchanged() {
        let g = Geometry::point(3.0, 4.0);
        assert_eq!(simplify_geometry(&g, 10.0), Some(g));
    }

    #[test]
    fn test_simplify_short_polyline_unchanged() {
        let g = Geometry::LineString(Polyline(pts(&[(0.0, 0.0), (0.5, 0.1), (1.0, 0.0)])));
        assert_eq!(simplify_geometry(&g, 5.0), Some(g.clone()));
    }

    #[test]
    fn test_simplify_polygon_reduces_noisy_ring() {
        // A square with jitter along the bottom edge.
        let ring = Ring(pts(&[
            (0.0, 0.0),
            (25.0, 0.4),
            (50.0, -0.3),
            (75.0, 0.2),
            (100.0, 0.0),
            (100.0, 100.0),
            (0.0, 100.0),
        ]));
        let g = Geometry::Polygon(Polygon::new(vec![ring]));
        match simplify_geometry(&g, 2.0) {
            Some(Geometry::Polygon(p)) => {
                assert!(p.rings[0].len() < 7, "jitter not removed: {:?}", p.rings[0]);
                assert!(p.rings[0].len() >= 3);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_simplify_tiny_polygon_passthrough() {
        let ring = Ring(pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]));
        let g = Geometry::Polygon(Polygon::new(vec![ring]));
        // Shell area 1 < tolerance² = 100: untouched.
        assert_eq!(simplify_geometry(&g, 10.0), Some(g.clone()));
    }

    #[test]
    fn test_drop_collinear_ring_vertices() {
        let ring = pts(&[
            (0.0, 0.0),
            (5.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ]);
        let out = drop_collinear(&ring);
        assert!(!out.contains(&Point2::new(5.0, 0.0)), "collinear vertex kept");
    }
}
