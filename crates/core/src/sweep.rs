//! Line-sweep segment intersection.
//!
//! Every segment contributes its lexicographically smaller endpoint as a LEFT
//! event and the other as a RIGHT event; the queue is sorted by `(x, y)`.
//! While sweeping, the set of segments whose LEFT has been seen but not their
//! RIGHT is *active*; when a segment closes it is tested against the active
//! set. `O((N + K) log N)` for K reported pairs, degrading to `O(N²)` when
//! all segments overlap in x; fine for the per-tile segment counts this
//! core sees.
//!
//! The pair test is the sign-of-cross-products formulation and performs no
//! division, so it is exact on integer inputs.

use crate::geom::{xy_order, Point2};

/// A line segment.
pub type Segment = [Point2; 2];

pub fn segment(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
    [Point2::new(x1, y1), Point2::new(x2, y2)]
}

/// Endpoints reordered so the lexicographically smaller one comes first.
pub fn left_right(s: Segment) -> Segment {
    if xy_order(s[0], s[1]) == std::cmp::Ordering::Greater {
        [s[1], s[0]]
    } else {
        s
    }
}

/// Closed-interval bounding box test.
pub fn in_between(s: Segment, pt: Point2) -> bool {
    let (lx, gx) = if s[0].x <= s[1].x {
        (s[0].x, s[1].x)
    } else {
        (s[1].x, s[0].x)
    };
    let (ly, gy) = if s[0].y <= s[1].y {
        (s[0].y, s[1].y)
    } else {
        (s[1].y, s[0].y)
    };
    lx <= pt.x && pt.x <= gx && ly <= pt.y && pt.y <= gy
}

/// `(m, b, defined)`: slope and intercept of the segment's carrier line.
/// `defined` is false for vertical segments; horizontal segments report
/// slope zero.
pub fn slope_intercept(s: Segment) -> (f64, f64, bool) {
    let dx = s[1].x - s[0].x;
    let dy = s[1].y - s[0].y;
    if dx == 0.0 || dy == 0.0 {
        return (0.0, s[0].y, dx != 0.0);
    }
    let m = dy / dx;
    let b = s[0].y - m * s[0].x;
    (m, b, true)
}

/// True when the closed segments share at least one point (touching and
/// collinear overlap both count).
pub fn does_intersect(s1: Segment, s2: Segment) -> bool {
    let s1 = left_right(s1);
    let s2 = left_right(s2);

    let d1 = |p: Point2| (s1[1].x - s1[0].x) * (p.y - s1[0].y) - (s1[1].y - s1[0].y) * (p.x - s1[0].x);
    let d2 = |p: Point2| (s2[1].x - s2[0].x) * (p.y - s2[0].y) - (s2[1].y - s2[0].y) * (p.x - s2[0].x);

    let s1_separates = d1(s2[0]) * d1(s2[1]) > 0.0;
    let s2_separates = d2(s1[0]) * d2(s1[1]) > 0.0;
    !(s1_separates || s2_separates)
}

/// Strict variant used by the triangulator: endpoint touches do not count,
/// but anything the sign test cannot separate (including collinear overlap)
/// does, so an undecidable chord is treated as crossing and rejected.
pub fn properly_crosses(s1: Segment, s2: Segment) -> bool {
    for a in s1 {
        for b in s2 {
            if a == b {
                return false;
            }
        }
    }
    does_intersect(s1, s2)
}

/// Intersection point of the carrier lines, by slope-intercept with explicit
/// vertical/horizontal handling. Parallel carriers return `None`. The caller
/// is responsible for segment-interval checks when it needs them.
pub fn line_intersection(l1: Segment, l2: Segment) -> Option<Point2> {
    let l1_vertical = l1[0].x == l1[1].x;
    let l2_vertical = l2[0].x == l2[1].x;
    if l1_vertical {
        if l2_vertical {
            return None;
        }
        if l1[0].x == l2[0].x {
            return Some(Point2::new(l1[0].x, l2[0].y));
        }
        if l1[0].x == l2[1].x {
            return Some(Point2::new(l1[0].x, l2[1].y));
        }
    }
    let l1_horizontal = l1[0].y == l1[1].y;
    let l2_horizontal = l2[0].y == l2[1].y;
    if l1_horizontal {
        if l2_horizontal {
            return None;
        }
        if l1[0].y == l2[0].y {
            return Some(Point2::new(l2[0].x, l1[0].y));
        }
        if l1[0].y == l2[1].y {
            return Some(Point2::new(l2[1].x, l1[0].y));
        }
    }

    let (m1, b1, def1) = slope_intercept(l1);
    let (m2, b2, def2) = slope_intercept(l2);
    if def1 == def2 && m1 == m2 {
        return None;
    }
    if !def1 {
        let x = l1[0].x;
        if m2 == 0.0 {
            return Some(Point2::new(x, b2));
        }
        return Some(Point2::new(x, m2 * x + b2));
    }
    if !def2 {
        let x = l2[0].x;
        if m1 == 0.0 {
            return Some(Point2::new(x, b1));
        }
        return Some(Point2::new(x, m1 * x + b1));
    }
    if m1 == 0.0 {
        let y = l1[0].y;
        return Some(Point2::new((y - b2) / m2, y));
    }
    if m2 == 0.0 {
        let y = l2[0].y;
        return Some(Point2::new((y - b1) / m1, y));
    }
    let x = (b2 - b1) / (m1 - m2);
    Some(Point2::new(x, m1 * x + b1))
}

#[derive(Clone, Copy)]
struct Event {
    edge: usize,
    pt: Point2,
}

fn event_queue(segments: &[Segment]) -> Vec<Event> {
    let mut eq = Vec::with_capacity(segments.len() * 2);
    for (i, s) in segments.iter().enumerate() {
        eq.push(Event { edge: i, pt: s[0] });
        eq.push(Event { edge: i, pt: s[1] });
    }
    eq.sort_by(|a, b| xy_order(a.pt, b.pt));
    eq
}

/// Enumerate intersecting pairs `(i, j)` with `i < j`, handing the callback a
/// thunk that computes the intersection point on demand. The callback returns
/// `false` to stop the sweep early.
pub fn find_intersects<F>(segments: &[Segment], mut f: F)
where
    F: FnMut(usize, usize, &dyn Fn() -> Point2) -> bool,
{
    let eq = event_queue(segments);
    let mut open = vec![false; segments.len()];

    for ev in eq {
        if !open[ev.edge] {
            open[ev.edge] = true;
            continue;
        }
        open[ev.edge] = false;

        let edge = segments[ev.edge];
        for s in 0..segments.len() {
            if !open[s] || s == ev.edge {
                continue;
            }
            if !does_intersect(edge, segments[s]) {
                continue;
            }
            let (src, dst) = if ev.edge < s { (ev.edge, s) } else { (s, ev.edge) };
            let other = segments[s];
            let thunk = move || line_intersection(edge, other).unwrap_or(edge[0]);
            if !f(src, dst, &thunk) {
                return;
            }
        }
    }
}

/// Pair enumeration without intersection points, for overlap decisions.
pub fn find_intersects_without_point<F>(segments: &[Segment], mut f: F)
where
    F: FnMut(usize, usize) -> bool,
{
    find_intersects(segments, |i, j, _| f(i, j));
}

/// Enumerate *proper* crossings, skipping endpoint-sharing pairs and any pair
/// the caller's `skip` predicate rejects. Used by the triangulator, where a
/// chord must be discarded the moment it crosses a physical edge.
pub fn find_crossings<S, F>(segments: &[Segment], mut skip: S, mut f: F)
where
    S: FnMut(usize, usize) -> bool,
    F: FnMut(usize, usize),
{
    let eq = event_queue(segments);
    let mut open = vec![false; segments.len()];

    for ev in eq {
        if !open[ev.edge] {
            open[ev.edge] = true;
            continue;
        }
        open[ev.edge] = false;

        for s in 0..segments.len() {
            if !open[s] || s == ev.edge {
                continue;
            }
            if skip(ev.edge, s) {
                continue;
            }
            if properly_crosses(segments[ev.edge], segments[s]) {
                f(ev.edge, s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_does_intersect_crossing() {
        assert!(does_intersect(
            segment(0.0, 0.0, 10.0, 10.0),
            segment(0.0, 10.0, 10.0, 0.0)
        ));
    }

    #[test]
    fn test_does_intersect_disjoint() {
        assert!(!does_intersect(
            segment(0.0, 0.0, 1.0, 1.0),
            segment(2.0, 0.0, 3.0, 1.0)
        ));
    }

    #[test]
    fn test_does_intersect_touching_endpoint() {
        assert!(does_intersect(
            segment(0.0, 0.0, 5.0, 5.0),
            segment(5.0, 5.0, 10.0, 0.0)
        ));
    }

    #[test]
    fn test_properly_crosses_skips_shared_endpoint() {
        assert!(!properly_crosses(
            segment(0.0, 0.0, 5.0, 5.0),
            segment(5.0, 5.0, 10.0, 0.0)
        ));
        assert!(properly_crosses(
            segment(0.0, 0.0, 10.0, 10.0),
            segment(0.0, 10.0, 10.0, 0.0)
        ));
    }

    #[test]
    fn test_properly_crosses_collinear_overlap() {
        // Undecidable by the sign test; must count as a crossing.
        assert!(properly_crosses(
            segment(0.0, 0.0, 10.0, 0.0),
            segment(2.0, 0.0, 8.0, 0.0)
        ));
    }

    #[test]
    fn test_line_intersection_diagonals() {
        let pt = line_intersection(
            segment(0.0, 0.0, 10.0, 10.0),
            segment(0.0, 10.0, 10.0, 0.0),
        )
        .unwrap();
        assert_eq!(pt, Point2::new(5.0, 5.0));
    }

    #[test]
    fn test_line_intersection_vertical_horizontal() {
        let pt = line_intersection(segment(5.0, -10.0, 5.0, 10.0), segment(0.0, 3.0, 10.0, 3.0))
            .unwrap();
        assert_eq!(pt, Point2::new(5.0, 3.0));
    }

    #[test]
    fn test_line_intersection_parallel() {
        assert!(line_intersection(segment(0.0, 0.0, 10.0, 10.0), segment(0.0, 1.0, 10.0, 11.0))
            .is_none());
        assert!(line_intersection(segment(0.0, 0.0, 0.0, 10.0), segment(5.0, 0.0, 5.0, 10.0))
            .is_none());
    }

    #[test]
    fn test_find_intersects_reports_crossing_pair() {
        let segs = vec![
            segment(0.0, 0.0, 10.0, 10.0),
            segment(0.0, 10.0, 10.0, 0.0),
            segment(20.0, 0.0, 30.0, 0.0),
        ];
        let mut hits = Vec::new();
        find_intersects(&segs, |i, j, ptfn| {
            hits.push((i, j, ptfn()));
            true
        });
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].0, hits[0].1), (0, 1));
        assert_eq!(hits[0].2, Point2::new(5.0, 5.0));
    }

    #[test]
    fn test_find_intersects_early_termination() {
        // A fan of segments all crossing a long horizontal line.
        let mut segs = vec![segment(-100.0, 5.0, 100.0, 5.0)];
        for i in 0..10 {
            let x = i as f64 * 10.0;
            segs.push(segment(x, 0.0, x + 1.0, 10.0));
        }
        let mut count = 0;
        find_intersects_without_point(&segs, |_, _| {
            count += 1;
            count < 3
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn test_find_crossings_applies_skip() {
        let segs = vec![
            segment(0.0, 0.0, 10.0, 10.0),
            segment(0.0, 10.0, 10.0, 0.0),
        ];
        let mut hit = false;
        find_crossings(&segs, |_, _| true, |_, _| hit = true);
        assert!(!hit);
        find_crossings(&segs, |_, _| false, |_, _| hit = true);
        assert!(hit);
    }

    #[test]
    fn test_slope_intercept() {
        let (m, b, def) = slope_intercept(segment(0.0, 1.0, 2.0, 5.0));
        assert!(def);
        assert_eq!(m, 2.0);
        assert_eq!(b, 1.0);

        let (_, _, def) = slope_intercept(segment(3.0, 0.0, 3.0, 9.0));
        assert!(!def);

        let (m, b, def) = slope_intercept(segment(0.0, 4.0, 9.0, 4.0));
        assert!(def);
        assert_eq!(m, 0.0);
        assert_eq!(b, 4.0);
    }
}
