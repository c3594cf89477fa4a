//! Polygon repair by planar subdivision.
//!
//! The input is an arbitrary set of rings (self-touching, self-crossing,
//! mis-wound); the output is a well-formed multi-polygon whose union equals
//! the even-odd interior of the input. Five stages:
//!
//! 1. destructure every ring into a flat set of canonical sub-segments that
//!    meet only at endpoints (splitting at sweep-found intersections),
//! 2. add a bounding box around everything so the outer face is bounded,
//! 3. triangulate: greedily accept chords between unconnected vertices that
//!    cross no physical edge, yielding a maximal constrained planar
//!    subdivision (deterministic, not Delaunay-optimal),
//! 4. label triangles Inside/Outside by flooding from the bbox, flipping the
//!    label across constrained (original boundary) edges,
//! 5. walk the boundary edges of each Inside component back into rings and
//!    nest them into polygons.
//!
//! Triangles live in an arena and reference their neighbors by index; the
//! labelling pass is a worklist loop over those indices.

use std::collections::{HashMap, HashSet};

use crate::geom::{xy_order, Extent, Geometry, MultiPolygon, Point2, PointKey, Polygon, Ring, Winding};
use crate::hitmap::{HitMap, Label};
use crate::sweep::{find_crossings, find_intersects, in_between, left_right, line_intersection, Segment};
use crate::{Error, Result};

/// Margin added around the input when building the stage-2 bounding box.
const BBOX_MARGIN: f64 = 10.0;

/// Scale factor applied around the engine by [`clean_geometry`]; intersection
/// points are quantised to integers, so the factor sets the quantisation to
/// a tenth of a pixel.
const CLEAN_SCALE: f64 = 10.0;

type VertId = u32;

fn seg_key(a: Point2, b: Point2) -> (PointKey, PointKey) {
    (a.key(), b.key())
}

/// Stage 1: canonical deduplicated sub-segments from a set of rings.
fn destructure(rings: &[Vec<Point2>]) -> Vec<Segment> {
    // Collect each ring's edges, including the implicit closing edge, in
    // canonical left-right order; duplicates collapse.
    let mut seen: HashSet<(PointKey, PointKey)> = HashSet::new();
    let mut segments: Vec<Segment> = Vec::new();
    for ring in rings {
        if ring.len() < 2 {
            continue;
        }
        let mut prev = ring[ring.len() - 1];
        for &pt in ring {
            if prev != pt {
                let seg = left_right([prev, pt]);
                if seen.insert(seg_key(seg[0], seg[1])) {
                    segments.push(seg);
                }
            }
            prev = pt;
        }
    }
    if segments.len() <= 1 {
        return segments;
    }
    sort_segments(&mut segments);

    // Record every intersection against both participants, quantised to
    // integers so later stages can use exact equality. Collinear overlap has
    // no single intersection point; there each segment splits at the other's
    // interior endpoints instead.
    let mut split_pts: Vec<Vec<Point2>> = vec![Vec::new(); segments.len()];
    find_intersects(&segments, |src, dst, _ptfn| {
        let s = segments[src];
        let d = segments[dst];
        match line_intersection(s, d) {
            Some(pt) => {
                let pt = pt.truncate();
                if pt != s[0] && pt != s[1] {
                    split_pts[src].push(pt);
                }
                if pt != d[0] && pt != d[1] {
                    split_pts[dst].push(pt);
                }
            }
            None => {
                for pt in [d[0], d[1]] {
                    if in_between(s, pt) && pt != s[0] && pt != s[1] {
                        split_pts[src].push(pt);
                    }
                }
                for pt in [s[0], s[1]] {
                    if in_between(d, pt) && pt != d[0] && pt != d[1] {
                        split_pts[dst].push(pt);
                    }
                }
            }
        }
        true
    });

    let mut out: Vec<Segment> = Vec::new();
    for (i, seg) in segments.iter().enumerate() {
        if split_pts[i].is_empty() {
            out.push(*seg);
            continue;
        }
        split_pts[i].sort_by(|a, b| xy_order(*a, *b));
        let mut lpt = seg[0];
        for &pt in &split_pts[i] {
            if lpt == pt {
                continue;
            }
            out.push(left_right([lpt, pt]));
            lpt = pt;
        }
        if lpt != seg[1] {
            out.push(left_right([lpt, seg[1]]));
        }
    }
    sort_segments(&mut out);
    out
}

fn sort_segments(segments: &mut [Segment]) {
    segments.sort_by(|a, b| xy_order(a[0], b[0]).then(xy_order(a[1], b[1])));
}

/// The planar subdivision under construction: vertices, adjacency with a
/// constrained flag per edge, and the list of physical segments chords must
/// not cross.
struct PlanarGraph {
    pts: Vec<Point2>,
    ids: HashMap<PointKey, VertId>,
    /// `adj[v][w]` present when v-w is an edge; `true` marks a constrained
    /// (original boundary) edge, which flips the label during flooding.
    adj: Vec<HashMap<VertId, bool>>,
    /// Every physical edge as geometry: boundary, bbox, accepted chords.
    segments: Vec<Segment>,
    /// Vertex ids in lexicographic point order.
    order: Vec<VertId>,
    bbox: [Point2; 4],
}

impl PlanarGraph {
    fn vert(&mut self, pt: Point2) -> VertId {
        if let Some(&id) = self.ids.get(&pt.key()) {
            return id;
        }
        let id = self.pts.len() as VertId;
        self.pts.push(pt);
        self.ids.insert(pt.key(), id);
        self.adj.push(HashMap::new());
        id
    }

    fn add_edge(&mut self, a: Point2, b: Point2, constrained: bool) {
        let va = self.vert(a);
        let vb = self.vert(b);
        if va == vb {
            return;
        }
        // A constrained marking wins over an earlier unconstrained one.
        let ea = self.adj[va as usize].entry(vb).or_insert(false);
        *ea = *ea || constrained;
        let eb = self.adj[vb as usize].entry(va).or_insert(false);
        *eb = *eb || constrained;
    }

    fn connected(&self, a: VertId, b: VertId) -> bool {
        self.adj[a as usize].contains_key(&b)
    }

    fn constrained(&self, a: VertId, b: VertId) -> bool {
        *self.adj[a as usize].get(&b).unwrap_or(&false)
    }

    /// Neighbors of `v` in lexicographic point order.
    fn neighbors(&self, v: VertId) -> Vec<VertId> {
        let mut out: Vec<VertId> = self.adj[v as usize].keys().copied().collect();
        out.sort_by(|a, b| xy_order(self.pts[*a as usize], self.pts[*b as usize]));
        out
    }

    /// Stage 2: build the graph from the destructured boundary plus the
    /// margin bbox.
    fn build(boundary: &[Segment]) -> Self {
        let mut g = PlanarGraph {
            pts: Vec::new(),
            ids: HashMap::new(),
            adj: Vec::new(),
            segments: Vec::new(),
            order: Vec::new(),
            bbox: [Point2::default(); 4],
        };

        let mut ext = Extent::empty();
        for seg in boundary {
            ext.expand_point(seg[0]);
            ext.expand_point(seg[1]);
        }
        let ext = ext.expand(BBOX_MARGIN);
        let bb = [
            Point2::new(ext.min_x, ext.min_y),
            Point2::new(ext.max_x, ext.min_y),
            Point2::new(ext.max_x, ext.max_y),
            Point2::new(ext.min_x, ext.max_y),
        ];
        g.bbox = bb;
        for i in 0..4 {
            let a = bb[i];
            let b = bb[(i + 1) % 4];
            g.add_edge(a, b, false);
            g.segments.push([a, b]);
        }
        for seg in boundary {
            g.add_edge(seg[0], seg[1], true);
            g.segments.push(*seg);
        }

        g.order = (0..g.pts.len() as VertId).collect();
        let pts = &g.pts;
        g.order.sort_by(|a, b| xy_order(pts[*a as usize], pts[*b as usize]));
        g
    }

    /// Stage 3: accept every chord that crosses no physical segment.
    ///
    /// Chords are proposed one source vertex at a time in lexicographic
    /// order; all proposals of a batch share that vertex, so they cannot
    /// cross each other and one sweep per batch settles them all.
    fn triangulate(&mut self) {
        for i in 0..self.order.len().saturating_sub(1) {
            let vi = self.order[i];
            let mut candidates: Vec<(VertId, VertId)> = Vec::new();
            for &vj in &self.order[i + 1..] {
                if !self.connected(vi, vj) {
                    candidates.push((vi, vj));
                }
            }
            if candidates.is_empty() {
                continue;
            }

            let offset = candidates.len();
            let mut lines: Vec<Segment> = candidates
                .iter()
                .map(|&(a, b)| [self.pts[a as usize], self.pts[b as usize]])
                .collect();
            lines.extend_from_slice(&self.segments);

            let mut rejected = vec![false; offset];
            find_crossings(
                &lines,
                |a, b| a >= offset && b >= offset,
                |a, b| {
                    if a < offset && b >= offset {
                        rejected[a] = true;
                    } else if b < offset && a >= offset {
                        rejected[b] = true;
                    }
                },
            );

            for (c, &(a, b)) in candidates.iter().enumerate() {
                if rejected[c] {
                    continue;
                }
                let seg = [self.pts[a as usize], self.pts[b as usize]];
                self.add_edge(seg[0], seg[1], false);
                self.segments.push(seg);
            }
        }
    }

    /// The smallest-area triangle on each side of edge `a-b`, as the third
    /// vertex completing it; `(left, right)` by the sign of the area.
    fn flanking_triangles(&self, a: VertId, b: VertId) -> (Option<VertId>, Option<VertId>) {
        let an = self.neighbors(a);
        let bn = self.neighbors(b);
        let pa = self.pts[a as usize];
        let pb = self.pts[b as usize];

        let mut left: Option<(f64, VertId)> = None;
        let mut right: Option<(f64, VertId)> = None;
        for &v in &an {
            if v == b || !bn.contains(&v) {
                continue;
            }
            let pv = self.pts[v as usize];
            let area = (pa.x * (pb.y - pv.y) + pb.x * (pv.y - pa.y) + pv.x * (pa.y - pb.y)) / 2.0;
            if area > 0.0 && right.map_or(true, |(ra, _)| area < ra) {
                right = Some((area, v));
            } else if area < 0.0 && left.map_or(true, |(la, _)| area > la) {
                left = Some((area, v));
            }
        }
        (left.map(|(_, v)| v), right.map(|(_, v)| v))
    }
}

/// A triangle in the arena: vertices in lexicographic order, one neighbor
/// slot per edge (`0: v0-v1, 1: v1-v2, 2: v0-v2`), and its flood label.
#[derive(Debug, Clone)]
struct TriNode {
    v: [VertId; 3],
    nbr: [Option<u32>; 3],
    constrained: [bool; 3],
    label: Option<Label>,
}

impl TriNode {
    fn edge_slot(&self, a: VertId, b: VertId) -> Option<usize> {
        let pos = |x: VertId| self.v.iter().position(|&v| v == x);
        match (pos(a)?, pos(b)?) {
            (0, 1) | (1, 0) => Some(0),
            (1, 2) | (2, 1) => Some(1),
            (0, 2) | (2, 0) => Some(2),
            _ => None,
        }
    }

    fn edge_verts(&self, slot: usize) -> (VertId, VertId) {
        match slot {
            0 => (self.v[0], self.v[1]),
            1 => (self.v[1], self.v[2]),
            _ => (self.v[0], self.v[2]),
        }
    }
}

struct TriangleArena {
    tris: Vec<TriNode>,
    ids: HashMap<[VertId; 3], u32>,
}

impl TriangleArena {
    fn get_or_insert(&mut self, graph: &PlanarGraph, a: VertId, b: VertId, c: VertId) -> u32 {
        let mut key = [a, b, c];
        key.sort_by(|x, y| xy_order(graph.pts[*x as usize], graph.pts[*y as usize]));
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.tris.len() as u32;
        self.tris.push(TriNode {
            v: key,
            nbr: [None; 3],
            constrained: [false; 3],
            label: None,
        });
        self.ids.insert(key, id);
        id
    }
}

/// Stage 4 driver: enumerate triangles edge by edge, wire adjacency, then
/// flood labels outward from the bbox.
fn find_triangles(graph: &PlanarGraph) -> Result<TriangleArena> {
    let mut arena = TriangleArena {
        tris: Vec::new(),
        ids: HashMap::new(),
    };
    let mut frontier: Vec<u32> = Vec::new();
    let mut seen = vec![false; graph.pts.len()];

    let bbox_ids: Vec<VertId> = graph
        .bbox
        .iter()
        .filter_map(|pt| graph.ids.get(&pt.key()).copied())
        .collect();

    for &vi in &graph.order {
        seen[vi as usize] = true;
        for vj in graph.neighbors(vi) {
            if seen[vj as usize] {
                continue;
            }
            let (left, right) = graph.flanking_triangles(vi, vj);
            if left.is_none() && right.is_none() {
                continue;
            }
            let constrained = graph.constrained(vi, vj);

            let tl = left.map(|v| arena.get_or_insert(graph, vi, vj, v));
            let tr = right.map(|v| arena.get_or_insert(graph, vi, vj, v));

            if let (Some(tl), Some(tr)) = (tl, tr) {
                link(&mut arena, graph, tl, tr, vi, vj, constrained)?;
            }
            if bbox_ids.contains(&vi) || bbox_ids.contains(&vj) {
                frontier.extend(tl);
                frontier.extend(tr);
            }
        }
    }

    // Flood: unconstrained edges carry the label, constrained edges flip it
    // on the next round.
    let mut current = Label::Outside;
    while !frontier.is_empty() {
        let mut flipped: Vec<u32> = Vec::new();
        let mut stack = frontier;
        while let Some(t) = stack.pop() {
            let node = &mut arena.tris[t as usize];
            if node.label.is_some() {
                continue;
            }
            node.label = Some(current);
            let nbr = node.nbr;
            let con = node.constrained;
            for slot in 0..3 {
                if let Some(n) = nbr[slot] {
                    if con[slot] {
                        flipped.push(n);
                    } else {
                        stack.push(n);
                    }
                }
            }
        }
        frontier = flipped;
        current = match current {
            Label::Outside => Label::Inside,
            Label::Inside => Label::Outside,
        };
    }
    Ok(arena)
}

fn link(
    arena: &mut TriangleArena,
    graph: &PlanarGraph,
    tl: u32,
    tr: u32,
    a: VertId,
    b: VertId,
    constrained: bool,
) -> Result<()> {
    for (t, other) in [(tl, tr), (tr, tl)] {
        let node = &mut arena.tris[t as usize];
        let slot = match node.edge_slot(a, b) {
            Some(slot) => slot,
            None => {
                let pt = graph.pts[a as usize];
                return Err(Error::NonManifoldVertex { x: pt.x, y: pt.y });
            }
        };
        if let Some(existing) = node.nbr[slot] {
            if existing != other {
                let pt = graph.pts[a as usize];
                return Err(Error::NonManifoldVertex { x: pt.x, y: pt.y });
            }
        }
        node.nbr[slot] = Some(other);
        node.constrained[slot] = constrained;
    }
    Ok(())
}

/// Stage 5: boundary edges of each Inside component, chained into rings.
fn component_rings(arena: &TriangleArena, graph: &PlanarGraph) -> Vec<Vec<Segment>> {
    let mut out = Vec::new();
    let mut seen = vec![false; arena.tris.len()];
    for start in 0..arena.tris.len() {
        if seen[start] || arena.tris[start].label != Some(Label::Inside) {
            continue;
        }
        let mut boundary: Vec<Segment> = Vec::new();
        let mut stack = vec![start as u32];
        while let Some(t) = stack.pop() {
            if seen[t as usize] {
                continue;
            }
            seen[t as usize] = true;
            let node = &arena.tris[t as usize];
            for slot in 0..3 {
                match node.nbr[slot] {
                    Some(n) if arena.tris[n as usize].label == node.label => stack.push(n),
                    _ => {
                        let (a, b) = node.edge_verts(slot);
                        boundary.push([graph.pts[a as usize], graph.pts[b as usize]]);
                    }
                }
            }
        }
        if !boundary.is_empty() {
            out.push(boundary);
        }
    }
    out
}

/// Chain a bag of boundary edges into closed rings.
fn construct_rings(mut lines: Vec<Segment>) -> Vec<Ring> {
    if lines.is_empty() {
        return Vec::new();
    }
    sort_segments(&mut lines);

    let mut chains: Vec<Vec<Point2>> = vec![vec![lines[0][0], lines[0][1]]];
    let mut closed: Vec<bool> = vec![false];

    'next_line: for line in &lines[1..] {
        for (i, chain) in chains.iter_mut().enumerate() {
            if closed[i] {
                continue;
            }
            let head = chain[0];
            let tail = chain[chain.len() - 1];
            if line[0] == head {
                if tail == line[1] {
                    closed[i] = true;
                } else {
                    chain.insert(0, line[1]);
                }
                continue 'next_line;
            }
            if line[1] == head {
                if tail == line[0] {
                    closed[i] = true;
                } else {
                    chain.insert(0, line[0]);
                }
                continue 'next_line;
            }
            if line[0] == tail {
                if head == line[1] {
                    closed[i] = true;
                } else {
                    chain.push(line[1]);
                }
                continue 'next_line;
            }
            if line[1] == tail {
                if head == line[0] {
                    closed[i] = true;
                } else {
                    chain.push(line[0]);
                }
                continue 'next_line;
            }
        }
        chains.push(vec![line[0], line[1]]);
        closed.push(false);
    }

    let mut rings = Vec::new();
    for chain in chains {
        let ring = Ring(drop_collinear_ring(chain));
        if ring.len() >= 3 {
            rings.push(ring);
        }
    }
    // Largest first: the shell leads, holes follow.
    rings.sort_by(|a, b| {
        b.area()
            .partial_cmp(&a.area())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rings
}

/// Three consecutive collinear vertices collapse to two, wrapping around the
/// ring.
fn drop_collinear_ring(pts: Vec<Point2>) -> Vec<Point2> {
    if pts.len() < 3 {
        return pts;
    }
    let mut out: Vec<Point2> = Vec::with_capacity(pts.len());
    let n = pts.len();
    for i in 0..n {
        let prev = pts[(i + n - 1) % n];
        let cur = pts[i];
        let next = pts[(i + 1) % n];
        let cross = (cur.x - prev.x) * (next.y - prev.y) - (cur.y - prev.y) * (next.x - prev.x);
        if cross != 0.0 {
            out.push(cur);
        }
    }
    out
}

/// Nest a descending-area ring list into polygons: a ring inside an existing
/// shell (innermost first) becomes its hole, anything else opens a new shell.
fn nest_rings(rings: Vec<Ring>) -> Vec<Polygon> {
    let mut polys: Vec<Polygon> = Vec::new();
    for mut ring in rings {
        // Innermost shell containing the ring's first vertex, if any.
        let mut target: Option<usize> = None;
        for (i, poly) in polys.iter().enumerate().rev() {
            let Some(shell) = poly.shell() else { continue };
            if !shell.extent().contains_extent(&ring.extent()) {
                continue;
            }
            let hm = HitMap::from_polygon(&Polygon::new(vec![shell.clone()]));
            if hm.label_for(ring.0[0]) == Label::Inside {
                target = Some(i);
                break;
            }
        }
        match target {
            Some(i) => {
                ring.set_winding(Winding::CounterClockwise);
                ring.normalize();
                polys[i].rings.push(ring);
            }
            None => {
                ring.set_winding(Winding::Clockwise);
                ring.normalize();
                polys.push(Polygon::new(vec![ring]));
            }
        }
    }
    polys
}

/// Run the full engine over a set of rings (pixel coordinates).
pub fn make_valid(rings: &[Vec<Point2>]) -> Result<MultiPolygon> {
    let boundary = destructure(rings);
    if boundary.is_empty() {
        return Ok(MultiPolygon::default());
    }
    let mut graph = PlanarGraph::build(&boundary);
    graph.triangulate();
    let arena = find_triangles(&graph)?;

    let mut polygons: Vec<Polygon> = Vec::new();
    for boundary in component_rings(&arena, &graph) {
        polygons.extend(nest_rings(construct_rings(boundary)));
    }
    polygons.sort_by(|a, b| {
        let pa = a.shell().and_then(|r| r.0.first().copied()).unwrap_or_default();
        let pb = b.shell().and_then(|r| r.0.first().copied()).unwrap_or_default();
        xy_order(pa, pb)
    });
    Ok(MultiPolygon(polygons))
}

fn scale_rings(g: &Geometry, factor: f64) -> Geometry {
    g.map_points(&|pt| Point2::new(pt.x * factor, pt.y * factor))
}

fn polygon_ring_points(p: &Polygon) -> Vec<Vec<Point2>> {
    p.rings.iter().map(|r| r.0.clone()).collect()
}

/// Repair a polygon or multi-polygon geometry.
///
/// Coordinates are scaled up by [`CLEAN_SCALE`] around the engine so the
/// integer quantisation of intersection points lands on tenths of a pixel.
/// Non-empty input that yields no Inside polygon reports
/// [`Error::UnableToCleanMultiPolygon`]; other geometry passes through.
pub fn clean_geometry(geom: &Geometry) -> Result<Geometry> {
    match geom {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
            let scaled = scale_rings(geom, CLEAN_SCALE);
            let rings: Vec<Vec<Point2>> = match &scaled {
                Geometry::Polygon(p) => polygon_ring_points(p),
                Geometry::MultiPolygon(mp) => {
                    mp.0.iter().flat_map(polygon_ring_points).collect()
                }
                _ => unreachable!(),
            };
            let had_input = rings.iter().any(|r| r.len() >= 3);
            let mp = make_valid(&rings)?;
            if mp.0.is_empty() {
                if had_input {
                    return Err(Error::UnableToCleanMultiPolygon);
                }
                return Ok(Geometry::MultiPolygon(MultiPolygon::default()));
            }
            Ok(scale_rings(
                &Geometry::MultiPolygon(mp),
                1.0 / CLEAN_SCALE,
            ))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    fn total_area(mp: &MultiPolygon) -> f64 {
        mp.0.iter()
            .map(|p| {
                let shell = p.shell().map(Ring::area).unwrap_or(0.0);
                let holes: f64 = p.holes().iter().map(Ring::area).sum();
                shell - holes
            })
            .sum()
    }

    // ========== Destructure ==========

    #[test]
    fn test_destructure_splits_at_crossing() {
        let rings = vec![pts(&[(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)])];
        let segs = destructure(&rings);
        // The two diagonals split at (5,5): 4 half-diagonals + 2 verticals.
        assert_eq!(segs.len(), 6);
        let center = Point2::new(5.0, 5.0);
        let touching = segs
            .iter()
            .filter(|s| s[0] == center || s[1] == center)
            .count();
        assert_eq!(touching, 4);
    }

    #[test]
    fn test_destructure_drops_duplicates_and_degenerates() {
        let rings = vec![
            pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 0.0), (10.0, 10.0)]),
            pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]),
        ];
        let segs = destructure(&rings);
        assert_eq!(segs.len(), 3, "duplicate ring edges must collapse: {:?}", segs);
    }

    // ========== Full engine ==========

    #[test]
    fn test_valid_square_round_trips() {
        let rings = vec![pts(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)])];
        let mp = make_valid(&rings).unwrap();
        assert_eq!(mp.0.len(), 1);
        let shell = mp.0[0].shell().unwrap();
        assert_eq!(shell.area(), 10_000.0);
        assert_eq!(shell.winding(), Winding::Clockwise);
        assert_eq!(mp.0[0].holes().len(), 0);
    }

    #[test]
    fn test_bowtie_splits_into_even_odd_wings() {
        // Figure-eight: diagonals cross at (50,50); the even-odd interior is
        // the two side triangles sealed by the vertical edges.
        let rings = vec![pts(&[(0.0, 0.0), (100.0, 100.0), (100.0, 0.0), (0.0, 100.0)])];
        let mp = make_valid(&rings).unwrap();
        assert_eq!(mp.0.len(), 2, "bowtie must split into two polygons");
        for poly in &mp.0 {
            let shell = poly.shell().unwrap();
            assert_eq!(shell.len(), 3, "each half is a triangle: {:?}", shell);
            assert_eq!(shell.area(), 2500.0);
            assert_eq!(shell.winding(), Winding::Clockwise);
            assert!(poly.holes().is_empty());
        }
        assert!((total_area(&mp) - 5000.0).abs() < 1e-9);
        // Both triangles meet at the crossing point.
        for poly in &mp.0 {
            assert!(poly.shell().unwrap().0.contains(&Point2::new(50.0, 50.0)));
        }
    }

    #[test]
    fn test_square_with_hole_preserved() {
        let rings = vec![
            pts(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]),
            pts(&[(40.0, 40.0), (60.0, 40.0), (60.0, 60.0), (40.0, 60.0)]),
        ];
        let mp = make_valid(&rings).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].rings.len(), 2);
        assert_eq!(mp.0[0].shell().unwrap().area(), 10_000.0);
        assert_eq!(mp.0[0].holes()[0].area(), 400.0);
        assert_eq!(mp.0[0].holes()[0].winding(), Winding::CounterClockwise);
        assert!((total_area(&mp) - 9600.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_rings_even_odd() {
        // Two squares crossing transversally: even-odd removes the doubly
        // covered middle, leaving two L-shapes that touch at the crossings.
        let rings = vec![
            pts(&[(0.0, 0.0), (60.0, 0.0), (60.0, 60.0), (0.0, 60.0)]),
            pts(&[(40.0, 20.0), (100.0, 20.0), (100.0, 80.0), (40.0, 80.0)]),
        ];
        let mp = make_valid(&rings).unwrap();
        // 3600 + 3600 - 2 * (20 * 40) overlap.
        assert!(
            (total_area(&mp) - 5600.0).abs() < 1e-9,
            "got {}",
            total_area(&mp)
        );
        assert_eq!(mp.0.len(), 2);
    }

    #[test]
    fn test_make_valid_idempotent() {
        let rings = vec![pts(&[(0.0, 0.0), (100.0, 100.0), (100.0, 0.0), (0.0, 100.0)])];
        let once = make_valid(&rings).unwrap();
        let again_input: Vec<Vec<Point2>> = once
            .0
            .iter()
            .flat_map(|p| p.rings.iter().map(|r| r.0.clone()))
            .collect();
        let twice = make_valid(&again_input).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_area_conserved_for_valid_input() {
        let rings = vec![pts(&[(0.0, 0.0), (80.0, 0.0), (80.0, 50.0), (0.0, 50.0)])];
        let mp = make_valid(&rings).unwrap();
        assert!((total_area(&mp) - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(make_valid(&[]).unwrap(), MultiPolygon::default());
        assert!(make_valid(&[vec![]]).unwrap().0.is_empty());
    }

    // ========== clean_geometry ==========

    #[test]
    fn test_clean_geometry_scales_back() {
        let g = Geometry::Polygon(Polygon::new(vec![Ring(pts(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ]))]));
        match clean_geometry(&g).unwrap() {
            Geometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 1);
                assert!((mp.0[0].shell().unwrap().area() - 100.0).abs() < 1e-9);
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_clean_geometry_bowtie_seed() {
        let g = Geometry::Polygon(Polygon::new(vec![Ring(pts(&[
            (0.0, 0.0),
            (10.0, 10.0),
            (10.0, 0.0),
            (0.0, 10.0),
        ]))]));
        match clean_geometry(&g).unwrap() {
            Geometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 2);
                for poly in &mp.0 {
                    let shell = poly.shell().unwrap();
                    assert_eq!(shell.len(), 3);
                    assert!((shell.area() - 25.0).abs() < 1e-9);
                    assert_eq!(shell.winding(), Winding::Clockwise);
                    assert!(shell.0.iter().any(|p| p.approx_eq(Point2::new(5.0, 5.0))));
                }
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_clean_geometry_passthrough_for_lines() {
        let g = Geometry::LineString(crate::geom::Polyline(pts(&[(0.0, 0.0), (5.0, 5.0)])));
        assert_eq!(clean_geometry(&g).unwrap(), g);
    }

    #[test]
    fn test_clean_geometry_degenerate_polygon_fails() {
        let g = Geometry::Polygon(Polygon::new(vec![Ring(pts(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (20.0, 0.0),
        ]))]));
        assert!(matches!(
            clean_geometry(&g),
            Err(Error::UnableToCleanMultiPolygon)
        ));
    }
}
