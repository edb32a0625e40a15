//! Constrained triangulation of parameter-plane regions.
//!
//! # Main Types
//!
//! - [`ConstrainedTriangulation`]: ear-clipped region (outer ring plus bridged
//!   holes) kept as a triangle adjacency structure. Edge flips restore the
//!   Delaunay property everywhere except across boundary edges, and interior
//!   points can be inserted incrementally.
//! - [`triangulate_by_winding`]: unconstrained Delaunay triangulation of the ring
//!   points filtered by the generalized winding number, used when ear clipping
//!   cannot resolve a ring.
//!
//! Rings are given as index lists into a shared point array. The first ring is the
//! outer boundary and the remaining rings are holes; orientation is normalized
//! internally. Consecutive duplicates are dropped while collinear points are kept,
//! since every ring point is a mesh vertex shared with a neighbouring face.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::core::{UvPoint, in_circle, orient2d, signed_area};

/// Relative tolerance applied to the extent of the input points.
const RELATIVE_EPS: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriangulationError {
    #[error("triangulation vertices must be finite")]
    NonFinite,
    #[error("ring {ring} has fewer than 3 distinct points")]
    DegenerateRing { ring: usize },
    #[error("failed to find a bridge from hole {ring} to the outer ring")]
    NoBridge { ring: usize },
    #[error("ear clipping failed: {0}")]
    EarClip(&'static str),
    #[error("triangulation produced no triangles")]
    Empty,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ear clipping
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Node {
    idx: usize,
    point: UvPoint,
    prev: usize,
    next: usize,
}

fn build_ring_nodes(nodes: &mut Vec<Node>, ring: &[usize], points: &[UvPoint]) -> usize {
    let start = nodes.len();
    let len = ring.len();
    for (i, &idx) in ring.iter().enumerate() {
        nodes.push(Node {
            idx,
            point: points[idx],
            prev: start + (i + len - 1) % len,
            next: start + (i + 1) % len,
        });
    }
    start
}

/// Drop consecutive duplicates (including the closing point) and orient the ring.
fn clean_ring(ring: &[usize], points: &[UvPoint], ccw: bool, eps: f64) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::with_capacity(ring.len());
    for &idx in ring {
        let duplicate = out.last().is_some_and(|&last| points[last].distance_to(points[idx]) <= eps);
        if !duplicate {
            out.push(idx);
        }
    }
    while out.len() > 1 && points[out[0]].distance_to(points[out[out.len() - 1]]) <= eps {
        out.pop();
    }

    let pts: Vec<UvPoint> = out.iter().map(|&i| points[i]).collect();
    if (signed_area(&pts) > 0.0) != ccw {
        out.reverse();
    }
    out
}

fn ring_len(start: usize, nodes: &[Node]) -> usize {
    let mut count = 0usize;
    let mut cur = start;
    loop {
        count += 1;
        cur = nodes[cur].next;
        if cur == start || count > nodes.len() {
            break;
        }
    }
    count
}

fn leftmost_node(start: usize, nodes: &[Node]) -> usize {
    let mut left = start;
    let mut cur = nodes[start].next;
    while cur != start {
        let a = nodes[cur].point;
        let b = nodes[left].point;
        if a.u < b.u || (a.u == b.u && a.v < b.v) {
            left = cur;
        }
        cur = nodes[cur].next;
    }
    left
}

fn segments_cross(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint, eps: f64) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);
    let ab = (o1 > eps && o2 < -eps) || (o1 < -eps && o2 > eps);
    let cd = (o3 > eps && o4 < -eps) || (o3 < -eps && o4 > eps);
    ab && cd
}

fn is_visible(a: UvPoint, b: UvPoint, b_node: usize, ring_start: usize, nodes: &[Node], eps: f64) -> bool {
    let mut e = ring_start;
    loop {
        let n = nodes[e].next;
        if e != b_node && n != b_node && segments_cross(a, b, nodes[e].point, nodes[n].point, eps) {
            return false;
        }
        e = n;
        if e == ring_start {
            return true;
        }
    }
}

fn find_hole_bridge(hole: usize, outer_start: usize, nodes: &[Node], eps: f64) -> Option<usize> {
    let hole_p = nodes[hole].point;
    let mut best_x = f64::NEG_INFINITY;
    let mut best_edge = None;

    let mut p = outer_start;
    loop {
        let q = nodes[p].next;
        let a = nodes[p].point;
        let b = nodes[q].point;
        if (a.v > hole_p.v) != (b.v > hole_p.v) {
            let t = (hole_p.v - a.v) / (b.v - a.v);
            let x = a.u + t * (b.u - a.u);
            if x <= hole_p.u + eps && x > best_x {
                best_x = x;
                best_edge = Some((p, q));
            }
        }
        p = q;
        if p == outer_start {
            break;
        }
    }

    if let Some((e0, e1)) = best_edge {
        let candidates = if nodes[e0].point.u < nodes[e1].point.u { [e1, e0] } else { [e0, e1] };
        for cand in candidates {
            if is_visible(hole_p, nodes[cand].point, cand, outer_start, nodes, eps) {
                return Some(cand);
            }
        }
    }

    let mut best = None;
    let mut best_dist = f64::INFINITY;
    let mut v = outer_start;
    loop {
        let p = nodes[v].point;
        let d = p.distance_to(hole_p);
        if p.u <= hole_p.u + eps && d < best_dist && is_visible(hole_p, p, v, outer_start, nodes, eps) {
            best_dist = d;
            best = Some(v);
        }
        v = nodes[v].next;
        if v == outer_start {
            break;
        }
    }
    best
}

/// Connect outer node `a` with hole node `b` by duplicating both nodes.
fn split_polygon(a: usize, b: usize, nodes: &mut Vec<Node>) {
    let a_next = nodes[a].next;
    let b_prev = nodes[b].prev;

    let a2 = nodes.len();
    nodes.push(Node { next: a_next, prev: 0, ..nodes[a] });
    let b2 = nodes.len();
    nodes.push(Node { next: a2, prev: b_prev, ..nodes[b] });

    nodes[a].next = b;
    nodes[b].prev = a;
    nodes[b_prev].next = b2;
    nodes[a2].prev = b2;
    nodes[a_next].prev = a2;
}

fn point_in_triangle(a: UvPoint, b: UvPoint, c: UvPoint, p: UvPoint, eps: f64) -> bool {
    orient2d(a, b, p) >= -eps && orient2d(b, c, p) >= -eps && orient2d(c, a, p) >= -eps
}

fn is_ear(prev: usize, ear: usize, next: usize, nodes: &[Node], eps_orient: f64) -> bool {
    let a = nodes[prev].point;
    let b = nodes[ear].point;
    let c = nodes[next].point;
    if orient2d(a, b, c) <= eps_orient {
        return false;
    }

    let mut p = nodes[next].next;
    let mut guard = 0usize;
    while p != prev {
        guard += 1;
        if guard > nodes.len() {
            break;
        }
        let node = nodes[p];
        let same = node.idx == nodes[prev].idx || node.idx == nodes[ear].idx || node.idx == nodes[next].idx;
        if !same && point_in_triangle(a, b, c, node.point, eps_orient) {
            let cross = orient2d(nodes[node.prev].point, node.point, nodes[node.next].point);
            if cross <= eps_orient {
                return false;
            }
        }
        p = node.next;
    }
    true
}

fn earclip_polygon(start: usize, nodes: &mut [Node], eps_orient: f64) -> Result<Vec<[usize; 3]>, TriangulationError> {
    let mut remaining = ring_len(start, nodes);
    if remaining < 3 {
        return Err(TriangulationError::EarClip("polygon has fewer than 3 vertices"));
    }

    let mut ear = start;
    let mut stop = start;
    let mut triangles = Vec::with_capacity(remaining - 2);

    while remaining > 2 {
        let prev = nodes[ear].prev;
        let next = nodes[ear].next;
        if is_ear(prev, ear, next, nodes, eps_orient) {
            triangles.push([nodes[prev].idx, nodes[ear].idx, nodes[next].idx]);
            nodes[prev].next = next;
            nodes[next].prev = prev;
            remaining -= 1;
            ear = next;
            stop = next;
            continue;
        }

        ear = next;
        if ear == stop {
            if remaining == 3 {
                // Only a zero-area remainder is left.
                break;
            }
            return Err(TriangulationError::EarClip("no ear found"));
        }
    }

    Ok(triangles)
}

fn extent(points: &[UvPoint]) -> f64 {
    let mut lo = UvPoint::new(f64::INFINITY, f64::INFINITY);
    let mut hi = UvPoint::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        lo = UvPoint::new(lo.u.min(p.u), lo.v.min(p.v));
        hi = UvPoint::new(hi.u.max(p.u), hi.v.max(p.v));
    }
    (hi.u - lo.u).max(hi.v - lo.v).max(f64::MIN_POSITIVE)
}

/// Ear-clip the outer ring with bridged holes; returns counter-clockwise triangles.
pub fn earclip_rings(points: &[UvPoint], rings: &[Vec<usize>]) -> Result<Vec<[usize; 3]>, TriangulationError> {
    if points.iter().any(|p| !p.u.is_finite() || !p.v.is_finite()) {
        return Err(TriangulationError::NonFinite);
    }
    let Some(outer) = rings.first() else {
        return Err(TriangulationError::DegenerateRing { ring: 0 });
    };

    let scale = extent(points);
    let eps = scale * RELATIVE_EPS;
    let eps_orient = eps * scale;

    let outer = clean_ring(outer, points, true, eps);
    if outer.len() < 3 {
        return Err(TriangulationError::DegenerateRing { ring: 0 });
    }

    let mut nodes: Vec<Node> = Vec::with_capacity(points.len() + 2 * rings.len());
    let outer_start = build_ring_nodes(&mut nodes, &outer, points);

    let mut holes: Vec<(usize, usize)> = Vec::new();
    for (ring_index, ring) in rings.iter().enumerate().skip(1) {
        let hole = clean_ring(ring, points, false, eps);
        if hole.len() < 3 {
            return Err(TriangulationError::DegenerateRing { ring: ring_index });
        }
        let start = build_ring_nodes(&mut nodes, &hole, points);
        holes.push((ring_index, leftmost_node(start, &nodes)));
    }
    holes.sort_by(|a, b| {
        let pa = nodes[a.1].point;
        let pb = nodes[b.1].point;
        pa.u.total_cmp(&pb.u).then_with(|| pa.v.total_cmp(&pb.v))
    });

    for (ring, hole_left) in holes {
        let bridge = find_hole_bridge(hole_left, outer_start, &nodes, eps_orient)
            .ok_or(TriangulationError::NoBridge { ring })?;
        split_polygon(bridge, hole_left, &mut nodes);
    }

    let triangles: Vec<[usize; 3]> = earclip_polygon(outer_start, &mut nodes, eps_orient)?
        .into_iter()
        .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
        .collect();
    if triangles.is_empty() {
        return Err(TriangulationError::Empty);
    }
    Ok(triangles)
}

// ─────────────────────────────────────────────────────────────────────────────
// Adjacency structure
// ─────────────────────────────────────────────────────────────────────────────

/// Triangulation with adjacency, boundary constraints and incremental insertion.
///
/// Edge `i` of triangle `t` runs from `triangles[t][i]` to `triangles[t][(i + 1) % 3]`
/// and `neighbors[t][i]` is the triangle on its other side.
#[derive(Debug, Clone)]
pub struct ConstrainedTriangulation {
    points: Vec<UvPoint>,
    triangles: Vec<[usize; 3]>,
    neighbors: Vec<[Option<usize>; 3]>,
    constrained: HashSet<(usize, usize)>,
    eps_len: f64,
    eps_orient: f64,
    eps_circle: f64,
    hint: usize,
    flips: usize,
}

const fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

impl ConstrainedTriangulation {
    /// Ear-clip `rings` and legalize every unconstrained edge.
    pub fn from_rings(points: Vec<UvPoint>, rings: &[Vec<usize>]) -> Result<Self, TriangulationError> {
        let triangles = earclip_rings(&points, rings)?;
        let scale = extent(&points);

        let mut constrained = HashSet::new();
        for ring in rings {
            for (i, &a) in ring.iter().enumerate() {
                let b = ring[(i + 1) % ring.len()];
                if a != b {
                    constrained.insert(edge_key(a, b));
                }
            }
        }

        let mut cdt = Self {
            points,
            neighbors: Vec::new(),
            triangles,
            constrained,
            eps_len: scale * RELATIVE_EPS,
            eps_orient: scale * scale * RELATIVE_EPS,
            eps_circle: scale.powi(4) * RELATIVE_EPS,
            hint: 0,
            flips: 0,
        };
        cdt.rebuild_adjacency();

        let all_edges: Vec<(usize, usize)> =
            (0..cdt.triangles.len()).flat_map(|t| (0..3).map(move |e| (t, e))).collect();
        cdt.legalize(all_edges);
        Ok(cdt)
    }

    fn rebuild_adjacency(&mut self) {
        let mut directed: HashMap<(usize, usize), (usize, usize)> = HashMap::with_capacity(self.triangles.len() * 3);
        for (t, tri) in self.triangles.iter().enumerate() {
            for e in 0..3 {
                directed.insert((tri[e], tri[(e + 1) % 3]), (t, e));
            }
        }
        self.neighbors = self
            .triangles
            .iter()
            .map(|tri| {
                let mut out = [None; 3];
                for (e, slot) in out.iter_mut().enumerate() {
                    *slot = directed.get(&(tri[(e + 1) % 3], tri[e])).map(|&(t, _)| t);
                }
                out
            })
            .collect();
    }

    #[must_use]
    pub fn points(&self) -> &[UvPoint] {
        &self.points
    }

    #[must_use]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Number of edge flips performed so far.
    #[must_use]
    pub const fn flip_count(&self) -> usize {
        self.flips
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<UvPoint>, Vec<[usize; 3]>) {
        (self.points, self.triangles)
    }

    fn is_constrained(&self, a: usize, b: usize) -> bool {
        self.constrained.contains(&edge_key(a, b))
    }

    fn edge_index(&self, t: usize, a: usize, b: usize) -> Option<usize> {
        let tri = self.triangles[t];
        (0..3).find(|&e| tri[e] == a && tri[(e + 1) % 3] == b)
    }

    fn replace_neighbor(&mut self, tri: Option<usize>, old: usize, new: usize) {
        let Some(t) = tri else {
            return;
        };
        for slot in &mut self.neighbors[t] {
            if *slot == Some(old) {
                *slot = Some(new);
                return;
            }
        }
    }

    fn legalize(&mut self, mut stack: Vec<(usize, usize)>) {
        let limit = 64 * (self.triangles.len() + stack.len()).max(16);
        let mut steps = 0usize;
        while let Some((t, e)) = stack.pop() {
            steps += 1;
            if steps > limit {
                log::warn!("edge legalization stopped after {limit} steps");
                break;
            }
            let Some(n) = self.neighbors[t][e] else {
                continue;
            };
            let tri = self.triangles[t];
            let (a, b, p) = (tri[e], tri[(e + 1) % 3], tri[(e + 2) % 3]);
            if self.is_constrained(a, b) {
                continue;
            }
            let Some(f) = self.edge_index(n, b, a) else {
                continue;
            };
            let d = self.triangles[n][(f + 2) % 3];
            let (pa, pb, pp, pd) = (self.points[a], self.points[b], self.points[p], self.points[d]);
            if in_circle(pa, pb, pp, pd) <= self.eps_circle {
                continue;
            }
            if orient2d(pp, pa, pd) <= self.eps_orient || orient2d(pp, pd, pb) <= self.eps_orient {
                continue;
            }

            self.flip(t, e, n, f);
            stack.extend([(t, 0), (t, 1), (n, 1), (n, 2)]);
        }
    }

    /// Replace diagonal `ab` shared by `t = (a, b, p)` and `n = (b, a, d)` with `pd`.
    fn flip(&mut self, t: usize, e: usize, n: usize, f: usize) {
        let tri = self.triangles[t];
        let (a, b, p) = (tri[e], tri[(e + 1) % 3], tri[(e + 2) % 3]);
        let d = self.triangles[n][(f + 2) % 3];
        let n_bp = self.neighbors[t][(e + 1) % 3];
        let n_pa = self.neighbors[t][(e + 2) % 3];
        let n_ad = self.neighbors[n][(f + 1) % 3];
        let n_db = self.neighbors[n][(f + 2) % 3];

        self.triangles[t] = [p, a, d];
        self.neighbors[t] = [n_pa, n_ad, Some(n)];
        self.triangles[n] = [p, d, b];
        self.neighbors[n] = [Some(t), n_db, n_bp];
        self.replace_neighbor(n_ad, n, t);
        self.replace_neighbor(n_bp, t, n);
        self.flips += 1;
    }

    fn contains(&self, t: usize, p: UvPoint) -> bool {
        let [a, b, c] = self.triangles[t];
        point_in_triangle(self.points[a], self.points[b], self.points[c], p, self.eps_orient)
    }

    fn locate(&mut self, p: UvPoint) -> Option<usize> {
        if self.triangles.is_empty() {
            return None;
        }
        let mut t = self.hint.min(self.triangles.len() - 1);
        for step in 0..self.triangles.len() + 8 {
            let tri = self.triangles[t];
            let mut moved = false;
            for k in 0..3 {
                let e = (k + step) % 3;
                let a = self.points[tri[e]];
                let b = self.points[tri[(e + 1) % 3]];
                if orient2d(a, b, p) < -self.eps_orient {
                    match self.neighbors[t][e] {
                        Some(next) => {
                            t = next;
                            moved = true;
                            break;
                        }
                        None => return self.locate_scan(p),
                    }
                }
            }
            if !moved {
                self.hint = t;
                return Some(t);
            }
        }
        self.locate_scan(p)
    }

    fn locate_scan(&mut self, p: UvPoint) -> Option<usize> {
        let found = (0..self.triangles.len()).find(|&t| self.contains(t, p))?;
        self.hint = found;
        Some(found)
    }

    /// Insert an interior point; returns its vertex index.
    ///
    /// Points outside the region, on a boundary edge, or coincident with an
    /// existing vertex are rejected.
    pub fn insert_point(&mut self, p: UvPoint) -> Option<usize> {
        if !(p.u.is_finite() && p.v.is_finite()) {
            return None;
        }
        let t = self.locate(p)?;
        let tri = self.triangles[t];
        if tri.iter().any(|&i| self.points[i].distance_to(p) <= self.eps_len * 10.0) {
            return None;
        }

        let mut on_edge = None;
        for e in 0..3 {
            let a = self.points[tri[e]];
            let b = self.points[tri[(e + 1) % 3]];
            let len = a.distance_to(b);
            let dist = orient2d(a, b, p) / len.max(f64::MIN_POSITIVE);
            if dist < -self.eps_len * 10.0 {
                return None;
            }
            if dist <= self.eps_len * 10.0 {
                if on_edge.is_some() {
                    return None;
                }
                on_edge = Some(e);
            }
        }

        let idx = self.points.len();
        match on_edge {
            None => {
                self.points.push(p);
                self.split_interior(t, idx);
            }
            Some(e) => {
                let (a, b) = (tri[e], tri[(e + 1) % 3]);
                if self.is_constrained(a, b) {
                    return None;
                }
                let n = self.neighbors[t][e]?;
                let f = self.edge_index(n, b, a)?;
                self.points.push(p);
                self.split_edge(t, e, n, f, idx);
            }
        }
        Some(idx)
    }

    fn split_interior(&mut self, t: usize, p: usize) {
        let [a, b, c] = self.triangles[t];
        let [n0, n1, n2] = self.neighbors[t];
        let t1 = self.triangles.len();
        let t2 = t1 + 1;

        self.triangles[t] = [a, b, p];
        self.neighbors[t] = [n0, Some(t1), Some(t2)];
        self.triangles.push([b, c, p]);
        self.neighbors.push([n1, Some(t2), Some(t)]);
        self.triangles.push([c, a, p]);
        self.neighbors.push([n2, Some(t), Some(t1)]);
        self.replace_neighbor(n1, t, t1);
        self.replace_neighbor(n2, t, t2);

        self.legalize(vec![(t, 0), (t1, 0), (t2, 0)]);
    }

    fn split_edge(&mut self, t: usize, e: usize, n: usize, f: usize, p: usize) {
        let tri = self.triangles[t];
        let (a, b, c) = (tri[e], tri[(e + 1) % 3], tri[(e + 2) % 3]);
        let d = self.triangles[n][(f + 2) % 3];
        let n_bc = self.neighbors[t][(e + 1) % 3];
        let n_ca = self.neighbors[t][(e + 2) % 3];
        let n_ad = self.neighbors[n][(f + 1) % 3];
        let n_db = self.neighbors[n][(f + 2) % 3];

        let tb = self.triangles.len();
        let nb = tb + 1;

        self.triangles[t] = [a, p, c];
        self.neighbors[t] = [Some(nb), Some(tb), n_ca];
        self.triangles[n] = [b, p, d];
        self.neighbors[n] = [Some(tb), Some(nb), n_db];
        self.triangles.push([p, b, c]);
        self.neighbors.push([Some(n), n_bc, Some(t)]);
        self.triangles.push([p, a, d]);
        self.neighbors.push([Some(t), n_ad, Some(n)]);
        self.replace_neighbor(n_bc, t, tb);
        self.replace_neighbor(n_ad, n, nb);

        self.legalize(vec![(t, 2), (tb, 1), (n, 2), (nb, 1)]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Winding-number fallback
// ─────────────────────────────────────────────────────────────────────────────

/// Generalized winding number of `p` with respect to a closed ring.
#[must_use]
pub fn winding_number(p: UvPoint, points: &[UvPoint], ring: &[usize]) -> f64 {
    let mut total = 0.0;
    for (i, &ia) in ring.iter().enumerate() {
        let a = points[ia];
        let b = points[ring[(i + 1) % ring.len()]];
        let (au, av) = (a.u - p.u, a.v - p.v);
        let (bu, bv) = (b.u - p.u, b.v - p.v);
        total += (au * bv - av * bu).atan2(au * bu + av * bv);
    }
    total / std::f64::consts::TAU
}

/// Delaunay triangulation of all ring points, keeping triangles whose centroid
/// lies inside the outer ring and outside every hole.
pub fn triangulate_by_winding(points: &[UvPoint], rings: &[Vec<usize>]) -> Result<Vec<[usize; 3]>, TriangulationError> {
    if points.iter().any(|p| !p.u.is_finite() || !p.v.is_finite()) {
        return Err(TriangulationError::NonFinite);
    }
    let input: Vec<delaunator::Point> = points.iter().map(|p| delaunator::Point { x: p.u, y: p.v }).collect();
    let triangulation = delaunator::triangulate(&input);
    let eps_orient = extent(points).powi(2) * RELATIVE_EPS;

    let mut out = Vec::with_capacity(triangulation.triangles.len() / 3);
    for tri in triangulation.triangles.chunks_exact(3) {
        let (a, b, c) = (points[tri[0]], points[tri[1]], points[tri[2]]);
        let area = orient2d(a, b, c);
        if area.abs() <= eps_orient {
            continue;
        }
        let centroid = UvPoint::new((a.u + b.u + c.u) / 3.0, (a.v + b.v + c.v) / 3.0);
        let inside = rings.iter().enumerate().all(|(i, ring)| {
            let w = winding_number(centroid, points, ring).abs();
            if i == 0 { w > 0.5 } else { w < 0.5 }
        });
        if inside {
            out.push(if area > 0.0 { [tri[0], tri[1], tri[2]] } else { [tri[0], tri[2], tri[1]] });
        }
    }

    if out.is_empty() {
        return Err(TriangulationError::Empty);
    }
    Ok(out)
}
