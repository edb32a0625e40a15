//! Structured sampling grid over the parametric domain of a face.
//!
//! Node `(i, j)` sits at `(cuts[U][i], cuts[V][j])` and is stored at index
//! `j * nu + i`. Loops are kept in three spaces:
//!
//! - raw parametric coordinates,
//! - globally scaled coordinates, where each axis is stretched by the mean 3D
//!   length of the grid columns (distances there approximate model space),
//! - uniform coordinates, where cut `i` maps to `i` so every cell is a unit
//!   square (used for classification).

use crate::geom::{
    CarrierSurface, DerivativeOrder, IsoAxis, Point3, SurfacePoint, UvDomain, UvPoint, Vec3,
    project_on_segment,
};

use super::error::MeshError;

/// Imposed coordinates closer than this fraction of the local gap to an
/// existing cut replace that cut.
const SNAP_FRACTION: f64 = 0.2;

/// Classification flags of one grid node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStatus {
    pub inside: bool,
    pub close_to_loop: bool,
    pub too_close: bool,
}

impl NodeStatus {
    /// Inside the face and not discarded near the boundary.
    #[must_use]
    pub const fn is_used(self) -> bool {
        self.inside && !self.too_close
    }
}

#[derive(Debug, Clone)]
pub struct SamplingGrid {
    domain: UvDomain,
    cuts: [Vec<f64>; 2],
    scaled: [Vec<f64>; 2],
    points: Vec<Point3>,
    normals: Vec<Vec3>,
    status: Vec<NodeStatus>,
    loops: Vec<Vec<UvPoint>>,
    loops_scaled: Vec<Vec<UvPoint>>,
    loops_uniform: Vec<Vec<UvPoint>>,
    /// Loop segments `(loop, segment)` whose DDA walk touched each node.
    near_segments: Vec<Vec<(usize, usize)>>,
}

impl SamplingGrid {
    #[must_use]
    pub fn new(domain: UvDomain) -> Self {
        Self {
            domain,
            cuts: [vec![domain.u_min, domain.u_max], vec![domain.v_min, domain.v_max]],
            scaled: [Vec::new(), Vec::new()],
            points: Vec::new(),
            normals: Vec::new(),
            status: Vec::new(),
            loops: Vec::new(),
            loops_scaled: Vec::new(),
            loops_uniform: Vec::new(),
            near_segments: Vec::new(),
        }
    }

    /// Build the cut arrays from criteria-driven cuts and coordinates the
    /// topology imposes (loop vertices, surface discontinuities).
    ///
    /// Both inputs are clipped to the domain; the domain bounds are always cuts.
    pub fn define_cutting_parameters(&mut self, criteria: [Vec<f64>; 2], imposed: [Vec<f64>; 2]) {
        for axis in IsoAxis::BOTH {
            let (lo, hi) = self.domain.range(axis);
            let mut cuts: Vec<f64> = criteria[axis.index()]
                .iter()
                .copied()
                .filter(|c| c.is_finite() && *c > lo && *c < hi)
                .collect();
            cuts.push(lo);
            cuts.push(hi);
            cuts.sort_by(f64::total_cmp);
            cuts.dedup();

            let mut extra: Vec<f64> =
                imposed[axis.index()].iter().copied().filter(|c| c.is_finite() && *c > lo && *c < hi).collect();
            extra.sort_by(f64::total_cmp);
            for c in extra {
                snap_or_insert(&mut cuts, c);
            }
            self.cuts[axis.index()] = cuts;
        }
        self.points.clear();
        self.normals.clear();
        self.status.clear();
    }

    /// Evaluate the carrier at every node.
    pub fn generate_point_cloud(&mut self, surface: &CarrierSurface, tolerance_uv: [f64; 2]) -> Result<(), MeshError> {
        self.generate_point_cloud_with(tolerance_uv, |uv| surface.evaluate(uv.u, uv.v, DerivativeOrder::One))
    }

    /// Same as [`generate_point_cloud`](Self::generate_point_cloud) with an
    /// arbitrary evaluator. A grid with fewer than two cuts on an axis, or whose
    /// largest gap on an axis is below the tolerance, is rejected before any
    /// evaluation.
    pub fn generate_point_cloud_with(
        &mut self,
        tolerance_uv: [f64; 2],
        mut evaluate: impl FnMut(UvPoint) -> SurfacePoint,
    ) -> Result<(), MeshError> {
        for axis in IsoAxis::BOTH {
            let cuts = &self.cuts[axis.index()];
            let tolerance = tolerance_uv[axis.index()];
            let gap = cuts.windows(2).map(|w| w[1] - w[0]).fold(0.0_f64, f64::max);
            if cuts.len() < 2 || !(gap >= tolerance) {
                return Err(MeshError::DegenerateGrid { axis, gap, tolerance });
            }
        }

        let (nu, nv) = self.dims();
        self.points = Vec::with_capacity(nu * nv);
        self.normals = Vec::with_capacity(nu * nv);
        for &v in &self.cuts[1] {
            for &u in &self.cuts[0] {
                let p = evaluate(UvPoint::new(u, v));
                self.points.push(p.point);
                self.normals.push(p.normal().unwrap_or(Vec3::ZERO));
            }
        }
        self.status = vec![NodeStatus::default(); nu * nv];
        self.scaled = [self.scaled_axis(IsoAxis::U), self.scaled_axis(IsoAxis::V)];
        log::trace!("point cloud {nu}x{nv} evaluated");
        Ok(())
    }

    fn scaled_axis(&self, axis: IsoAxis) -> Vec<f64> {
        let (nu, nv) = self.dims();
        let cuts = &self.cuts[axis.index()];
        let lines = match axis {
            IsoAxis::U => nv,
            IsoAxis::V => nu,
        };
        let mut out = Vec::with_capacity(cuts.len());
        out.push(0.0);
        for k in 1..cuts.len() {
            let mut total = 0.0;
            for l in 0..lines {
                let (a, b) = match axis {
                    IsoAxis::U => (self.index(k - 1, l), self.index(k, l)),
                    IsoAxis::V => (self.index(l, k - 1), self.index(l, k)),
                };
                total += self.points[a].distance_to(self.points[b]);
            }
            let step = (total / lines as f64).max((cuts[k] - cuts[k - 1]) * 1e-9);
            out.push(out[k - 1] + step);
        }
        out
    }

    // ─── Coordinates ─────────────────────────────────────────────────────────

    #[must_use]
    pub const fn domain(&self) -> UvDomain {
        self.domain
    }

    #[must_use]
    pub fn cuts(&self, axis: IsoAxis) -> &[f64] {
        &self.cuts[axis.index()]
    }

    #[must_use]
    pub fn dims(&self) -> (usize, usize) {
        (self.cuts[0].len(), self.cuts[1].len())
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.cuts[0].len() * self.cuts[1].len()
    }

    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        !self.points.is_empty()
    }

    #[must_use]
    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.cuts[0].len() + i
    }

    #[must_use]
    pub fn node_uv(&self, index: usize) -> UvPoint {
        let nu = self.cuts[0].len();
        UvPoint::new(self.cuts[0][index % nu], self.cuts[1][index / nu])
    }

    #[must_use]
    pub fn node_scaled(&self, index: usize) -> UvPoint {
        let nu = self.cuts[0].len();
        UvPoint::new(self.scaled[0][index % nu], self.scaled[1][index / nu])
    }

    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    #[must_use]
    pub fn status(&self) -> &[NodeStatus] {
        &self.status
    }

    #[must_use]
    pub fn loops_scaled(&self) -> &[Vec<UvPoint>] {
        &self.loops_scaled
    }

    #[must_use]
    pub fn loops_uniform(&self) -> &[Vec<UvPoint>] {
        &self.loops_uniform
    }

    /// Cell index containing `x` and the fraction across it.
    fn locate(&self, axis: IsoAxis, x: f64) -> (usize, f64) {
        let cuts = &self.cuts[axis.index()];
        let last = cuts.len().saturating_sub(2);
        let i = cuts.partition_point(|c| *c <= x).saturating_sub(1).min(last);
        let span = cuts[i + 1] - cuts[i];
        let frac = if span > 0.0 { ((x - cuts[i]) / span).clamp(0.0, 1.0) } else { 0.0 };
        (i, frac)
    }

    fn map_axis(&self, axis: IsoAxis, x: f64, target: Option<&[f64]>) -> f64 {
        let (i, frac) = self.locate(axis, x);
        match target {
            Some(values) => values[i] + frac * (values[i + 1] - values[i]),
            None => i as f64 + frac,
        }
    }

    /// Globally scaled image of a parametric point; requires the point cloud.
    #[must_use]
    pub fn to_scaled(&self, uv: UvPoint) -> UvPoint {
        UvPoint::new(
            self.map_axis(IsoAxis::U, uv.u, Some(&self.scaled[0])),
            self.map_axis(IsoAxis::V, uv.v, Some(&self.scaled[1])),
        )
    }

    #[must_use]
    pub fn to_uniform(&self, uv: UvPoint) -> UvPoint {
        UvPoint::new(self.map_axis(IsoAxis::U, uv.u, None), self.map_axis(IsoAxis::V, uv.v, None))
    }

    /// Smallest scaled gap between the node and its neighbours.
    #[must_use]
    pub fn local_cell_size(&self, index: usize) -> f64 {
        let nu = self.cuts[0].len();
        let (i, j) = (index % nu, index / nu);
        let mut size = f64::INFINITY;
        for (axis, k) in [(0, i), (1, j)] {
            let s = &self.scaled[axis];
            if k > 0 {
                size = size.min(s[k] - s[k - 1]);
            }
            if k + 1 < s.len() {
                size = size.min(s[k + 1] - s[k]);
            }
        }
        size
    }

    // ─── Loops and classification ────────────────────────────────────────────

    /// Project the closed boundary polylines into the grid spaces and reset
    /// every node status.
    pub fn set_loops(&mut self, loops: Vec<Vec<UvPoint>>) -> Result<(), MeshError> {
        super::error::ensure!(self.is_evaluated(), "loops projected before the point cloud exists");
        self.loops = loops.into_iter().map(|l| l.into_iter().map(|p| self.domain.clamp(p)).collect()).collect();
        self.loops_scaled = self.loops.iter().map(|l| l.iter().map(|p| self.to_scaled(*p)).collect()).collect();
        self.loops_uniform = self.loops.iter().map(|l| l.iter().map(|p| self.to_uniform(*p)).collect()).collect();
        self.status = vec![NodeStatus::default(); self.node_count()];
        self.near_segments = vec![Vec::new(); self.node_count()];
        Ok(())
    }

    fn segments(loops: &[Vec<UvPoint>]) -> impl Iterator<Item = (usize, usize, UvPoint, UvPoint)> + '_ {
        loops.iter().enumerate().flat_map(|(l, ring)| {
            (0..ring.len()).map(move |s| (l, s, ring[s], ring[(s + 1) % ring.len()]))
        })
    }

    /// Ray-cast along the four axis directions from every node and mark it
    /// inside when at least `threshold` of the four parity tests say so.
    /// Returns the number of inside nodes.
    pub fn find_inner_face_points(&mut self, threshold: u8) -> usize {
        let (nu, nv) = self.dims();
        let mut rows: Vec<Vec<f64>> = vec![Vec::new(); nv];
        let mut cols: Vec<Vec<f64>> = vec![Vec::new(); nu];
        for (_, _, a, b) in Self::segments(&self.loops_uniform) {
            for (j, row) in rows.iter_mut().enumerate() {
                let y = j as f64;
                if (a.v <= y) != (b.v <= y) {
                    row.push(a.u + (y - a.v) * (b.u - a.u) / (b.v - a.v));
                }
            }
            for (i, col) in cols.iter_mut().enumerate() {
                let x = i as f64;
                if (a.u <= x) != (b.u <= x) {
                    col.push(a.v + (x - a.u) * (b.v - a.v) / (b.u - a.u));
                }
            }
        }

        let mut inside_count = 0;
        for j in 0..nv {
            for i in 0..nu {
                let (x, y) = (i as f64, j as f64);
                let row = &rows[j];
                let col = &cols[i];
                let votes = [
                    row.iter().filter(|c| **c < x).count(),
                    row.iter().filter(|c| **c > x).count(),
                    col.iter().filter(|c| **c < y).count(),
                    col.iter().filter(|c| **c > y).count(),
                ]
                .iter()
                .filter(|n| *n % 2 == 1)
                .count();
                let inside = votes >= usize::from(threshold);
                let index = self.index(i, j);
                self.status[index].inside = inside;
                inside_count += usize::from(inside);
            }
        }
        inside_count
    }

    /// Walk every loop segment through the cell lattice and flag the corner
    /// nodes of each traversed cell. Returns the number of flagged nodes.
    pub fn find_points_close_to_loop(&mut self) -> usize {
        let (nu, nv) = self.dims();
        if nu < 2 || nv < 2 {
            return 0;
        }
        let segments: Vec<_> = Self::segments(&self.loops_uniform).collect();
        for (l, s, a, b) in segments {
            for (cx, cy) in dda_cells(a, b, nu - 1, nv - 1) {
                for (i, j) in [(cx, cy), (cx + 1, cy), (cx, cy + 1), (cx + 1, cy + 1)] {
                    let index = self.index(i, j);
                    self.status[index].close_to_loop = true;
                    let near = &mut self.near_segments[index];
                    if near.last() != Some(&(l, s)) {
                        near.push((l, s));
                    }
                }
            }
        }
        self.status.iter().filter(|s| s.close_to_loop).count()
    }

    /// Discard close-to-loop nodes lying within `ratio` times their local cell
    /// size of a boundary segment met by the walk. Returns the number of
    /// discarded nodes.
    pub fn remove_points_close_to_loop(&mut self, ratio: f64) -> usize {
        let mut removed = 0;
        for index in 0..self.status.len() {
            if !self.status[index].close_to_loop {
                continue;
            }
            let p = self.node_scaled(index);
            let limit = ratio * self.local_cell_size(index);
            let distance = self.near_segments[index]
                .iter()
                .map(|&(l, s)| {
                    let ring = &self.loops_scaled[l];
                    project_on_segment(p, ring[s], ring[(s + 1) % ring.len()]).0
                })
                .fold(f64::INFINITY, f64::min);
            if distance < limit {
                self.status[index].too_close = true;
                removed += 1;
            }
        }
        removed
    }

    /// Indices of nodes that end up in the triangulation.
    pub fn used_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.status.iter().enumerate().filter(|(_, s)| s.is_used()).map(|(i, _)| i)
    }
}

fn snap_or_insert(cuts: &mut Vec<f64>, c: f64) {
    let i = cuts.partition_point(|x| *x < c);
    if cuts.get(i) == Some(&c) {
        return;
    }
    // `cuts` always holds both bounds and `c` lies strictly inside them.
    let (lo, hi) = (i - 1, i);
    let gap = cuts[hi] - cuts[lo];
    let last = cuts.len() - 1;
    if c - cuts[lo] < SNAP_FRACTION * gap && lo != 0 {
        cuts[lo] = c;
    } else if cuts[hi] - c < SNAP_FRACTION * gap && hi != last {
        cuts[hi] = c;
    } else {
        cuts.insert(hi, c);
    }
}

/// Cells of a `cx_count x cy_count` lattice crossed by segment `ab`, in order.
fn dda_cells(a: UvPoint, b: UvPoint, cx_count: usize, cy_count: usize) -> Vec<(usize, usize)> {
    let clamp_cell = |x: f64, n: usize| -> usize {
        if x.is_nan() { 0 } else { (x.floor().max(0.0) as usize).min(n - 1) }
    };
    let (mut cx, mut cy) = (clamp_cell(a.u, cx_count), clamp_cell(a.v, cy_count));
    let (ex, ey) = (clamp_cell(b.u, cx_count), clamp_cell(b.v, cy_count));
    let mut out = vec![(cx, cy)];

    let (du, dv) = (b.u - a.u, b.v - a.v);
    let boundary = |c: usize, d: f64| if d > 0.0 { c as f64 + 1.0 } else { c as f64 };
    let mut t_max_x = if du == 0.0 { f64::INFINITY } else { (boundary(cx, du) - a.u) / du };
    let mut t_max_y = if dv == 0.0 { f64::INFINITY } else { (boundary(cy, dv) - a.v) / dv };
    let t_delta_x = if du == 0.0 { f64::INFINITY } else { 1.0 / du.abs() };
    let t_delta_y = if dv == 0.0 { f64::INFINITY } else { 1.0 / dv.abs() };

    let mut guard = cx.abs_diff(ex) + cy.abs_diff(ey) + 2;
    while (cx, cy) != (ex, ey) && guard > 0 {
        guard -= 1;
        if t_max_x < t_max_y {
            cx = if du > 0.0 { (cx + 1).min(cx_count - 1) } else { cx.saturating_sub(1) };
            t_max_x += t_delta_x;
        } else {
            cy = if dv > 0.0 { (cy + 1).min(cy_count - 1) } else { cy.saturating_sub(1) };
            t_max_y += t_delta_y;
        }
        if out.last() != Some(&(cx, cy)) {
            out.push((cx, cy));
        }
    }
    if out.last() != Some(&(ex, ey)) {
        out.push((ex, ey));
    }
    out
}
