//! Detection and synchronized meshing of thin zones, where two boundary sides
//! of a face run closer together than one mesh element.

use std::collections::BTreeSet;

use crate::geom::{UvPoint, project_on_segment};
use crate::topo::{CuttingPoint, CuttingPointType, Edge, EdgeId, EdgeMeshState, Face, TopoModel};

use super::config::ThinZoneOptions;
use super::edge::EdgeDiscretizer;
use super::error::MeshError;
use super::workspace::FaceWorkspace;

/// Samples per edge when looking for close sides.
const DETECTION_SAMPLES: usize = 16;
/// Polyline resolution of the side that receives projected points.
const PROJECTION_SAMPLES: usize = 32;

/// Edges along one side of a thin zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinZoneSide {
    pub edges: Vec<EdgeId>,
}

impl ThinZoneSide {
    fn contains(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    fn shares_edge(&self, other: &Self) -> bool {
        self.edges.iter().any(|e| other.contains(*e))
    }
}

/// Two facing sides. Side A is meshed first, side B follows its points.
#[derive(Debug, Clone, PartialEq)]
pub struct ThinZone {
    pub side_a: ThinZoneSide,
    pub side_b: ThinZoneSide,
    /// Smallest scaled distance measured between the sides.
    pub width: f64,
}

/// Finds thin zones of one face and meshes their sides consistently.
pub struct ThinZoneAnalyzer {
    options: ThinZoneOptions,
    /// Parametric to metric factor per axis.
    scale: [f64; 2],
    element_size: f64,
}

impl ThinZoneAnalyzer {
    #[must_use]
    pub fn new(options: ThinZoneOptions, face: &Face, element_size: f64) -> Self {
        let factor = |tol_uv: f64| if tol_uv > 0.0 { face.tolerance / tol_uv } else { 1.0 };
        Self { options, scale: [factor(face.tolerance_uv[0]), factor(face.tolerance_uv[1])], element_size }
    }

    fn scaled(&self, uv: UvPoint) -> UvPoint {
        UvPoint::new(uv.u * self.scale[0], uv.v * self.scale[1])
    }

    fn polyline(&self, edge: &Edge, samples: usize) -> Vec<(f64, UvPoint)> {
        let (t0, t1) = edge.boundary;
        (0..=samples)
            .map(|i| {
                let t = if i == samples { t1 } else { t0 + (t1 - t0) * i as f64 / samples as f64 };
                (t, self.scaled(edge.curve.point_at(t)))
            })
            .collect()
    }

    /// Closest thin pairs of boundary edges, grouped into zones.
    ///
    /// Edges sharing a vertex never form a zone with each other.
    #[must_use]
    pub fn detect(&self, model: &TopoModel, face: &Face) -> Vec<ThinZone> {
        let threshold = self.options.width_ratio * self.element_size;
        if !self.options.enabled || !(threshold > 0.0) {
            return Vec::new();
        }
        let ids: Vec<EdgeId> = {
            let mut ids: Vec<_> = face.edge_ids().collect();
            ids.sort();
            ids.dedup();
            ids
        };
        let polylines: Vec<Vec<(f64, UvPoint)>> =
            ids.iter().map(|e| self.polyline(&model[*e], DETECTION_SAMPLES)).collect();

        let mut pairs: Vec<(EdgeId, EdgeId, f64)> = Vec::new();
        for (k, &id) in ids.iter().enumerate() {
            if model[id].mesh.degenerate {
                continue;
            }
            let samples = &polylines[k];
            for (m, &other) in ids.iter().enumerate() {
                if other == id || model[other].mesh.degenerate || share_vertex(&model[id], &model[other]) {
                    continue;
                }
                let closest = samples[1..samples.len() - 1]
                    .iter()
                    .map(|(_, p)| distance_to_polyline(*p, &polylines[m]))
                    .fold(f64::INFINITY, f64::min);
                if closest < threshold {
                    let (a, b) = if id < other { (id, other) } else { (other, id) };
                    if !pairs.iter().any(|(x, y, _)| *x == a && *y == b) {
                        pairs.push((a, b, closest));
                    }
                }
            }
        }
        pairs.sort_by(|x, y| x.0.cmp(&y.0).then(x.1.cmp(&y.1)));
        group_pairs(&pairs)
    }

    /// Mesh both sides of every zone: A provisionally, then B from A's points,
    /// then A again from B's final points.
    pub(crate) fn mesh_zones(
        &self,
        ws: &mut FaceWorkspace<'_>,
        discretizer: &EdgeDiscretizer<'_>,
        zones: Vec<ThinZone>,
    ) -> Result<(), MeshError> {
        let (ordered, forced) = order_zones(zones);
        if forced > 0 {
            let warning = format!("face {}: {forced} thin zones meshed out of order", ws.face);
            log::warn!("{warning}");
            ws.diagnostics.add_warning(warning);
        }
        for zone in &ordered {
            for &a in &zone.side_a.edges {
                discretizer.pre_mesh(ws, a);
            }
            for &b in &zone.side_b.edges {
                self.impose_from(ws, &zone.side_a.edges, b, zone.width);
                discretizer.discretize(ws, b)?;
            }
            for &a in &zone.side_a.edges {
                if ws.edge_data(a).state == EdgeMeshState::PreMeshed {
                    let data = ws.edge_data_mut(a);
                    data.cutting.clear();
                    data.state = EdgeMeshState::NotMeshed;
                }
                self.impose_from(ws, &zone.side_b.edges, a, zone.width);
                discretizer.discretize(ws, a)?;
            }
            ws.diagnostics.thin_zone_count += 1;
            log::debug!(
                "face {}: thin zone {:?} / {:?} width {:.3e}",
                ws.face,
                zone.side_a.edges,
                zone.side_b.edges,
                zone.width
            );
        }
        Ok(())
    }

    /// Project the cutting points of `from` onto `onto` and record them as
    /// imposed points. Segments of `onto` touching a vertex shared with the
    /// source edge are skipped.
    fn impose_from(&self, ws: &mut FaceWorkspace<'_>, from: &[EdgeId], onto: EdgeId, width: f64) {
        if ws.edge_data(onto).state.is_final() {
            return;
        }
        let model = ws.model;
        let target = &model[onto];
        let polyline = self.polyline(target, PROJECTION_SAMPLES);
        let radius = 2.0 * width.max(self.options.width_ratio * self.element_size);
        let (t0, t1) = target.boundary;
        let span = t1 - t0;
        let mut imposed = ws.edge_data(onto).imposed.clone();

        for &source_id in from {
            let source = &model[source_id];
            let source_span = source.boundary.1 - source.boundary.0;
            let skip_first = target.start == source.start || target.start == source.end;
            let skip_last = target.end == source.start || target.end == source.end;
            let points = ws.edge_data(source_id).cutting.clone();
            for p in points {
                let uv = self.scaled(source.curve.point_at(p.coordinate));
                let Some((dist, t)) = project_on_polyline(uv, &polyline, skip_first, skip_last) else {
                    continue;
                };
                if dist > radius || t <= t0 || t >= t1 {
                    continue;
                }
                let delta = if source_span > 0.0 { p.delta * span / source_span } else { p.delta };
                if imposed.iter().any(|q| (q.coordinate - t).abs() < delta.max(q.delta)) {
                    continue;
                }
                imposed.push(CuttingPoint::new(t, CuttingPointType::Imposed, delta));
            }
        }
        imposed.sort_by(|a, b| a.coordinate.total_cmp(&b.coordinate));
        ws.edge_data_mut(onto).imposed = imposed;
    }
}

/// Reference element size of a face: the largest admissible edge length when
/// set, otherwise the median metric gap of the grid cuts.
#[must_use]
pub fn element_size(face: &Face, cuts: [&[f64]; 2], max_edge_length: Option<f64>) -> f64 {
    if let Some(length) = max_edge_length.filter(|l| *l > 0.0) {
        return length;
    }
    let mut gaps: Vec<f64> = cuts
        .iter()
        .zip(face.tolerance_uv)
        .flat_map(|(cuts, tol_uv)| {
            let factor = if tol_uv > 0.0 { face.tolerance / tol_uv } else { 1.0 };
            cuts.windows(2).map(move |w| (w[1] - w[0]) * factor)
        })
        .collect();
    if gaps.is_empty() {
        return 0.0;
    }
    gaps.sort_by(f64::total_cmp);
    gaps[gaps.len() / 2]
}

fn share_vertex(a: &Edge, b: &Edge) -> bool {
    a.start == b.start || a.start == b.end || a.end == b.start || a.end == b.end
}

fn distance_to_polyline(p: UvPoint, polyline: &[(f64, UvPoint)]) -> f64 {
    polyline
        .windows(2)
        .map(|w| project_on_segment(p, w[0].1, w[1].1).0)
        .fold(f64::INFINITY, f64::min)
}

/// Distance and edge parameter of the closest projection of `p`.
fn project_on_polyline(
    p: UvPoint,
    polyline: &[(f64, UvPoint)],
    skip_first: bool,
    skip_last: bool,
) -> Option<(f64, f64)> {
    let last = polyline.len().checked_sub(2)?;
    polyline
        .windows(2)
        .enumerate()
        .filter(|(k, _)| !(skip_first && *k == 0) && !(skip_last && *k == last))
        .map(|(_, w)| {
            let (dist, s) = project_on_segment(p, w[0].1, w[1].1);
            (dist, w[0].0 + s * (w[1].0 - w[0].0))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
}

/// Zones from sorted `(a, b, width)` pairs. Pairs sharing an A edge form one
/// zone, and zones whose B sides overlap are merged.
fn group_pairs(pairs: &[(EdgeId, EdgeId, f64)]) -> Vec<ThinZone> {
    let mut zones: Vec<ThinZone> = Vec::new();
    for &(a, b, width) in pairs {
        if let Some(zone) = zones.iter_mut().find(|z| z.side_a.contains(a)) {
            if !zone.side_b.contains(b) {
                zone.side_b.edges.push(b);
            }
            zone.width = zone.width.min(width);
        } else {
            zones.push(ThinZone {
                side_a: ThinZoneSide { edges: vec![a] },
                side_b: ThinZoneSide { edges: vec![b] },
                width,
            });
        }
    }

    let mut merged: Vec<ThinZone> = Vec::new();
    for zone in zones {
        if let Some(target) = merged.iter_mut().find(|z| z.side_b.shares_edge(&zone.side_b)) {
            for e in zone.side_a.edges {
                if !target.side_a.contains(e) {
                    target.side_a.edges.push(e);
                }
            }
            for e in zone.side_b.edges {
                if !target.side_b.contains(e) {
                    target.side_b.edges.push(e);
                }
            }
            target.width = target.width.min(zone.width);
        } else {
            merged.push(zone);
        }
    }
    merged
}

/// Order zones so a side is never used as a source after it was constrained by
/// a later zone.
///
/// A zone waits while one of its A edges is the B side of another pending
/// zone. Passes repeat until one makes no progress; whatever is left is
/// appended in input order and counted as forced.
#[must_use]
pub fn order_zones(zones: Vec<ThinZone>) -> (Vec<ThinZone>, usize) {
    let mut pending = zones;
    let mut ordered = Vec::with_capacity(pending.len());
    loop {
        let claimed: BTreeSet<EdgeId> = pending.iter().flat_map(|z| z.side_b.edges.iter().copied()).collect();
        let (ready, waiting): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|z| !z.side_a.edges.iter().any(|e| claimed.contains(e) && !z.side_b.contains(*e)));
        let progressed = !ready.is_empty();
        ordered.extend(ready);
        pending = waiting;
        if pending.is_empty() {
            return (ordered, 0);
        }
        if !progressed {
            let forced = pending.len();
            ordered.extend(pending);
            return (ordered, forced);
        }
    }
}
