//! Discretization of bounded edges into cutting points and mesh nodes.

use crate::geom::{CarrierSurface, IsoAxis};
use crate::topo::{
    CuttingPoint, CuttingPointType, Edge, EdgeCrossings, EdgeId, EdgeMeshData, EdgeMeshState,
};

use super::config::MesherConfig;
use super::criteria::edge_crossings;
use super::cutting::{apply_spacing, find_crossings, merge_cutting_points};
use super::error::{MeshError, ensure};
use super::workspace::FaceWorkspace;

/// Merge deltas are this fraction of the admissible step.
const MERGE_FRACTION: f64 = 0.1;

/// Computes cutting points of the edges of one face.
pub struct EdgeDiscretizer<'c> {
    config: &'c MesherConfig,
    surface: &'c CarrierSurface,
    /// Grid cuts per axis, bounds included.
    cuts: [&'c [f64]; 2],
    tolerance: f64,
}

impl<'c> EdgeDiscretizer<'c> {
    #[must_use]
    pub fn new(config: &'c MesherConfig, surface: &'c CarrierSurface, cuts: [&'c [f64]; 2], tolerance: f64) -> Self {
        Self { config, surface, cuts, tolerance }
    }

    /// Parametric length of the edge matching the 3D tolerance.
    fn parameter_tolerance(&self, edge: &Edge) -> f64 {
        let span = edge.boundary.1 - edge.boundary.0;
        if edge.length > 0.0 { span * self.tolerance / edge.length } else { span * 1e-9 }
    }

    fn merge_delta(&self, edge: &Edge, crossings: &EdgeCrossings, t: f64) -> f64 {
        let span = edge.boundary.1 - edge.boundary.0;
        self.parameter_tolerance(edge).max(MERGE_FRACTION * crossings.delta_at(t).min(span))
    }

    /// Admissible steps along the edge.
    #[must_use]
    pub fn crossings(&self, edge: &Edge) -> EdgeCrossings {
        edge_crossings(self.surface, edge, &self.config.criteria, self.config.crossing_samples)
    }

    /// Parameters where the edge meets an interior iso line of the grid.
    #[must_use]
    pub fn iso_points(&self, edge: &Edge, crossings: &EdgeCrossings) -> Vec<CuttingPoint> {
        let (t0, t1) = edge.boundary;
        let mut out = Vec::new();
        for axis in IsoAxis::BOTH {
            let cuts = self.cuts[axis.index()];
            let kind = match axis {
                IsoAxis::U => CuttingPointType::IsoU,
                IsoAxis::V => CuttingPointType::IsoV,
            };
            for &c in cuts.iter().skip(1).take(cuts.len().saturating_sub(2)) {
                let roots = find_crossings(t0, t1, self.config.crossing_samples, |t| {
                    edge.curve.point_at(t).coordinate(axis) - c
                });
                out.extend(roots.into_iter().map(|t| CuttingPoint::new(t, kind, self.merge_delta(edge, crossings, t))));
            }
        }
        out
    }

    /// Ordered cutting points of an edge from its vertices, imposed points and
    /// iso crossings, spaced to honour the criteria.
    ///
    /// Degenerate edges, and closed edges too coarse to hold an interior point,
    /// skip the spacing pass and get a midpoint when only the endpoints exist.
    #[must_use]
    pub fn cutting_points(&self, edge: &Edge, data: &EdgeMeshData) -> (Vec<CuttingPoint>, EdgeCrossings) {
        let crossings = self.crossings(edge);
        let (t0, t1) = edge.boundary;
        let mut imposed = vec![
            CuttingPoint::new(t0, CuttingPointType::Vertex, self.merge_delta(edge, &crossings, t0)),
            CuttingPoint::new(t1, CuttingPointType::Vertex, self.merge_delta(edge, &crossings, t1)),
        ];
        imposed.extend(data.imposed.iter().filter(|p| p.coordinate > t0 && p.coordinate < t1).copied());
        if !data.degenerate {
            imposed.extend(self.iso_points(edge, &crossings));
        }
        let merged = merge_cutting_points(imposed);

        let spaced = if data.degenerate {
            merged
        } else {
            let spaced = apply_spacing(&merged, &crossings, self.config.max_cuts_per_axis, |t| {
                self.merge_delta(edge, &crossings, t)
            });
            if edge.is_closed() && spaced.len() < 3 { merged } else { spaced }
        };
        let out = if spaced.len() == 2 && (data.degenerate || edge.is_closed()) {
            let mid = 0.5 * (t0 + t1);
            vec![spaced[0], CuttingPoint::new(mid, CuttingPointType::Other, spaced[0].delta), spaced[1]]
        } else {
            spaced
        };
        (out, crossings)
    }

    /// Store provisional cutting points without mesh nodes.
    pub(crate) fn pre_mesh(&self, ws: &mut FaceWorkspace<'_>, id: EdgeId) {
        let model = ws.model;
        let edge = &model[id];
        if ws.edge_data(id).state.is_final() {
            return;
        }
        let (cutting, crossings) = self.cutting_points(edge, ws.edge_data(id));
        let data = ws.edge_data_mut(id);
        data.cutting = cutting;
        data.crossings = Some(crossings);
        data.state = EdgeMeshState::PreMeshed;
    }

    /// Final discretization of an edge, reusing the twin edge when it is
    /// already meshed. Idempotent on meshed edges.
    pub(crate) fn discretize(&self, ws: &mut FaceWorkspace<'_>, id: EdgeId) -> Result<(), MeshError> {
        if ws.edge_data(id).state.is_final() {
            return Ok(());
        }
        let model = ws.model;
        let edge = &model[id];
        let start_id = ws.vertex_mesh_id(edge.start);
        let end_id = ws.vertex_mesh_id(edge.end);

        if let Some(link) = edge.twin {
            if ws.edge_data(link.edge).state.is_final() {
                return self.transfer_from_twin(ws, id, start_id, end_id);
            }
        }

        let (cutting, crossings) = self.cutting_points(edge, ws.edge_data(id));
        ensure!(cutting.len() >= 2, "edge {id} lost its endpoints");
        ensure!(
            cutting.windows(2).all(|w| w[0].coordinate < w[1].coordinate),
            "cutting points of edge {id} are not increasing"
        );

        let degenerate = ws.edge_data(id).degenerate;
        let node_ids = if degenerate {
            let mid = 0.5 * (edge.boundary.0 + edge.boundary.1);
            cutting.iter().map(|p| if p.coordinate <= mid { start_id } else { end_id }).collect()
        } else {
            let interior: Vec<_> = cutting[1..cutting.len() - 1]
                .iter()
                .map(|p| self.surface.point_at(edge.curve.point_at(p.coordinate)))
                .collect();
            let first = ws.mesh.register_nodes(&interior);
            let mut ids = Vec::with_capacity(cutting.len());
            ids.push(start_id);
            ids.extend((0..interior.len() as u32).map(|k| first + k));
            ids.push(end_id);
            ids
        };

        log::trace!("edge {id}: {} cutting points", cutting.len());
        ws.diagnostics.cutting_point_count += cutting.len();
        if degenerate {
            ws.diagnostics.virtually_meshed_edge_count += 1;
        }
        let data = ws.edge_data_mut(id);
        data.cutting = cutting;
        data.crossings = Some(crossings);
        data.node_ids = node_ids;
        data.state = if degenerate { EdgeMeshState::VirtuallyMeshed } else { EdgeMeshState::Meshed };
        Ok(())
    }

    fn transfer_from_twin(
        &self,
        ws: &mut FaceWorkspace<'_>,
        id: EdgeId,
        start_id: u32,
        end_id: u32,
    ) -> Result<(), MeshError> {
        let model = ws.model;
        let edge = &model[id];
        let Some(link) = edge.twin else {
            return Ok(());
        };
        let twin = &model[link.edge];
        let twin_data = ws.edge_data(link.edge).clone();

        if twin_data.cutting.is_empty() {
            let err = MeshError::InconsistentTwin(id);
            log::warn!("{err}; edge falls back to its vertices");
            ws.diagnostics.add_warning(err.to_string());
            ws.diagnostics.virtually_meshed_edge_count += 1;
            let (t0, t1) = edge.boundary;
            let delta = self.parameter_tolerance(edge);
            let mut cutting = vec![
                CuttingPoint::new(t0, CuttingPointType::Vertex, delta),
                CuttingPoint::new(t1, CuttingPointType::Vertex, delta),
            ];
            let mut node_ids = vec![start_id, end_id];
            if edge.is_closed() {
                cutting.insert(1, CuttingPoint::new(0.5 * (t0 + t1), CuttingPointType::Other, delta));
                node_ids.insert(1, start_id);
            }
            let data = ws.edge_data_mut(id);
            data.cutting = cutting;
            data.node_ids = node_ids;
            data.state = EdgeMeshState::VirtuallyMeshed;
            return Ok(());
        }

        let last = twin_data.cutting.len() - 1;
        let mut cutting: Vec<CuttingPoint> = twin_data
            .cutting
            .iter()
            .enumerate()
            .map(|(k, p)| {
                let coordinate = twin.map_to_twin(p.coordinate, edge, link.same_direction);
                let kind = if k == 0 || k == last { CuttingPointType::Vertex } else { CuttingPointType::Imposed };
                let mut point = CuttingPoint::new(coordinate, kind, p.delta);
                point.opposite_nodes = [twin_data.node_ids.get(k).copied(), None];
                point
            })
            .collect();
        let mut node_ids = propagate_ids(&twin_data.node_ids, cutting.len());
        if node_ids.len() != twin_data.node_ids.len() {
            log::warn!("edge {id}: twin id list padded to {} entries", node_ids.len());
            ws.diagnostics.padded_edge_count += 1;
        }
        if !link.same_direction {
            cutting.reverse();
            node_ids.reverse();
        }
        // Snap the endpoints onto this edge's own boundary.
        cutting[0].coordinate = edge.boundary.0;
        cutting[last].coordinate = edge.boundary.1;
        ensure!(
            cutting.windows(2).all(|w| w[0].coordinate < w[1].coordinate),
            "twin transfer onto edge {id} is not increasing"
        );
        ensure!(
            node_ids.first() == Some(&start_id) && node_ids.last() == Some(&end_id),
            "twin of edge {id} ends on different vertices"
        );

        ws.diagnostics.cutting_point_count += cutting.len();
        let state = twin_data.state;
        if state == EdgeMeshState::VirtuallyMeshed {
            ws.diagnostics.virtually_meshed_edge_count += 1;
        }
        log::trace!("edge {id}: {} points taken from twin {}", cutting.len(), link.edge);
        let data = ws.edge_data_mut(id);
        data.cutting = cutting;
        data.node_ids = node_ids;
        data.state = state;
        Ok(())
    }
}

/// Reuse `ids` for a list of `len` points, repeating the last id when the new
/// list is longer.
#[must_use]
pub fn propagate_ids(ids: &[u32], len: usize) -> Vec<u32> {
    let mut out: Vec<u32> = ids.iter().take(len).copied().collect();
    if let Some(&last) = ids.last() {
        out.resize(len, last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{BezierSurface, Curve2d, Point3, UvPoint};
    use crate::mesher::MeshModel;
    use crate::topo::{TopoModel, VertexId};

    fn unit_patch() -> CarrierSurface {
        CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ))
    }

    fn edge(from: UvPoint, to: UvPoint) -> Edge {
        Edge {
            curve: Curve2d::line(from, to),
            boundary: (0.0, 1.0),
            start: VertexId(0),
            end: VertexId(1),
            face: None,
            twin: None,
            length: from.distance_to(to),
            mesh: EdgeMeshData::default(),
        }
    }

    #[test]
    fn diagonal_edge_picks_up_iso_crossings() {
        let config = MesherConfig::default();
        let surface = unit_patch();
        let cuts = [0.0, 0.5, 1.0];
        let discretizer = EdgeDiscretizer::new(&config, &surface, [&cuts, &cuts], 1e-6);
        let e = edge(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.5));
        let (points, _) = discretizer.cutting_points(&e, &e.mesh);
        let coords: Vec<f64> = points.iter().map(|p| p.coordinate).collect();
        // u = 0.5 at t = 0.5 and v never reaches 0.5 in the interior.
        assert_eq!(coords.len(), 3);
        assert!((coords[1] - 0.5).abs() < 1e-12);
        assert_eq!(points[1].kind, CuttingPointType::IsoU);
        assert_eq!(coords[0], 0.0);
        assert_eq!(coords[2], 1.0);
    }

    #[test]
    fn size_criterion_spaces_points() {
        let config = MesherConfig::default().with_max_edge_length(0.25);
        let surface = unit_patch();
        let cuts = [0.0, 1.0];
        let discretizer = EdgeDiscretizer::new(&config, &surface, [&cuts, &cuts], 1e-6);
        let e = edge(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0));
        let (points, _) = discretizer.cutting_points(&e, &e.mesh);
        assert_eq!(points.len(), 5);
        assert!(points.windows(2).all(|w| w[0].coordinate < w[1].coordinate));
    }

    #[test]
    fn degenerate_edge_gets_midpoint_and_split_ids() {
        let config = MesherConfig::default();
        let surface = unit_patch();
        let cuts = [0.0, 1.0];
        let discretizer = EdgeDiscretizer::new(&config, &surface, [&cuts, &cuts], 1e-6);

        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(surface.clone());
        let f = model
            .add_polygon_face(s, &[UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0)], &[])
            .unwrap();
        let id = model[f].loops[0].edges[0].edge;
        model.edge_mut(id).unwrap().mesh.degenerate = true;

        let mesh = MeshModel::new();
        let mut ws = FaceWorkspace::new(&model, &mesh, f);
        discretizer.discretize(&mut ws, id).unwrap();
        let data = ws.edge_data(id);
        assert_eq!(data.cutting.len(), 3);
        assert_eq!(data.state, EdgeMeshState::VirtuallyMeshed);
        let (a, b) = (data.node_ids[0], data.node_ids[2]);
        assert_eq!(data.node_ids, vec![a, a, b]);
    }

    #[test]
    fn twin_edge_reuses_reversed_ids() {
        let config = MesherConfig::default().with_max_edge_length(0.25);
        let mut model = TopoModel::new(1e-6);
        let left = model.add_surface(unit_patch());
        let right = model.add_surface(CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        )));
        let square = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0), UvPoint::new(0.0, 1.0)];
        let fa = model.add_polygon_face(left, &square, &[]).unwrap();
        let fb = model.add_polygon_face(right, &square, &[]).unwrap();
        let shared_b = model[fb].edge_ids().find(|e| model[*e].twin.is_some()).unwrap();
        let shared_a = model[shared_b].twin.unwrap().edge;

        let mesh = MeshModel::new();
        let cuts = [0.0, 1.0];
        let surface_a = model[left].clone();
        let mut ws = FaceWorkspace::new(&model, &mesh, fa);
        EdgeDiscretizer::new(&config, &surface_a, [&cuts, &cuts], 1e-6).discretize(&mut ws, shared_a).unwrap();
        let a_data = ws.edge_data(shared_a).clone();
        let (a_updates, vertex_ids, _) = ws.into_parts();

        let mut model_b = model.clone();
        for (e, data) in a_updates {
            model_b.edge_mut(e).unwrap().mesh = data;
        }
        for (v, id) in vertex_ids {
            model_b.vertex_mut(v).unwrap().mesh_id = Some(id);
        }
        let surface_b = model_b[right].clone();
        let mut ws = FaceWorkspace::new(&model_b, &mesh, fb);
        EdgeDiscretizer::new(&config, &surface_b, [&cuts, &cuts], 1e-6).discretize(&mut ws, shared_b).unwrap();
        let b_data = ws.edge_data(shared_b);

        let mut reversed = a_data.node_ids.clone();
        reversed.reverse();
        assert_eq!(b_data.node_ids, reversed);
        assert_eq!(b_data.cutting.len(), a_data.cutting.len());
        assert!(b_data.cutting.windows(2).all(|w| w[0].coordinate < w[1].coordinate));
    }

    #[test]
    fn coarse_tolerance_fuses_iso_points() {
        let surface = unit_patch();
        let cuts = [0.0, 0.25, 0.5, 0.75, 1.0];
        let e = edge(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0));

        let fine = MesherConfig::default();
        let discretizer = EdgeDiscretizer::new(&fine, &surface, [&cuts, &cuts], fine.edge_tolerance(1e-6));
        let (points, _) = discretizer.cutting_points(&e, &e.mesh);
        assert_eq!(points.len(), 5);

        // 0.25 folds into the start vertex, 0.5 and 0.75 average.
        let coarse = MesherConfig { geometric_tolerance: 0.3, ..MesherConfig::default() };
        let discretizer = EdgeDiscretizer::new(&coarse, &surface, [&cuts, &cuts], coarse.edge_tolerance(1e-6));
        let (points, _) = discretizer.cutting_points(&e, &e.mesh);
        let coords: Vec<f64> = points.iter().map(|p| p.coordinate).collect();
        assert_eq!(coords, vec![0.0, 0.625, 1.0]);
        assert_eq!(points[0].kind, CuttingPointType::Vertex);
        assert_eq!(points[1].kind, CuttingPointType::IsoU);
        assert_eq!(points[2].kind, CuttingPointType::Vertex);
    }

    #[test]
    fn ids_are_padded_with_the_last_one() {
        assert_eq!(propagate_ids(&[1, 2, 3], 5), vec![1, 2, 3, 3, 3]);
        assert_eq!(propagate_ids(&[1, 2, 3], 2), vec![1, 2]);
        assert!(propagate_ids(&[], 2).is_empty());
    }
}
