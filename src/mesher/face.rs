//! Per-face meshing pipeline.
//!
//! A face goes through `NotStarted → VerticesMeshed → EdgesDiscretized →
//! GridBuilt → Triangulated → Done`. Any failure stops the pipeline in one of
//! the terminal failure states and the face is still marked meshed, with an
//! empty mesh, so it is never retried.

use crate::geom::{
    CarrierSurface, ConstrainedTriangulation, IsoAxis, Point3, UvPoint, Vec3, triangulate_by_winding,
};
use crate::topo::{
    EdgeId, EdgeMeshData, Face, FaceId, FaceMeshState, TopoError, TopoModel, VertexId,
};

use super::config::MesherConfig;
use super::criteria::{face_crossings, select_cuts};
use super::diagnostics::FaceMeshDiagnostics;
use super::edge::EdgeDiscretizer;
use super::error::{MeshError, ensure};
use super::grid::SamplingGrid;
use super::mesh_model::{EdgeMesh, FaceMesh, MeshModel};
use super::metrics::{MeshMetrics, TimingBucket};
use super::thin_zone::{ThinZoneAnalyzer, element_size};
use super::workspace::FaceWorkspace;

/// Result of one face task, applied to the model by [`FaceMeshOutcome::commit`].
#[derive(Debug)]
pub struct FaceMeshOutcome {
    pub face: FaceId,
    pub state: FaceMeshState,
    /// `None` when the face had already been meshed.
    pub mesh: Option<FaceMesh>,
    pub has_thin_zones: bool,
    pub error: Option<MeshError>,
    pub diagnostics: FaceMeshDiagnostics,
    edges: Vec<(EdgeId, EdgeMeshData)>,
    vertices: Vec<(VertexId, u32)>,
}

impl FaceMeshOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == FaceMeshState::Done
    }

    /// Write discretized edges, vertex ids and the face state into `model`
    /// and append the meshes to `mesh`.
    ///
    /// Edges the model already holds as meshed are left untouched.
    pub fn commit(self, model: &mut TopoModel, mesh: &MeshModel) -> Result<FaceMeshDiagnostics, TopoError> {
        for (id, node) in self.vertices {
            let vertex = model.vertex_mut(id).ok_or(TopoError::UnknownVertex(id))?;
            if vertex.mesh_id.is_none() {
                vertex.mesh_id = Some(node);
            }
        }
        for (id, data) in self.edges {
            let edge = model.edge_mut(id).ok_or(TopoError::UnknownEdge(id))?;
            if edge.mesh.state.is_final() || !data.state.is_final() {
                continue;
            }
            mesh.push_edge_mesh(EdgeMesh {
                edge: Some(id),
                points: mesh.node_positions(&data.node_ids),
                node_ids: data.node_ids.clone(),
            });
            edge.mesh = data;
        }
        if let Some(face_mesh) = self.mesh {
            let face = model.face_mut(self.face).ok_or(TopoError::UnknownFace(self.face))?;
            face.state = self.state;
            face.meshed = true;
            face.has_thin_zones |= self.has_thin_zones;
            mesh.push_face_mesh(face_mesh);
        }
        Ok(self.diagnostics)
    }
}

/// Meshes single faces against a shared [`MeshModel`].
pub struct FaceMesher<'c> {
    config: &'c MesherConfig,
    mesh: &'c MeshModel,
}

impl<'c> FaceMesher<'c> {
    #[must_use]
    pub const fn new(config: &'c MesherConfig, mesh: &'c MeshModel) -> Self {
        Self { config, mesh }
    }

    /// Run the pipeline on `face` without touching `model`.
    ///
    /// Only an unknown face or surface is an error; every meshing failure is
    /// reported through the outcome state.
    pub fn mesh(&self, model: &TopoModel, face_id: FaceId) -> Result<FaceMeshOutcome, MeshError> {
        let face = model.face(face_id).ok_or(TopoError::UnknownFace(face_id))?;
        let surface = model.surface(face.surface).ok_or(TopoError::UnknownSurface(face.surface))?;
        if face.meshed {
            log::debug!("face {face_id} already meshed as {:?}", face.state);
            return Ok(FaceMeshOutcome {
                face: face_id,
                state: face.state,
                mesh: None,
                has_thin_zones: face.has_thin_zones,
                error: None,
                diagnostics: FaceMeshDiagnostics::new(),
                edges: Vec::new(),
                vertices: Vec::new(),
            });
        }

        let mut metrics = MeshMetrics::default();
        metrics.begin();
        let mut task = FaceTask {
            config: self.config,
            ws: FaceWorkspace::new(model, self.mesh, face_id),
            face,
            surface,
            state: FaceMeshState::NotStarted,
            has_thin_zones: false,
            planar: false,
        };
        let result = task.run(&mut metrics);
        let FaceTask { ws, state, has_thin_zones, planar, .. } = task;
        let (edges, vertices, mut diagnostics) = ws.into_parts();
        diagnostics.face_count = 1;
        diagnostics.timing = metrics.end();

        let (state, mesh, error) = match result {
            Ok(mesh) => {
                diagnostics.vertex_count = mesh.positions.len();
                diagnostics.triangle_count = mesh.triangle_count();
                if planar {
                    diagnostics.planar_face_count = 1;
                }
                log::debug!("face {face_id}: {}", diagnostics.summary());
                (state, mesh, None)
            }
            Err(err) => {
                let failed = err.face_state();
                log::warn!("face {face_id}: {err}; recorded as {failed:?}");
                diagnostics.add_warning(format!("face {face_id}: {err}"));
                if failed == FaceMeshState::Aborted {
                    diagnostics.aborted_face_count = 1;
                } else {
                    diagnostics.degenerate_face_count = 1;
                }
                (failed, FaceMesh::empty(face_id), Some(err))
            }
        };
        Ok(FaceMeshOutcome {
            face: face_id,
            state,
            mesh: Some(mesh),
            has_thin_zones,
            error,
            diagnostics,
            edges,
            vertices,
        })
    }
}

/// Mesh one face and commit the result immediately.
pub fn mesh_face(
    model: &mut TopoModel,
    face: FaceId,
    config: &MesherConfig,
    mesh: &MeshModel,
) -> Result<FaceMeshState, MeshError> {
    let outcome = FaceMesher::new(config, mesh).mesh(model, face)?;
    let state = outcome.state;
    outcome.commit(model, mesh)?;
    Ok(state)
}

/// Closed boundary polyline with the global node of each point.
#[derive(Debug, Default)]
struct BoundaryRing {
    uv: Vec<UvPoint>,
    ids: Vec<u32>,
}

/// Triangles over local vertices before orientation and culling.
#[derive(Debug, Default)]
struct RawMesh {
    uvs: Vec<UvPoint>,
    positions: Vec<Point3>,
    normals: Vec<Vec3>,
    global_ids: Vec<u32>,
    triangles: Vec<[usize; 3]>,
}

struct FaceTask<'a, 'c> {
    config: &'c MesherConfig,
    ws: FaceWorkspace<'a>,
    face: &'a Face,
    surface: &'a CarrierSurface,
    state: FaceMeshState,
    has_thin_zones: bool,
    planar: bool,
}

impl FaceTask<'_, '_> {
    fn advance(&mut self, next: FaceMeshState) -> Result<(), MeshError> {
        ensure!(self.state.can_advance_to(next), "face {} cannot go from {:?} to {next:?}", self.ws.face, self.state);
        log::trace!("face {}: {:?} -> {next:?}", self.ws.face, self.state);
        self.state = next;
        Ok(())
    }

    fn run(&mut self, metrics: &mut MeshMetrics) -> Result<FaceMesh, MeshError> {
        for id in self.face.edge_ids() {
            let edge = &self.ws.model[id];
            let (start, end) = (edge.start, edge.end);
            self.ws.vertex_mesh_id(start);
            self.ws.vertex_mesh_id(end);
        }
        self.advance(FaceMeshState::VerticesMeshed)?;

        self.planar = self.config.detect_planar && self.surface.is_planar();
        let mut grid = SamplingGrid::new(self.face.domain);
        if !self.planar {
            let (criteria, imposed) = self.cutting_parameters();
            grid.define_cutting_parameters(criteria, imposed);
            let (surface, tolerance_uv) = (self.surface, self.face.tolerance_uv);
            metrics.time(TimingBucket::Grid, || grid.generate_point_cloud(surface, tolerance_uv))?;
            self.ws.diagnostics.grid_node_count = grid.node_count();
        }

        self.discretize_edges(&grid, metrics)?;
        self.advance(FaceMeshState::EdgesDiscretized)?;
        let rings = self.boundary_rings()?;

        let raw = if self.planar {
            self.advance(FaceMeshState::GridBuilt)?;
            metrics.time(TimingBucket::Triangulation, || self.triangulate_planar(&rings))?
        } else {
            metrics.time(TimingBucket::Classification, || self.classify(&mut grid, &rings))?;
            self.advance(FaceMeshState::GridBuilt)?;
            metrics.time(TimingBucket::Triangulation, || self.triangulate_grid(&grid, &rings))?
        };
        self.advance(FaceMeshState::Triangulated)?;
        let mesh = self.finish(raw)?;
        self.advance(FaceMeshState::Done)?;
        Ok(mesh)
    }

    /// Criteria cuts per axis and the loop vertex coordinates imposed on the
    /// grid.
    fn cutting_parameters(&self) -> ([Vec<f64>; 2], [Vec<f64>; 2]) {
        let domain = self.face.domain;
        let criteria = IsoAxis::BOTH.map(|axis| {
            let crossings = face_crossings(
                self.surface,
                domain,
                axis,
                &self.config.criteria,
                self.config.iso_sample_lines,
                self.config.crossing_samples,
            );
            let (lo, hi) = domain.range(axis);
            select_cuts(&crossings, lo, hi, self.config.max_cuts_per_axis)
        });
        let mut imposed = [Vec::new(), Vec::new()];
        for id in self.face.edge_ids() {
            let edge = &self.ws.model[id];
            for t in [edge.boundary.0, edge.boundary.1] {
                let p = edge.curve.point_at(t);
                imposed[0].push(p.u);
                imposed[1].push(p.v);
            }
        }
        (criteria, imposed)
    }

    fn discretize_edges(&mut self, grid: &SamplingGrid, metrics: &mut MeshMetrics) -> Result<(), MeshError> {
        let cuts = [grid.cuts(IsoAxis::U), grid.cuts(IsoAxis::V)];
        let tolerance = self.config.edge_tolerance(self.face.tolerance);
        let discretizer = EdgeDiscretizer::new(self.config, self.surface, cuts, tolerance);

        if self.config.thin_zones.enabled {
            let size = element_size(self.face, cuts, self.config.criteria.max_edge_length);
            let analyzer = ThinZoneAnalyzer::new(self.config.thin_zones, self.face, size);
            let zones = analyzer.detect(self.ws.model, self.face);
            if !zones.is_empty() {
                self.has_thin_zones = true;
                let ws = &mut self.ws;
                metrics.time(TimingBucket::ThinZones, || analyzer.mesh_zones(ws, &discretizer, zones))?;
            }
        }

        let ws = &mut self.ws;
        let face = self.face;
        metrics.time(TimingBucket::EdgeDiscretization, || {
            face.edge_ids().try_for_each(|id| discretizer.discretize(ws, id))
        })
    }

    fn boundary_rings(&mut self) -> Result<Vec<BoundaryRing>, MeshError> {
        let model = self.ws.model;
        let face_id = self.ws.face;
        ensure!(self.face.loops.first().is_some_and(|l| l.external), "face {face_id} does not start with its external loop");
        let mut rings = Vec::with_capacity(self.face.loops.len());
        for (loop_index, lp) in self.face.loops.iter().enumerate() {
            let mut ring = BoundaryRing::default();
            for oe in &lp.edges {
                let data = self.ws.edge_data(oe.edge);
                ensure!(data.state.is_final(), "edge {} of face {face_id} is not meshed", oe.edge);
                ensure!(
                    data.node_ids.len() == data.cutting.len(),
                    "edge {} has {} nodes for {} cutting points",
                    oe.edge,
                    data.node_ids.len(),
                    data.cutting.len()
                );
                let mut points: Vec<(f64, u32)> =
                    data.cutting.iter().map(|p| p.coordinate).zip(data.node_ids.iter().copied()).collect();
                if !oe.is_forward() {
                    points.reverse();
                }
                points.pop();
                let curve = &model[oe.edge].curve;
                for (t, id) in points {
                    ring.uv.push(curve.point_at(t));
                    ring.ids.push(id);
                }
            }
            if ring.uv.len() < 3 {
                if lp.external {
                    return Err(MeshError::DegenerateLoop { loop_index, points: ring.uv.len() });
                }
                let warning = format!("face {face_id}: hole {loop_index} dropped with {} points", ring.uv.len());
                log::warn!("{warning}");
                self.ws.diagnostics.add_warning(warning);
                continue;
            }
            rings.push(ring);
        }
        Ok(rings)
    }

    fn classify(&mut self, grid: &mut SamplingGrid, rings: &[BoundaryRing]) -> Result<(), MeshError> {
        grid.set_loops(rings.iter().map(|r| r.uv.clone()).collect())?;
        let diagnostics = &mut self.ws.diagnostics;
        diagnostics.inside_node_count = grid.find_inner_face_points(self.config.vote_threshold());
        diagnostics.close_to_loop_node_count = grid.find_points_close_to_loop();
        diagnostics.too_close_node_count = grid.remove_points_close_to_loop(self.config.close_to_loop_ratio);
        Ok(())
    }

    fn vertex_normal(&self, uv: UvPoint) -> Vec3 {
        let domain = self.face.domain;
        let center = UvPoint::new(0.5 * (domain.u_min + domain.u_max), 0.5 * (domain.v_min + domain.v_max));
        self.surface
            .normal_at(uv)
            .or_else(|| self.surface.normal_at(uv.lerp(center, 1e-3)))
            .unwrap_or(Vec3::Z)
    }

    /// Local vertices of the boundary rings, with positions from the shared
    /// node registry so neighbouring faces agree exactly.
    fn boundary_vertices(&self, rings: &[BoundaryRing]) -> (RawMesh, Vec<Vec<usize>>) {
        let mut raw = RawMesh::default();
        let mut indices = Vec::with_capacity(rings.len());
        for ring in rings {
            let start = raw.uvs.len();
            for (uv, id) in ring.uv.iter().zip(&ring.ids) {
                raw.uvs.push(*uv);
                raw.positions.push(self.ws.mesh.node(*id).unwrap_or_else(|| self.surface.point_at(*uv)));
                raw.normals.push(self.vertex_normal(*uv));
                raw.global_ids.push(*id);
            }
            indices.push((start..raw.uvs.len()).collect());
        }
        (raw, indices)
    }

    /// Direct triangulation of the boundary in the parameter plane.
    fn triangulate_planar(&mut self, rings: &[BoundaryRing]) -> Result<RawMesh, MeshError> {
        let (mut raw, indices) = self.boundary_vertices(rings);
        raw.triangles = match ConstrainedTriangulation::from_rings(raw.uvs.clone(), &indices) {
            Ok(cdt) => cdt.into_parts().1,
            Err(err) => {
                log::debug!("face {}: constrained triangulation failed ({err}), using winding filter", self.ws.face);
                self.ws.diagnostics.winding_fallback_count += 1;
                triangulate_by_winding(&raw.uvs, &indices).map_err(|_| MeshError::EmptyTriangulation)?
            }
        };
        Ok(raw)
    }

    /// Triangulation of the boundary in scaled space followed by insertion of
    /// every grid node kept by the classification.
    fn triangulate_grid(&mut self, grid: &SamplingGrid, rings: &[BoundaryRing]) -> Result<RawMesh, MeshError> {
        let (mut raw, indices) = self.boundary_vertices(rings);
        let boundary: Vec<UvPoint> = raw.uvs.iter().map(|uv| grid.to_scaled(*uv)).collect();
        let nodes: Vec<usize> = grid.used_nodes().collect();

        let (triangles, inserted) = match ConstrainedTriangulation::from_rings(boundary.clone(), &indices) {
            Ok(mut cdt) => {
                let mut inserted = Vec::with_capacity(nodes.len());
                for &node in &nodes {
                    if let Some(vertex) = cdt.insert_point(grid.node_scaled(node)) {
                        inserted.push((vertex, node));
                    }
                }
                (cdt.into_parts().1, inserted)
            }
            Err(err) => {
                log::debug!("face {}: constrained triangulation failed ({err}), using winding filter", self.ws.face);
                self.ws.diagnostics.winding_fallback_count += 1;
                let mut points = boundary;
                let first = points.len();
                points.extend(nodes.iter().map(|n| grid.node_scaled(*n)));
                let triangles = triangulate_by_winding(&points, &indices).map_err(|_| MeshError::EmptyTriangulation)?;
                (triangles, nodes.iter().enumerate().map(|(k, n)| (first + k, *n)).collect())
            }
        };

        let positions: Vec<Point3> = inserted.iter().map(|(_, n)| grid.points()[*n]).collect();
        let first_id = self.ws.mesh.register_nodes(&positions);
        for (k, &(vertex, node)) in inserted.iter().enumerate() {
            ensure!(vertex == raw.uvs.len(), "inserted vertex {vertex} out of sequence");
            raw.uvs.push(grid.node_uv(node));
            raw.positions.push(positions[k]);
            let normal = grid.normals()[node];
            raw.normals.push(if normal.length_squared() > 0.0 { normal } else { self.vertex_normal(grid.node_uv(node)) });
            raw.global_ids.push(first_id + k as u32);
        }
        raw.triangles = triangles;
        Ok(raw)
    }

    /// Drop triangles collapsed onto one global node and orient the rest.
    fn finish(&mut self, raw: RawMesh) -> Result<FaceMesh, MeshError> {
        let back_facing = self.face.back_facing;
        let mut triangles = Vec::with_capacity(raw.triangles.len());
        for tri in &raw.triangles {
            ensure!(tri.iter().all(|i| *i < raw.uvs.len()), "triangle {tri:?} references a missing vertex");
            let [a, b, c] = tri.map(|i| raw.global_ids[i]);
            if a == b || b == c || a == c {
                self.ws.diagnostics.culled_triangle_count += 1;
                continue;
            }
            let mut out = tri.map(|i| i as u32);
            if back_facing {
                out.swap(1, 2);
            }
            triangles.push(out);
        }
        if triangles.is_empty() {
            return Err(MeshError::EmptyTriangulation);
        }
        let normals = if back_facing { raw.normals.into_iter().map(|n| -n).collect() } else { raw.normals };
        Ok(FaceMesh {
            face: Some(self.ws.face),
            positions: raw.positions,
            normals,
            uvs: raw.uvs,
            triangles,
            global_ids: raw.global_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{BezierSurface, Curve2d, CylinderSurface, UvDomain};
    use crate::topo::{EdgeMeshState, OrientedEdge};

    fn unit_patch() -> CarrierSurface {
        CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ))
    }

    fn square() -> [UvPoint; 4] {
        [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0), UvPoint::new(0.0, 1.0)]
    }

    #[test]
    fn planar_patch_gives_two_upward_triangles() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let f = model.add_polygon_face(s, &square(), &[]).unwrap();
        let mesh = MeshModel::new();
        let config = MesherConfig::default();

        let outcome = FaceMesher::new(&config, &mesh).mesh(&model, f).unwrap();
        assert_eq!(outcome.state, FaceMeshState::Done);
        assert_eq!(outcome.diagnostics.planar_face_count, 1);
        outcome.commit(&mut model, &mesh).unwrap();

        let face_mesh = mesh.face_mesh(f).unwrap();
        assert_eq!(face_mesh.triangle_count(), 2);
        for i in 0..2 {
            let n = face_mesh.triangle_normal(i).unwrap();
            assert!((n.z - 1.0).abs() < 1e-12);
        }
        assert!((face_mesh.area() - 1.0).abs() < 1e-12);
        assert!(model[f].meshed);
        assert_eq!(model[f].state, FaceMeshState::Done);
    }

    #[test]
    fn back_facing_flips_winding() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let f = model.add_polygon_face(s, &square(), &[]).unwrap();
        model.set_back_facing(f, true).unwrap();
        let mesh = MeshModel::new();
        assert_eq!(mesh_face(&mut model, f, &MesherConfig::default(), &mesh).unwrap(), FaceMeshState::Done);
        let face_mesh = mesh.face_mesh(f).unwrap();
        assert!(face_mesh.triangle_normal(0).unwrap().z < -0.99);
        assert!(face_mesh.normals.iter().all(|n| n.z < -0.99));
    }

    #[test]
    fn curved_face_uses_the_grid() {
        let mut model = TopoModel::new(1e-6);
        let cylinder = CylinderSurface::new(
            Point3::ORIGIN,
            Vec3::Z,
            Vec3::new(1.0, 0.0, 0.0),
            1.0,
            UvDomain::new(0.0, std::f64::consts::PI, 0.0, 1.0),
        )
        .unwrap();
        let s = model.add_surface(CarrierSurface::Cylinder(cylinder));
        let pi = std::f64::consts::PI;
        let f = model
            .add_polygon_face(
                s,
                &[UvPoint::new(0.0, 0.0), UvPoint::new(pi, 0.0), UvPoint::new(pi, 1.0), UvPoint::new(0.0, 1.0)],
                &[],
            )
            .unwrap();
        let mesh = MeshModel::new();
        let config = MesherConfig::default().with_max_edge_length(0.25);
        let outcome = FaceMesher::new(&config, &mesh).mesh(&model, f).unwrap();
        assert_eq!(outcome.state, FaceMeshState::Done, "{:?}", outcome.error);
        assert_eq!(outcome.diagnostics.planar_face_count, 0);
        assert!(outcome.diagnostics.grid_node_count > 4);
        let face_mesh = outcome.mesh.clone().unwrap();
        assert!(face_mesh.triangle_count() > 2);
        // Half cylinder of radius 1 and height 1; the chordal mesh is slightly smaller.
        let area = face_mesh.area();
        assert!(area < pi && area > 0.95 * pi, "area {area}");
        outcome.commit(&mut model, &mesh).unwrap();
        assert!(model[f].meshed);
    }

    #[test]
    fn meshed_face_is_not_meshed_again() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let f = model.add_polygon_face(s, &square(), &[]).unwrap();
        let mesh = MeshModel::new();
        let config = MesherConfig::default();
        mesh_face(&mut model, f, &config, &mesh).unwrap();
        let again = FaceMesher::new(&config, &mesh).mesh(&model, f).unwrap();
        assert!(again.mesh.is_none());
        again.commit(&mut model, &mesh).unwrap();
        assert_eq!(mesh.face_meshes().len(), 1);
    }

    #[test]
    fn unknown_face_is_an_error() {
        let model = TopoModel::new(1e-6);
        let mesh = MeshModel::new();
        let config = MesherConfig::default();
        let err = FaceMesher::new(&config, &mesh).mesh(&model, FaceId(3)).unwrap_err();
        assert_eq!(err, MeshError::Topo(TopoError::UnknownFace(FaceId(3))));
    }

    #[test]
    fn twin_meshed_without_points_falls_back_to_vertices() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        )));
        let left = [UvPoint::new(0.0, 0.0), UvPoint::new(0.5, 0.0), UvPoint::new(0.5, 1.0), UvPoint::new(0.0, 1.0)];
        let right = [UvPoint::new(0.5, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0), UvPoint::new(0.5, 1.0)];
        model.add_polygon_face(s, &left, &[]).unwrap();
        let b = model.add_polygon_face(s, &right, &[]).unwrap();
        let shared = model[b].edge_ids().find(|e| model[*e].twin.is_some()).unwrap();
        let twin = model[shared].twin.unwrap().edge;
        let data = &mut model.edge_mut(twin).unwrap().mesh;
        data.state = EdgeMeshState::Meshed;
        data.cutting.clear();
        data.node_ids.clear();

        let mesh = MeshModel::new();
        let config = MesherConfig::default();
        let outcome = FaceMesher::new(&config, &mesh).mesh(&model, b).unwrap();
        assert_eq!(outcome.state, FaceMeshState::Done, "{:?}", outcome.error);
        assert_eq!(outcome.diagnostics.virtually_meshed_edge_count, 1);
        assert!(outcome.diagnostics.warnings.iter().any(|w| w.contains(&format!("twin of edge {shared}"))));
        outcome.commit(&mut model, &mesh).unwrap();

        let edge = &model[shared];
        assert_eq!(edge.mesh.state, EdgeMeshState::VirtuallyMeshed);
        assert_eq!(edge.mesh.cutting.len(), 2);
        let ends: Vec<u32> = [edge.start, edge.end].iter().map(|v| model[*v].mesh_id.unwrap()).collect();
        assert_eq!(edge.mesh.node_ids, ends);
        // The empty twin is left as it was.
        assert!(model[twin].mesh.node_ids.is_empty());
    }

    #[test]
    fn two_edge_loop_is_a_degenerate_loop() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let a = model.add_vertex(Point3::new(0.0, 0.5, 0.0));
        let b = model.add_vertex(Point3::new(1.0, 0.5, 0.0));
        let base = model.add_edge(Curve2d::line(UvPoint::new(0.0, 0.5), UvPoint::new(1.0, 0.5)), a, b).unwrap();
        let arc = Curve2d::polyline(vec![UvPoint::new(1.0, 0.5), UvPoint::new(0.5, 1.0), UvPoint::new(0.0, 0.5)]).unwrap();
        let arc = model.add_edge(arc, b, a).unwrap();
        let f = model.add_face(s, vec![vec![OrientedEdge::forward(base), OrientedEdge::forward(arc)]]).unwrap();

        let mesh = MeshModel::new();
        let config = MesherConfig {
            thin_zones: crate::mesher::ThinZoneOptions { enabled: false, ..Default::default() },
            ..MesherConfig::default()
        };
        let outcome = FaceMesher::new(&config, &mesh).mesh(&model, f).unwrap();
        assert_eq!(outcome.state, FaceMeshState::DegenerateLoop);
        assert_eq!(outcome.error, Some(MeshError::DegenerateLoop { loop_index: 0, points: 2 }));
        assert_eq!(outcome.diagnostics.degenerate_face_count, 1);
        assert!(outcome.mesh.as_ref().is_some_and(FaceMesh::is_empty));

        outcome.commit(&mut model, &mesh).unwrap();
        assert!(model[f].meshed);
        assert_eq!(model[f].state, FaceMeshState::DegenerateLoop);
        assert!(mesh.face_mesh(f).unwrap().is_empty());
    }
}
