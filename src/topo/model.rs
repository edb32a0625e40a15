use std::ops::Index;

use crate::geom::{CarrierSurface, Curve2d, DerivativeOrder, Point3, UvDomain, UvPoint};

use super::{
    Edge, EdgeId, EdgeMeshData, Face, FaceId, FaceMeshState, Loop, OrientedEdge, SurfaceId,
    TopoError, TwinLink, Vertex, VertexId,
};

/// Samples used to estimate edge length and face bounds.
const EDGE_SAMPLES: usize = 16;
/// Samples per axis used to derive parametric tolerances.
const GRADIENT_SAMPLES: usize = 5;

/// Arena owning every surface, vertex, edge and face of a model.
#[derive(Debug, Clone)]
pub struct TopoModel {
    surfaces: Vec<CarrierSurface>,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    tolerance: f64,
}

impl Default for TopoModel {
    fn default() -> Self {
        Self::new(1e-6)
    }
}

impl TopoModel {
    /// Empty model with the given 3D geometric tolerance.
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self {
            surfaces: Vec::new(),
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            tolerance: if tolerance.is_finite() && tolerance > 0.0 { tolerance } else { 1e-6 },
        }
    }

    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn add_surface(&mut self, surface: CarrierSurface) -> SurfaceId {
        self.surfaces.push(surface);
        SurfaceId(self.surfaces.len() - 1)
    }

    pub fn add_vertex(&mut self, point: Point3) -> VertexId {
        self.vertices.push(Vertex { point, mesh_id: None });
        VertexId(self.vertices.len() - 1)
    }

    /// Vertex within tolerance of `point`, created if none exists.
    pub fn weld_vertex(&mut self, point: Point3) -> VertexId {
        self.vertices
            .iter()
            .position(|v| v.point.distance_to(point) <= self.tolerance)
            .map_or_else(|| self.add_vertex(point), VertexId)
    }

    /// Edge over the whole natural domain of `curve`.
    pub fn add_edge(&mut self, curve: Curve2d, start: VertexId, end: VertexId) -> Result<EdgeId, TopoError> {
        let boundary = curve.domain();
        self.add_bounded_edge(curve, boundary, start, end)
    }

    pub fn add_bounded_edge(
        &mut self,
        curve: Curve2d,
        boundary: (f64, f64),
        start: VertexId,
        end: VertexId,
    ) -> Result<EdgeId, TopoError> {
        for v in [start, end] {
            if v.0 >= self.vertices.len() {
                return Err(TopoError::UnknownVertex(v));
            }
        }
        let (t0, t1) = boundary;
        if !(t0.is_finite() && t1.is_finite() && t1 > t0) {
            return Err(TopoError::InvalidBoundary(t0, t1));
        }
        self.edges.push(Edge {
            curve,
            boundary,
            start,
            end,
            face: None,
            twin: None,
            length: 0.0,
            mesh: EdgeMeshData::default(),
        });
        Ok(EdgeId(self.edges.len() - 1))
    }

    /// Create a face bounded by `loops`; the first loop is the external one.
    ///
    /// Every edge must be unused and consecutive edges of a loop must share
    /// their vertices. Edge lengths, degeneracy flags, the parametric domain and
    /// the parametric tolerances are computed here.
    pub fn add_face(&mut self, surface: SurfaceId, loops: Vec<Vec<OrientedEdge>>) -> Result<FaceId, TopoError> {
        let carrier = self.surfaces.get(surface.0).ok_or(TopoError::UnknownSurface(surface))?;
        if loops.first().is_none_or(Vec::is_empty) {
            return Err(TopoError::MissingExternalLoop);
        }
        for (loop_index, chain) in loops.iter().enumerate() {
            for oe in chain {
                let edge = self.edges.get(oe.edge.0).ok_or(TopoError::UnknownEdge(oe.edge))?;
                if edge.face.is_some() {
                    return Err(TopoError::EdgeInUse(oe.edge));
                }
            }
            for (position, pair) in chain.iter().zip(chain.iter().cycle().skip(1)).enumerate() {
                let (a, b) = pair;
                if a.last_vertex(&self.edges[a.edge.0]) != b.first_vertex(&self.edges[b.edge.0]) {
                    return Err(TopoError::OpenLoop { loop_index, position });
                }
            }
        }

        let mut samples = Vec::new();
        let mut lengths = Vec::new();
        for oe in loops.iter().flatten() {
            let edge = &self.edges[oe.edge.0];
            let uv = sample_edge(edge);
            let length = uv
                .windows(2)
                .map(|w| carrier.point_at(w[0]).distance_to(carrier.point_at(w[1])))
                .sum::<f64>();
            lengths.push((oe.edge, length));
            samples.extend(uv);
        }
        let surface_domain = carrier.domain();
        let domain = UvDomain::from_points(samples)
            .and_then(|d| d.intersect(surface_domain))
            .unwrap_or(surface_domain);
        let tolerance_uv = parametric_tolerance(carrier, domain, self.tolerance);

        let id = FaceId(self.faces.len());
        for (edge_id, length) in lengths {
            let edge = &mut self.edges[edge_id.0];
            edge.face = Some(id);
            edge.length = length;
            edge.mesh.degenerate = length <= self.tolerance;
        }
        let loops = loops
            .into_iter()
            .enumerate()
            .map(|(i, edges)| Loop { edges, external: i == 0 })
            .collect();
        self.faces.push(Face {
            surface,
            loops,
            domain,
            tolerance: self.tolerance,
            tolerance_uv,
            back_facing: false,
            has_thin_zones: false,
            state: FaceMeshState::NotStarted,
            meshed: false,
        });
        log::debug!("added face {id} on {} surface", self.surfaces[surface.0].kind());
        Ok(id)
    }

    /// Face whose loops are straight parametric polygons. Corners are welded
    /// onto existing vertices and edges joining two vertices already joined by
    /// an edge of another face become twins.
    pub fn add_polygon_face(
        &mut self,
        surface: SurfaceId,
        outer: &[UvPoint],
        holes: &[Vec<UvPoint>],
    ) -> Result<FaceId, TopoError> {
        let carrier = self.surfaces.get(surface.0).ok_or(TopoError::UnknownSurface(surface))?.clone();
        let mut loops = Vec::with_capacity(holes.len() + 1);
        let mut new_edges = Vec::new();
        for ring in std::iter::once(outer).chain(holes.iter().map(Vec::as_slice)) {
            if ring.len() < 3 {
                return Err(TopoError::InvalidPolygon("rings need at least three corners"));
            }
            let ids: Vec<VertexId> = ring.iter().map(|uv| self.weld_vertex(carrier.point_at(*uv))).collect();
            let mut chain = Vec::with_capacity(ring.len());
            for i in 0..ring.len() {
                let j = (i + 1) % ring.len();
                if ids[i] == ids[j] {
                    continue;
                }
                let edge = self.add_edge(Curve2d::line(ring[i], ring[j]), ids[i], ids[j])?;
                chain.push(OrientedEdge::forward(edge));
                new_edges.push(edge);
            }
            if chain.len() < 2 {
                return Err(TopoError::InvalidPolygon("ring collapses onto a single vertex"));
            }
            loops.push(chain);
        }
        let face = self.add_face(surface, loops)?;
        for edge in new_edges {
            let (start, end) = (self.edges[edge.0].start, self.edges[edge.0].end);
            let partner = self.edges.iter().position(|e| {
                e.twin.is_none()
                    && e.face.is_some_and(|f| f != face)
                    && ((e.start == start && e.end == end) || (e.start == end && e.end == start))
            });
            if let Some(other) = partner {
                self.link_twins(EdgeId(other), edge)?;
            }
        }
        Ok(face)
    }

    /// Declare `a` and `b` as the two sides of one model edge.
    pub fn link_twins(&mut self, a: EdgeId, b: EdgeId) -> Result<(), TopoError> {
        let ea = self.edges.get(a.0).ok_or(TopoError::UnknownEdge(a))?;
        let eb = self.edges.get(b.0).ok_or(TopoError::UnknownEdge(b))?;
        if ea.twin.is_some() || a == b {
            return Err(TopoError::TwinAlreadyLinked(a));
        }
        if eb.twin.is_some() {
            return Err(TopoError::TwinAlreadyLinked(b));
        }
        let same = ea.start == eb.start && ea.end == eb.end;
        let opposite = ea.start == eb.end && ea.end == eb.start;
        let same_direction = match (same, opposite) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.closed_twins_same_direction(ea, eb),
            (false, false) => return Err(TopoError::TwinVertexMismatch(a, b)),
        };
        self.edges[a.0].twin = Some(TwinLink { edge: b, same_direction });
        self.edges[b.0].twin = Some(TwinLink { edge: a, same_direction });
        Ok(())
    }

    fn closed_twins_same_direction(&self, a: &Edge, b: &Edge) -> bool {
        let quarter = |e: &Edge| e.boundary.0 + 0.25 * (e.boundary.1 - e.boundary.0);
        let (Some(pa), Some(pb_same), Some(pb_opp)) = (
            self.edge_point_on(a, quarter(a)),
            self.edge_point_on(b, quarter(b)),
            self.edge_point_on(b, b.boundary.1 - 0.25 * (b.boundary.1 - b.boundary.0)),
        ) else {
            return true;
        };
        pa.distance_to(pb_same) <= pa.distance_to(pb_opp)
    }

    pub fn set_back_facing(&mut self, face: FaceId, back_facing: bool) -> Result<(), TopoError> {
        let f = self.faces.get_mut(face.0).ok_or(TopoError::UnknownFace(face))?;
        f.back_facing = back_facing;
        Ok(())
    }

    /// Forget the mesh of one face so it can be meshed again.
    pub fn reset_face_mesh(&mut self, face: FaceId) -> Result<(), TopoError> {
        let f = self.faces.get_mut(face.0).ok_or(TopoError::UnknownFace(face))?;
        f.state = FaceMeshState::NotStarted;
        f.meshed = false;
        f.has_thin_zones = false;
        let edges: Vec<EdgeId> = f.edge_ids().collect();
        for e in edges {
            let mesh = &mut self.edges[e.0].mesh;
            *mesh = EdgeMeshData { degenerate: mesh.degenerate, ..EdgeMeshData::default() };
        }
        Ok(())
    }

    /// Forget every mesh id, edge discretization and face state.
    pub fn reset_mesh(&mut self) {
        for v in &mut self.vertices {
            v.mesh_id = None;
        }
        for e in &mut self.edges {
            e.mesh = EdgeMeshData { degenerate: e.mesh.degenerate, ..EdgeMeshData::default() };
        }
        for f in &mut self.faces {
            f.state = FaceMeshState::NotStarted;
            f.meshed = false;
            f.has_thin_zones = false;
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn surface(&self, id: SurfaceId) -> Option<&CarrierSurface> {
        self.surfaces.get(id.0)
    }

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0)
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    #[must_use]
    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id.0)
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id.0)
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id.0)
    }

    pub(crate) fn face_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.faces.get_mut(id.0)
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        (0..self.faces.len()).map(FaceId)
    }

    fn edge_point_on(&self, edge: &Edge, t: f64) -> Option<Point3> {
        let face = edge.face?;
        let surface = self.surfaces.get(self.faces[face.0].surface.0)?;
        Some(surface.point_at(edge.curve.point_at(t)))
    }
}

impl Index<SurfaceId> for TopoModel {
    type Output = CarrierSurface;

    fn index(&self, id: SurfaceId) -> &CarrierSurface {
        &self.surfaces[id.0]
    }
}

impl Index<VertexId> for TopoModel {
    type Output = Vertex;

    fn index(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }
}

impl Index<EdgeId> for TopoModel {
    type Output = Edge;

    fn index(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }
}

impl Index<FaceId> for TopoModel {
    type Output = Face;

    fn index(&self, id: FaceId) -> &Face {
        &self.faces[id.0]
    }
}

fn sample_edge(edge: &Edge) -> Vec<UvPoint> {
    let (t0, t1) = edge.boundary;
    let mut params: Vec<f64> = (0..=EDGE_SAMPLES).map(|i| t0 + (t1 - t0) * i as f64 / EDGE_SAMPLES as f64).collect();
    params.extend(edge.curve.breaks().into_iter().filter(|b| *b > t0 && *b < t1));
    params.sort_by(f64::total_cmp);
    params.into_iter().map(|t| edge.curve.point_at(t)).collect()
}

/// Parametric step per axis whose image stays below `tolerance` in model space.
fn parametric_tolerance(surface: &CarrierSurface, domain: UvDomain, tolerance: f64) -> [f64; 2] {
    let mut max_speed = [0.0_f64; 2];
    let n = GRADIENT_SAMPLES - 1;
    for i in 0..=n {
        for j in 0..=n {
            let u = domain.u_min + domain.span(crate::geom::IsoAxis::U) * i as f64 / n as f64;
            let v = domain.v_min + domain.span(crate::geom::IsoAxis::V) * j as f64 / n as f64;
            if let Some([du, dv]) = surface.evaluate(u, v, DerivativeOrder::One).gradient {
                max_speed[0] = max_speed[0].max(du.length());
                max_speed[1] = max_speed[1].max(dv.length());
            }
        }
    }
    max_speed.map(|s| if s > f64::EPSILON { tolerance / s } else { tolerance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::BezierSurface;

    fn unit_patch() -> CarrierSurface {
        CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ))
    }

    fn square() -> Vec<UvPoint> {
        vec![UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0), UvPoint::new(0.0, 1.0)]
    }

    #[test]
    fn polygon_face_builds_closed_loop() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let f = model.add_polygon_face(s, &square(), &[]).unwrap();
        let face = &model[f];
        assert_eq!(face.loops.len(), 1);
        assert_eq!(face.loops[0].edges.len(), 4);
        assert!(face.loops[0].external);
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(face.domain, UvDomain::new(0.0, 1.0, 0.0, 1.0));
        for e in face.edge_ids() {
            assert!((model[e].length - 1.0).abs() < 1e-9);
            assert!(!model[e].mesh.degenerate);
        }
        assert!((face.tolerance_uv[0] - 1e-6).abs() < 1e-12);
    }

    #[test]
    fn adjacent_polygons_share_vertices_and_twin_edges() {
        let mut model = TopoModel::new(1e-6);
        let left = model.add_surface(unit_patch());
        let right = model.add_surface(CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.5),
        )));
        model.add_polygon_face(left, &square(), &[]).unwrap();
        let f = model.add_polygon_face(right, &square(), &[]).unwrap();
        assert_eq!(model.vertex_count(), 6);
        let twinned: Vec<_> = model[f].edge_ids().filter_map(|e| model[e].twin).collect();
        assert_eq!(twinned.len(), 1);
        assert!(!twinned[0].same_direction);
    }

    #[test]
    fn open_loop_is_rejected() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let a = model.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = model.add_vertex(Point3::new(1.0, 1.0, 0.0));
        let e0 = model.add_edge(Curve2d::line(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0)), a, b).unwrap();
        let e1 = model.add_edge(Curve2d::line(UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0)), b, c).unwrap();
        let err = model
            .add_face(s, vec![vec![OrientedEdge::forward(e0), OrientedEdge::forward(e1)]])
            .unwrap_err();
        assert_eq!(err, TopoError::OpenLoop { loop_index: 0, position: 1 });
    }

    #[test]
    fn edge_cannot_bound_two_faces() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let f = model.add_polygon_face(s, &square(), &[]).unwrap();
        let loops = vec![model[f].loops[0].edges.clone()];
        assert!(matches!(model.add_face(s, loops), Err(TopoError::EdgeInUse(_))));
    }

    #[test]
    fn collapsed_edge_is_flagged_degenerate() {
        // Triangle patch: the whole v = 1 side collapses onto one pole.
        let apex = Point3::new(0.5, 1.0, 0.0);
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            apex,
            apex,
        )));
        let v0 = model.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = model.add_vertex(apex);
        let uv = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0), UvPoint::new(0.0, 1.0)];
        let e0 = model.add_edge(Curve2d::line(uv[0], uv[1]), v0, v1).unwrap();
        let e1 = model.add_edge(Curve2d::line(uv[1], uv[2]), v1, v2).unwrap();
        let e2 = model.add_edge(Curve2d::line(uv[2], uv[3]), v2, v2).unwrap();
        let e3 = model.add_edge(Curve2d::line(uv[3], uv[0]), v2, v0).unwrap();
        model
            .add_face(s, vec![[e0, e1, e2, e3].into_iter().map(OrientedEdge::forward).collect()])
            .unwrap();
        assert!(model[e2].mesh.degenerate);
        assert!(!model[e1].mesh.degenerate);
    }

    #[test]
    fn reset_clears_face_and_edge_state() {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let f = model.add_polygon_face(s, &square(), &[]).unwrap();
        let e = model[f].loops[0].edges[0].edge;
        model.face_mut(f).unwrap().state = FaceMeshState::Done;
        model.face_mut(f).unwrap().meshed = true;
        model.edge_mut(e).unwrap().mesh.node_ids = vec![0, 1];
        model.reset_face_mesh(f).unwrap();
        assert_eq!(model[f].state, FaceMeshState::NotStarted);
        assert!(!model[f].meshed);
        assert!(model[e].mesh.node_ids.is_empty());
    }

    #[test]
    fn reversed_or_empty_boundary_is_rejected() {
        let mut model = TopoModel::new(1e-6);
        let a = model.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let line = Curve2d::line(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0));
        let err = model.add_bounded_edge(line.clone(), (1.0, 0.0), a, b).unwrap_err();
        assert_eq!(err, TopoError::InvalidBoundary(1.0, 0.0));
        let err = model.add_bounded_edge(line, (0.0, f64::NAN), a, b).unwrap_err();
        assert!(matches!(err, TopoError::InvalidBoundary(t0, t1) if t0 == 0.0 && t1.is_nan()));
        assert_eq!(model.edge_count(), 0);
    }
}
