use facemesh_engine::geom::{
    BezierSurface, CarrierSurface, CylinderSurface, DerivativeOrder, NurbsSurface, Point3, UvDomain, UvPoint, Vec3,
    bspline::clamped_uniform_knots,
};
use facemesh_engine::mesher::{FaceMesher, MeshModel, MesherConfig, mesh_face, mesh_topology};
use facemesh_engine::topo::{FaceId, FaceMeshState, TopoModel};

fn unit_patch() -> CarrierSurface {
    CarrierSurface::Bezier(BezierSurface::bilinear(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ))
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<UvPoint> {
    vec![UvPoint::new(x0, y0), UvPoint::new(x1, y0), UvPoint::new(x1, y1), UvPoint::new(x0, y1)]
}

fn bump(height: f64) -> NurbsSurface {
    let knots = clamped_uniform_knots(3, 2);
    let poles = (0..3)
        .flat_map(|j| {
            (0..3).map(move |i| Point3::new(f64::from(i), f64::from(j), if i == 1 && j == 1 { height } else { 0.0 }))
        })
        .collect();
    NurbsSurface::new(2, 2, 3, 3, knots.clone(), knots, poles, None).unwrap()
}

fn dome() -> BezierSurface {
    let poles = (0..3)
        .flat_map(|j| {
            (0..3).map(move |i| {
                Point3::new(f64::from(i) * 0.5, f64::from(j) * 0.5, if i == 1 && j == 1 { 1.0 } else { 0.0 })
            })
        })
        .collect();
    BezierSurface::new(2, 2, poles).unwrap()
}

#[test]
fn surface_corners_match_corner_poles() {
    let bezier = dome();
    let nurbs = bump(0.5);
    for (u, v, p) in [
        (0.0, 0.0, Point3::new(0.0, 0.0, 0.0)),
        (1.0, 0.0, Point3::new(1.0, 0.0, 0.0)),
        (0.0, 1.0, Point3::new(0.0, 1.0, 0.0)),
        (1.0, 1.0, Point3::new(1.0, 1.0, 0.0)),
    ] {
        let q = bezier.evaluate(u, v, DerivativeOrder::Zero).point;
        assert!(q.distance_to(p) < 1e-12, "bezier corner ({u}, {v})");
        let q = nurbs.evaluate(u, v, DerivativeOrder::Zero).point;
        assert!(q.distance_to(Point3::new(p.x * 2.0, p.y * 2.0, 0.0)) < 1e-12, "nurbs corner ({u}, {v})");
    }
}

#[test]
fn unit_weights_are_not_rational() {
    assert!(!bump(0.5).is_rational());
}

#[test]
fn unit_square_meshes_as_two_triangles() {
    let mut model = TopoModel::new(1e-6);
    let s = model.add_surface(unit_patch());
    let f = model.add_polygon_face(s, &rect(0.0, 0.0, 1.0, 1.0), &[]).unwrap();
    let report = mesh_topology(&mut model, &MesherConfig::default()).unwrap();

    assert_eq!(report.state_of(f), Some(FaceMeshState::Done));
    assert_eq!(report.diagnostics.planar_face_count, 1);
    let mesh = report.mesh.face_mesh(f).unwrap();
    assert_eq!(mesh.triangle_count(), 2);
    for i in 0..2 {
        let n = mesh.triangle_normal(i).unwrap();
        assert!(n.distance_to_z() < 1e-12);
    }
}

trait NearZ {
    fn distance_to_z(self) -> f64;
}

impl NearZ for Vec3 {
    fn distance_to_z(self) -> f64 {
        (self - Vec3::Z).length()
    }
}

#[test]
fn hole_is_left_open() {
    let mut model = TopoModel::new(1e-6);
    let s = model.add_surface(unit_patch());
    let mut hole = rect(0.35, 0.35, 0.65, 0.65);
    hole.reverse();
    let f = model.add_polygon_face(s, &rect(0.0, 0.0, 1.0, 1.0), &[hole]).unwrap();
    let report = mesh_topology(&mut model, &MesherConfig::default().with_max_edge_length(0.1)).unwrap();
    assert_eq!(report.state_of(f), Some(FaceMeshState::Done));
    let area = report.mesh.face_mesh(f).unwrap().area();
    assert!((area - 0.91).abs() < 1e-9, "area {area}");
}

#[test]
fn collapsed_domain_is_a_degenerate_grid() {
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
    let f = model.add_polygon_face(s, &rect(0.0, 0.0, 1.0, 1e-9), &[]).unwrap();

    let report = mesh_topology(&mut model, &MesherConfig::default()).unwrap();
    assert_eq!(report.state_of(f), Some(FaceMeshState::DegenerateGrid));
    assert_eq!(report.diagnostics.degenerate_face_count, 1);
    assert!(model.face(f).unwrap().meshed);
    assert!(report.mesh.face_mesh(f).unwrap().is_empty());

    // A meshed face is not retried.
    let again = mesh_topology(&mut model, &MesherConfig::default()).unwrap();
    assert!(again.faces.is_empty());
}

#[test]
fn shared_edges_carry_identical_points() {
    let mut model = TopoModel::new(1e-6);
    let s = model.add_surface(CarrierSurface::Nurbs(bump(0.5)));
    let a = model.add_polygon_face(s, &rect(0.0, 0.0, 0.5, 1.0), &[]).unwrap();
    let b = model.add_polygon_face(s, &rect(0.5, 0.0, 1.0, 1.0), &[]).unwrap();
    let report = mesh_topology(&mut model, &MesherConfig::default().with_max_edge_length(0.2)).unwrap();

    assert_eq!(report.state_of(a), Some(FaceMeshState::Done));
    assert_eq!(report.state_of(b), Some(FaceMeshState::Done));
    assert_eq!(report.diagnostics.planar_face_count, 0);
    assert_eq!(report.wave_count, 2);

    let shared = model.face(b).unwrap().edge_ids().find(|e| model.edge(*e).unwrap().twin.is_some()).unwrap();
    let twin = model.edge(shared).unwrap().twin.unwrap().edge;
    let mut first = report.mesh.edge_mesh(shared).unwrap().points;
    let second = report.mesh.edge_mesh(twin).unwrap().points;
    first.reverse();
    assert_eq!(first, second);
    assert!(first.len() > 2);

    // Same boundary nodes appear in both face meshes.
    for id in report.mesh.edge_mesh(shared).unwrap().node_ids {
        for face in [a, b] {
            assert!(report.mesh.face_mesh(face).unwrap().global_ids.contains(&id));
        }
    }
}

#[test]
fn thin_strip_synchronizes_its_long_sides() {
    let mut model = TopoModel::new(1e-6);
    let s = model.add_surface(CarrierSurface::Bezier(dome()));
    let f = model.add_polygon_face(s, &rect(0.05, 0.495, 0.95, 0.505), &[]).unwrap();
    let report = mesh_topology(&mut model, &MesherConfig::default().with_max_edge_length(0.1)).unwrap();

    assert_eq!(report.state_of(f), Some(FaceMeshState::Done), "{}", report.diagnostics);
    assert_eq!(report.diagnostics.thin_zone_count, 1);
    assert!(model.face(f).unwrap().has_thin_zones);
    let edges: Vec<_> = model.face(f).unwrap().edge_ids().collect();
    let count = |i: usize| model.edge(edges[i]).unwrap().mesh.cutting.len();
    assert_eq!(count(0), count(2));
}

#[test]
fn single_face_commit_marks_the_face() {
    let mut model = TopoModel::new(1e-6);
    let s = model.add_surface(CarrierSurface::Bezier(dome()));
    let f = model.add_polygon_face(s, &rect(0.0, 0.0, 1.0, 1.0), &[]).unwrap();
    let mesh = MeshModel::new();
    let state = mesh_face(&mut model, f, &MesherConfig::default().with_max_edge_length(0.25), &mesh).unwrap();
    assert_eq!(state, FaceMeshState::Done);
    let face = model.face(f).unwrap();
    assert!(face.meshed);
    assert_eq!(face.state, FaceMeshState::Done);
    let face_mesh = mesh.face_mesh(f).unwrap();
    assert!(face_mesh.triangle_count() > 8);
    assert!(face_mesh.triangles.iter().all(|t| t.iter().all(|i| (*i as usize) < face_mesh.positions.len())));
    assert!(mesh_face(&mut model, FaceId(7), &MesherConfig::default(), &mesh).is_err());
}

#[test]
fn reset_model_meshes_again() {
    let mut model = TopoModel::new(1e-6);
    let s = model.add_surface(unit_patch());
    let f = model.add_polygon_face(s, &rect(0.0, 0.0, 1.0, 1.0), &[]).unwrap();
    assert_eq!(model.edge_count(), 4);
    assert_eq!(model.face(f).unwrap().external_loop().unwrap().edges.len(), 4);

    let config = MesherConfig::default().with_max_edge_length(0.5);
    let first = mesh_topology(&mut model, &config).unwrap();
    model.reset_mesh();
    assert!(!model.face(f).unwrap().meshed);

    let mesh = MeshModel::new();
    let outcome = FaceMesher::new(&config, &mesh).mesh(&model, f).unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.mesh.as_ref().unwrap().triangle_count(), first.mesh.face_mesh(f).unwrap().triangle_count());
    // The outcome is not written back until committed.
    assert!(!model.face(f).unwrap().meshed);
    outcome.commit(&mut model, &mesh).unwrap();
    assert!(model.face(f).unwrap().meshed);
}
