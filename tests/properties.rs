use facemesh_engine::geom::{
    BezierSurface, CarrierSurface, DerivativeOrder, NurbsSurface, Point3, UvDomain, UvPoint,
    bspline::clamped_uniform_knots, project_on_segment,
};
use facemesh_engine::mesher::{
    EdgeDiscretizer, FaceMesh, MesherConfig, SamplingGrid, merge_cutting_points, mesh_topology,
};
use facemesh_engine::topo::{CuttingPoint, CuttingPointType, FaceMeshState, TopoModel};
use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn unit_patch() -> CarrierSurface {
    CarrierSurface::Bezier(BezierSurface::bilinear(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ))
}

fn kind(index: usize) -> CuttingPointType {
    match index {
        0 => CuttingPointType::Imposed,
        1 => CuttingPointType::IsoU,
        2 => CuttingPointType::IsoV,
        _ => CuttingPointType::Other,
    }
}

fn uniform(n: usize) -> Vec<f64> {
    (0..=n).map(|i| i as f64 / n as f64).collect()
}

proptest! {
    #[test]
    fn corners_reproduce_their_poles(heights in prop::collection::vec(-1.0f64..1.0, 16), weight in 0.5f64..2.0) {
        let poles: Vec<Point3> =
            (0..16).map(|k| Point3::new((k % 4) as f64, (k / 4) as f64, heights[k])).collect();
        let mut weights = vec![1.0; 16];
        weights[5] = weight;
        let knots = clamped_uniform_knots(4, 2);
        let nurbs = NurbsSurface::new(2, 2, 4, 4, knots.clone(), knots, poles.clone(), Some(weights)).unwrap();
        let bezier = BezierSurface::new(3, 3, poles.clone()).unwrap();

        for (u, v, k) in [(0.0, 0.0, 0), (1.0, 0.0, 3), (0.0, 1.0, 12), (1.0, 1.0, 15)] {
            let p = bezier.evaluate(u, v, DerivativeOrder::Zero).point;
            prop_assert!(p.distance_to(poles[k]) < 1e-12);
            let p = nurbs.evaluate(u, v, DerivativeOrder::Zero).point;
            prop_assert!(p.distance_to(poles[k]) < 1e-12);
        }
    }

    #[test]
    fn merging_is_idempotent(raw in prop::collection::vec((0.0f64..1.0, 0usize..4, 1e-4f64..0.05), 0..40)) {
        let mut points = vec![
            CuttingPoint::new(0.0, CuttingPointType::Vertex, 0.01),
            CuttingPoint::new(1.0, CuttingPointType::Vertex, 0.01),
        ];
        points.extend(raw.iter().map(|&(t, k, d)| CuttingPoint::new(t, kind(k), d)));

        let once = merge_cutting_points(points);
        let twice = merge_cutting_points(once.clone());
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.first().map(|p| p.coordinate), Some(0.0));
        prop_assert_eq!(once.last().map(|p| p.coordinate), Some(1.0));
        for pair in once.windows(2) {
            prop_assert!(pair[0].coordinate < pair[1].coordinate);
        }
    }

    #[test]
    fn discretization_covers_the_edge_in_order(
        a in (0.0f64..1.0, 0.0f64..0.3),
        b in (0.0f64..1.0, 0.7f64..1.0),
        c in (0.0f64..0.3, 0.3f64..0.7),
        size in 0.05f64..0.6,
        cuts in 1usize..8,
    ) {
        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let ring = [UvPoint::new(a.0, a.1), UvPoint::new(b.0, b.1), UvPoint::new(c.0, c.1)];
        let area = (ring[1].u - ring[0].u) * (ring[2].v - ring[0].v) - (ring[2].u - ring[0].u) * (ring[1].v - ring[0].v);
        prop_assume!(area.abs() > 1e-3);
        let f = model.add_polygon_face(s, &ring, &[]).unwrap();

        let config = MesherConfig::default().with_max_edge_length(size);
        let grid = uniform(cuts);
        let discretizer = EdgeDiscretizer::new(&config, model.surface(s).unwrap(), [grid.as_slice(), grid.as_slice()], 1e-6);
        for id in model.face(f).unwrap().edge_ids() {
            let edge = model.edge(id).unwrap();
            let (points, _) = discretizer.cutting_points(edge, &edge.mesh);
            prop_assert!(points.len() >= 2);
            prop_assert_eq!(points[0].coordinate, edge.boundary.0);
            prop_assert_eq!(points[points.len() - 1].coordinate, edge.boundary.1);
            for pair in points.windows(2) {
                prop_assert!(pair[0].coordinate < pair[1].coordinate);
            }
            // No gap is much longer than the requested size.
            for pair in points.windows(2) {
                let p = edge.curve.point_at(pair[0].coordinate);
                let gap = p.distance_to(edge.curve.point_at(pair[1].coordinate));
                prop_assert!(gap <= size * 1.05, "gap {} for size {}", gap, size);
            }
        }
    }

    #[test]
    fn discarded_nodes_lie_within_the_ratio_of_their_cell(
        u in (0.0f64..0.45, 0.55f64..1.0),
        v in (0.0f64..0.45, 0.55f64..1.0),
        width in 0.5f64..4.0,
        cuts in (2usize..10, 2usize..10),
        ratio in 0.01f64..0.3,
    ) {
        let surface = CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(width, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(width, 1.0, 0.0),
        ));
        let mut grid = SamplingGrid::new(UvDomain::new(0.0, 1.0, 0.0, 1.0));
        grid.define_cutting_parameters([uniform(cuts.0), uniform(cuts.1)], [Vec::new(), Vec::new()]);
        grid.generate_point_cloud(&surface, [1e-6, 1e-6]).unwrap();
        let ring = vec![UvPoint::new(u.0, v.0), UvPoint::new(u.1, v.0), UvPoint::new(u.1, v.1), UvPoint::new(u.0, v.1)];
        grid.set_loops(vec![ring]).unwrap();
        grid.find_inner_face_points(3);
        grid.find_points_close_to_loop();
        let removed = grid.remove_points_close_to_loop(ratio);

        let scaled = grid.loops_scaled()[0].clone();
        let mut flagged = 0;
        for (index, status) in grid.status().iter().enumerate() {
            if !status.too_close {
                continue;
            }
            flagged += 1;
            prop_assert!(status.close_to_loop);
            let p = grid.node_scaled(index);
            let distance = (0..scaled.len())
                .map(|s| project_on_segment(p, scaled[s], scaled[(s + 1) % scaled.len()]).0)
                .fold(f64::INFINITY, f64::min);
            let limit = ratio * grid.local_cell_size(index);
            prop_assert!(distance < limit, "node {} at {} for limit {}", index, distance, limit);
        }
        prop_assert_eq!(flagged, removed);
    }
}

#[test]
fn random_strips_share_reversed_nodes() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..8 {
        let count = rng.random_range(2..6);
        let mut xs: Vec<f64> = (1..count).map(|_| rng.random_range(0.05..0.95)).collect();
        xs.sort_by(f64::total_cmp);
        xs.dedup_by(|a, b| (*a - *b).abs() < 0.02);
        xs.insert(0, 0.0);
        xs.push(1.0);

        let mut model = TopoModel::new(1e-6);
        let s = model.add_surface(unit_patch());
        let faces: Vec<_> = xs
            .windows(2)
            .map(|w| {
                let ring = [UvPoint::new(w[0], 0.0), UvPoint::new(w[1], 0.0), UvPoint::new(w[1], 1.0), UvPoint::new(w[0], 1.0)];
                model.add_polygon_face(s, &ring, &[]).unwrap()
            })
            .collect();
        let size = rng.random_range(0.08..0.4);
        let report = mesh_topology(&mut model, &MesherConfig::default().with_max_edge_length(size)).unwrap();

        assert_eq!(report.wave_count, faces.len());
        for &f in &faces {
            assert_eq!(report.state_of(f), Some(FaceMeshState::Done));
            for id in model.face(f).unwrap().edge_ids() {
                let edge = model.edge(id).unwrap();
                let Some(link) = edge.twin else {
                    continue;
                };
                let mut ids = edge.mesh.node_ids.clone();
                ids.reverse();
                assert_eq!(ids, model.edge(link.edge).unwrap().mesh.node_ids);
            }
        }
        let total: f64 = report.mesh.face_meshes().iter().map(FaceMesh::area).sum();
        assert!((total - 1.0).abs() < 1e-9, "total area {total}");
    }
}
