use crate::geom::{
    BezierSurface, CarrierSurface, CylinderSurface, DerivativeOrder, NurbsSurface, PlaneSurface,
    Point3, UvDomain, UvPoint, Vec3,
};

fn unit_bilinear() -> BezierSurface {
    BezierSurface::bilinear(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    )
}

#[test]
fn bilinear_patch_is_planar() {
    let surface = CarrierSurface::Bezier(unit_bilinear());
    assert!(surface.is_planar());
}

#[test]
fn perturbed_bilinear_patch_is_not_planar() {
    let surface = CarrierSurface::Bezier(BezierSurface::bilinear(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.5),
    ));
    assert!(!surface.is_planar());
}

#[test]
fn slightly_noisy_patch_stays_planar() {
    let surface = CarrierSurface::Bezier(BezierSurface::bilinear(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 1e-4),
    ));
    assert!(surface.is_planar());
}

#[test]
fn tilted_quadratic_patch_in_a_plane_is_planar() {
    // Degree (2,2) poles all on the plane z = x + y.
    let mut poles = Vec::new();
    for j in 0..3 {
        for i in 0..3 {
            let (x, y) = (i as f64 * 0.5 + 0.1 * j as f64, j as f64 * 0.5);
            poles.push(Point3::new(x, y, x + y));
        }
    }
    let surface = CarrierSurface::Bezier(BezierSurface::new(2, 2, poles).unwrap());
    assert!(surface.is_planar());
}

#[test]
fn analytic_surfaces_report_planarity_by_kind() {
    let plane = PlaneSurface::new(
        Point3::ORIGIN,
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        UvDomain::new(0.0, 1.0, 0.0, 1.0),
    )
    .unwrap();
    assert!(CarrierSurface::Plane(plane).is_planar());

    let cylinder = CylinderSurface::new(
        Point3::ORIGIN,
        Vec3::Z,
        Vec3::new(1.0, 0.0, 0.0),
        2.0,
        UvDomain::new(0.0, 1.0, 0.0, 3.0),
    )
    .unwrap();
    assert!(!CarrierSurface::Cylinder(cylinder).is_planar());
}

#[test]
fn nurbs_with_unit_weights_is_not_rational_after_finalize() {
    let mut surface = NurbsSurface::new(
        1,
        1,
        2,
        2,
        vec![0.0, 0.0, 1.0, 1.0],
        vec![0.0, 0.0, 1.0, 1.0],
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        ],
        Some(vec![1.0; 4]),
    )
    .unwrap();
    surface.finalize();
    assert!(!surface.is_rational());

    let p = CarrierSurface::Nurbs(surface).point_at(UvPoint::new(0.5, 0.5));
    assert!(p.distance_to(Point3::new(0.5, 0.5, 0.25)) < 1e-12);
}

#[test]
fn nurbs_and_bezier_agree_on_bernstein_knots() {
    let poles: Vec<Point3> = (0..9)
        .map(|k| {
            let (i, j) = (k % 3, k / 3);
            Point3::new(i as f64, j as f64, ((i * 7 + j * 3) % 5) as f64 * 0.2)
        })
        .collect();
    let bezier = CarrierSurface::Bezier(BezierSurface::new(2, 2, poles.clone()).unwrap());
    let nurbs = CarrierSurface::Nurbs(
        NurbsSurface::new(
            2,
            2,
            3,
            3,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            poles,
            None,
        )
        .unwrap(),
    );

    for &(u, v) in &[(0.1, 0.9), (0.5, 0.5), (0.77, 0.25)] {
        let a = bezier.evaluate(u, v, DerivativeOrder::Two);
        let b = nurbs.evaluate(u, v, DerivativeOrder::Two);
        assert!(a.point.distance_to(b.point) < 1e-12);
        let (ga, gb) = (a.gradient.unwrap(), b.gradient.unwrap());
        assert!((ga[0] - gb[0]).length() < 1e-10);
        assert!((ga[1] - gb[1]).length() < 1e-10);
        let (la, lb) = (a.laplacian.unwrap(), b.laplacian.unwrap());
        for k in 0..3 {
            assert!((la[k] - lb[k]).length() < 1e-9);
        }
    }
}

#[test]
fn cylinder_normal_points_outward() {
    let cylinder = CarrierSurface::Cylinder(
        CylinderSurface::new(
            Point3::ORIGIN,
            Vec3::Z,
            Vec3::new(1.0, 0.0, 0.0),
            1.5,
            UvDomain::new(0.0, std::f64::consts::PI, 0.0, 1.0),
        )
        .unwrap(),
    );
    let n = cylinder.normal_at(UvPoint::new(0.0, 0.5)).unwrap();
    assert!((n - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-12);
    let p = cylinder.point_at(UvPoint::new(std::f64::consts::FRAC_PI_2, 0.5));
    assert!(p.distance_to(Point3::new(0.0, 1.5, 0.5)) < 1e-12);
}

#[test]
fn bezier_normal_of_unit_patch_is_plus_z() {
    let surface = CarrierSurface::Bezier(unit_bilinear());
    assert_eq!(surface.normal_at(UvPoint::new(0.3, 0.6)), Some(Vec3::Z));
}

#[test]
fn bilinear_patch_with_collapsed_corner_is_planar() {
    let apex = Point3::new(0.2, 1.0, 3.0);
    let surface = CarrierSurface::Bezier(BezierSurface::bilinear(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.5),
        apex,
        apex,
    ));
    assert!(surface.is_planar());
}
