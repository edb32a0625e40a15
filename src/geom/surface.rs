use thiserror::Error;

use super::bezier::BezierSurface;
use super::core::{IsoAxis, Point3, UvDomain, UvPoint, Vec3};
use super::nurbs::NurbsSurface;

/// Deviation from a right angle, in degrees, still accepted by the planarity test.
const PLANARITY_ANGLE_DEG: f64 = 89.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error("degrees must be at least 1 (got {degree_u}x{degree_v})")]
    InvalidDegree { degree_u: usize, degree_v: usize },
    #[error("expected {expected} control points, got {actual}")]
    PoleCount { expected: usize, actual: usize },
    #[error("expected {expected} weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },
    #[error("weights must be finite and positive")]
    InvalidWeight,
    #[error("control points must be finite")]
    NonFinite,
    #[error("invalid knot vector: {0}")]
    Knots(String),
    #[error("invalid analytic surface: {0}")]
    Analytic(&'static str),
}

/// Highest derivative order requested from [`CarrierSurface::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DerivativeOrder {
    Zero,
    One,
    Two,
}

impl DerivativeOrder {
    #[must_use]
    pub const fn as_usize(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Result of a surface evaluation.
///
/// `gradient` is `[dS/du, dS/dv]` and `laplacian` is
/// `[d2S/du2, d2S/dv2, d2S/dudv]`; each is present only when requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub point: Point3,
    pub gradient: Option<[Vec3; 2]>,
    pub laplacian: Option<[Vec3; 3]>,
}

impl SurfacePoint {
    #[must_use]
    pub const fn position(point: Point3) -> Self {
        Self { point, gradient: None, laplacian: None }
    }

    /// Unit normal `dS/du x dS/dv`, if a non-degenerate gradient is available.
    #[must_use]
    pub fn normal(&self) -> Option<Vec3> {
        let [du, dv] = self.gradient?;
        du.cross(dv).normalized()
    }

    /// First and second derivative along one iso direction.
    #[must_use]
    pub fn along(&self, axis: IsoAxis) -> Option<(Vec3, Vec3)> {
        let [du, dv] = self.gradient?;
        let second = self.laplacian.map_or(Vec3::ZERO, |[duu, dvv, _]| match axis {
            IsoAxis::U => duu,
            IsoAxis::V => dvv,
        });
        Some(match axis {
            IsoAxis::U => (du, second),
            IsoAxis::V => (dv, second),
        })
    }
}

/// Plane through `origin` spanned by `x_axis` (u) and `y_axis` (v), bounded by `domain`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub domain: UvDomain,
}

impl PlaneSurface {
    pub fn new(origin: Point3, x_axis: Vec3, y_axis: Vec3, domain: UvDomain) -> Result<Self, SurfaceError> {
        if x_axis.cross(y_axis).normalized().is_none() {
            return Err(SurfaceError::Analytic("plane axes are parallel or zero"));
        }
        Ok(Self { origin, x_axis, y_axis, domain })
    }
}

/// Cylinder of `radius` around `axis` through `origin`; `u` is the angle in radians
/// measured from `ref_dir`, `v` the height along the axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderSurface {
    pub origin: Point3,
    pub axis: Vec3,
    pub ref_dir: Vec3,
    pub radius: f64,
    pub domain: UvDomain,
}

impl CylinderSurface {
    pub fn new(
        origin: Point3,
        axis: Vec3,
        ref_dir: Vec3,
        radius: f64,
        domain: UvDomain,
    ) -> Result<Self, SurfaceError> {
        let axis = axis.normalized().ok_or(SurfaceError::Analytic("cylinder axis is zero"))?;
        let ref_dir = ref_dir
            .reject_from(axis)
            .normalized()
            .ok_or(SurfaceError::Analytic("cylinder reference direction is parallel to the axis"))?;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(SurfaceError::Analytic("cylinder radius must be positive"));
        }
        Ok(Self { origin, axis, ref_dir, radius, domain })
    }

    fn evaluate(&self, u: f64, v: f64, order: DerivativeOrder) -> SurfacePoint {
        let binormal = self.axis.cross(self.ref_dir);
        let (s, c) = u.sin_cos();
        let radial = self.ref_dir * c + binormal * s;
        let point = self.origin + radial * self.radius + self.axis * v;
        if order == DerivativeOrder::Zero {
            return SurfacePoint::position(point);
        }
        let du = (self.ref_dir * -s + binormal * c) * self.radius;
        let gradient = Some([du, self.axis]);
        let laplacian = (order == DerivativeOrder::Two).then(|| [radial * -self.radius, Vec3::ZERO, Vec3::ZERO]);
        SurfacePoint { point, gradient, laplacian }
    }
}

/// Carrier surface of a face: one variant per supported geometry kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CarrierSurface {
    Bezier(BezierSurface),
    Nurbs(NurbsSurface),
    Plane(PlaneSurface),
    Cylinder(CylinderSurface),
}

impl CarrierSurface {
    /// Evaluate position and, on request, first and second partial derivatives.
    ///
    /// Callers keep `(u, v)` inside [`CarrierSurface::domain`]; outside it the
    /// polynomial variants simply extrapolate.
    #[must_use]
    pub fn evaluate(&self, u: f64, v: f64, order: DerivativeOrder) -> SurfacePoint {
        match self {
            Self::Bezier(s) => s.evaluate(u, v, order),
            Self::Nurbs(s) => s.evaluate(u, v, order),
            Self::Plane(p) => {
                let point = p.origin + p.x_axis * u + p.y_axis * v;
                SurfacePoint {
                    point,
                    gradient: (order >= DerivativeOrder::One).then_some([p.x_axis, p.y_axis]),
                    laplacian: (order == DerivativeOrder::Two).then_some([Vec3::ZERO; 3]),
                }
            }
            Self::Cylinder(c) => c.evaluate(u, v, order),
        }
    }

    #[must_use]
    pub fn point_at(&self, uv: UvPoint) -> Point3 {
        self.evaluate(uv.u, uv.v, DerivativeOrder::Zero).point
    }

    #[must_use]
    pub fn normal_at(&self, uv: UvPoint) -> Option<Vec3> {
        self.evaluate(uv.u, uv.v, DerivativeOrder::One).normal()
    }

    #[must_use]
    pub fn domain(&self) -> UvDomain {
        match self {
            Self::Bezier(_) => UvDomain::new(0.0, 1.0, 0.0, 1.0),
            Self::Nurbs(s) => {
                let (u0, u1) = s.domain_u();
                let (v0, v1) = s.domain_v();
                UvDomain::new(u0, u1, v0, v1)
            }
            Self::Plane(p) => p.domain,
            Self::Cylinder(c) => c.domain,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bezier(_) => "bezier",
            Self::Nurbs(_) => "nurbs",
            Self::Plane(_) => "plane",
            Self::Cylinder(_) => "cylinder",
        }
    }

    /// Whether the surface is geometrically planar.
    ///
    /// Control-point surfaces pass when every pole lies within the angular
    /// threshold of the plane spanned by the first three non-collinear poles;
    /// a degree (1,1) patch with at most three distinct poles is planar outright.
    #[must_use]
    pub fn is_planar(&self) -> bool {
        match self {
            Self::Plane(_) => true,
            Self::Cylinder(_) => false,
            Self::Bezier(s) => {
                poles_are_planar(s.poles(), s.degree_u() == 1 && s.degree_v() == 1)
            }
            Self::Nurbs(s) => {
                let (du, dv) = s.degrees();
                poles_are_planar(s.poles(), du == 1 && dv == 1)
            }
        }
    }
}

fn poles_are_planar(poles: &[Point3], bilinear: bool) -> bool {
    let Some(&origin) = poles.first() else {
        return true;
    };

    let scale = poles.iter().map(|p| p.distance_to(origin)).fold(0.0_f64, f64::max);
    let zero = scale * 1e-12;
    if scale <= 0.0 {
        return true;
    }

    let Some(normal) = plane_normal(poles, origin, zero) else {
        // All poles collinear.
        return true;
    };

    // A bilinear patch with a collapsed corner is a flat triangle.
    if bilinear && distinct_count(poles, zero) <= 3 {
        return true;
    }

    let min_cos = PLANARITY_ANGLE_DEG.to_radians().cos();
    poles.iter().all(|p| {
        let d = p.sub_point(origin);
        let len = d.length();
        len <= zero || (d.dot(normal).abs() / len) <= min_cos
    })
}

fn plane_normal(poles: &[Point3], origin: Point3, zero: f64) -> Option<Vec3> {
    let first = poles.iter().map(|p| p.sub_point(origin)).find(|d| d.length() > zero)?;
    poles
        .iter()
        .map(|p| first.cross(p.sub_point(origin)))
        .find(|n| n.length() > zero * first.length().max(1.0))
        .and_then(Vec3::normalized)
}

fn distinct_count(poles: &[Point3], zero: f64) -> usize {
    let mut distinct: Vec<Point3> = Vec::with_capacity(poles.len());
    for p in poles {
        if distinct.iter().all(|q| q.distance_to(*p) > zero) {
            distinct.push(*p);
        }
    }
    distinct.len()
}
