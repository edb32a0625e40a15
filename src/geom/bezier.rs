//! Tensor-product Bezier patches evaluated with De Casteljau ladders.
//!
//! Every blending step carries the derivative ladders next to the position
//! ladder: for a level `r` blend `b' = b_i·(1-t) + b_{i+1}·t`, the first
//! derivative ladder picks up the edge vector `b_{i+1} - b_i` and the second
//! derivative ladder twice the first-derivative edge vector. After the last level
//! the ladders hold the exact polynomial derivatives without any degree
//! scaling.

use super::core::{Point3, Vec3};
use super::surface::{DerivativeOrder, SurfaceError, SurfacePoint};

/// Bezier patch of degree `(degree_u, degree_v)`.
///
/// Poles are stored row-major with U varying fastest:
/// `poles[v_index * (degree_u + 1) + u_index]`. The parameter domain is the unit
/// square.
#[derive(Debug, Clone, PartialEq)]
pub struct BezierSurface {
    degree_u: usize,
    degree_v: usize,
    poles: Vec<Point3>,
}

impl BezierSurface {
    pub fn new(degree_u: usize, degree_v: usize, poles: Vec<Point3>) -> Result<Self, SurfaceError> {
        if degree_u == 0 || degree_v == 0 {
            return Err(SurfaceError::InvalidDegree { degree_u, degree_v });
        }
        let expected = (degree_u + 1) * (degree_v + 1);
        if poles.len() != expected {
            return Err(SurfaceError::PoleCount { expected, actual: poles.len() });
        }
        if poles.iter().any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite())) {
            return Err(SurfaceError::NonFinite);
        }
        Ok(Self { degree_u, degree_v, poles })
    }

    /// Bilinear patch through four corners given in `(0,0), (1,0), (0,1), (1,1)` order.
    pub fn bilinear(p00: Point3, p10: Point3, p01: Point3, p11: Point3) -> Self {
        Self { degree_u: 1, degree_v: 1, poles: vec![p00, p10, p01, p11] }
    }

    #[must_use]
    pub const fn degree_u(&self) -> usize {
        self.degree_u
    }

    #[must_use]
    pub const fn degree_v(&self) -> usize {
        self.degree_v
    }

    #[must_use]
    pub fn poles(&self) -> &[Point3] {
        &self.poles
    }

    #[must_use]
    pub fn pole(&self, u_index: usize, v_index: usize) -> Point3 {
        self.poles[v_index * (self.degree_u + 1) + u_index]
    }

    pub fn evaluate(&self, u: f64, v: f64, order: DerivativeOrder) -> SurfacePoint {
        let nu = self.degree_u + 1;
        let nv = self.degree_v + 1;
        let want = order.as_usize();

        // Blend every U column along V first.
        let mut column = Vec::with_capacity(nv);
        let mut col_pos = Vec::with_capacity(nu);
        let mut col_dv = Vec::with_capacity(nu);
        let mut col_dvv = Vec::with_capacity(nu);
        for i in 0..nu {
            column.clear();
            column.extend((0..nv).map(|j| self.poles[j * nu + i].to_vec3()));
            let ladder = decasteljau(&column, v, want);
            col_pos.push(ladder.value);
            col_dv.push(ladder.d1);
            col_dvv.push(ladder.d2);
        }

        let along_u = decasteljau(&col_pos, u, want);
        let point = Point3::from(along_u.value);
        if want == 0 {
            return SurfacePoint::position(point);
        }

        let dv_ladder = decasteljau(&col_dv, u, want.min(1));
        let gradient = [along_u.d1, dv_ladder.value];
        if want == 1 {
            return SurfacePoint { point, gradient: Some(gradient), laplacian: None };
        }

        let dvv = decasteljau(&col_dvv, u, 0).value;
        SurfacePoint {
            point,
            gradient: Some(gradient),
            laplacian: Some([along_u.d2, dvv, dv_ladder.d1]),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Ladder {
    pub value: Vec3,
    pub d1: Vec3,
    pub d2: Vec3,
}

/// One-dimensional De Casteljau reduction of `points` at `t`, carrying derivative
/// ladders up to `order` (0, 1 or 2).
pub(crate) fn decasteljau(points: &[Vec3], t: f64, order: usize) -> Ladder {
    let n = points.len();
    if n == 0 {
        return Ladder::default();
    }

    let mut pos: Vec<Vec3> = points.to_vec();
    let mut d1 = vec![Vec3::ZERO; n];
    let mut d2 = vec![Vec3::ZERO; n];

    for level in 1..n {
        for i in 0..n - level {
            if order >= 2 {
                d2[i] = d2[i].blend(d2[i + 1], t) + (d1[i + 1] - d1[i]) * 2.0;
            }
            if order >= 1 {
                d1[i] = d1[i].blend(d1[i + 1], t) + (pos[i + 1] - pos[i]);
            }
            pos[i] = pos[i].blend(pos[i + 1], t);
        }
    }

    Ladder { value: pos[0], d1: d1[0], d2: d2[0] }
}
