use super::bspline::{basis_derivatives, find_span, validate_knots};
use super::core::{Point3, Vec3};
use super::surface::{DerivativeOrder, SurfaceError, SurfacePoint};

/// Weights closer to 1 than this collapse a NURBS surface to a polynomial one.
const UNIT_WEIGHT_TOLERANCE: f64 = 1e-12;

/// Homogeneous control point `(x*w, y*w, z*w, w)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HPoint4 {
    x: f64,
    y: f64,
    z: f64,
    w: f64,
}

impl HPoint4 {
    fn from_weighted(p: Point3, w: f64) -> Self {
        Self { x: p.x * w, y: p.y * w, z: p.z * w, w }
    }

    fn xyz(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    fn add_scaled(self, rhs: Self, s: f64) -> Self {
        Self { x: self.x + rhs.x * s, y: self.y + rhs.y * s, z: self.z + rhs.z * s, w: self.w + rhs.w * s }
    }

    const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 0.0 };
}

/// Rational (or polynomial) B-spline surface.
///
/// Control points are indexed as `v_index * u_count + u_index`. Call
/// [`NurbsSurface::finalize`] after construction (done by [`NurbsSurface::new`])
/// to build the homogeneous pole array and detect weight collapse.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsSurface {
    degree_u: usize,
    degree_v: usize,
    u_count: usize,
    v_count: usize,
    knots_u: Vec<f64>,
    knots_v: Vec<f64>,
    poles: Vec<Point3>,
    weights: Vec<f64>,
    homogeneous: Vec<HPoint4>,
    rational: bool,
}

impl NurbsSurface {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        poles: Vec<Point3>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, SurfaceError> {
        validate_knots(u_count, degree_u, &knots_u).map_err(SurfaceError::Knots)?;
        validate_knots(v_count, degree_v, &knots_v).map_err(SurfaceError::Knots)?;

        let expected = u_count * v_count;
        if poles.len() != expected {
            return Err(SurfaceError::PoleCount { expected, actual: poles.len() });
        }
        if poles.iter().any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite())) {
            return Err(SurfaceError::NonFinite);
        }

        let weights = weights.unwrap_or_else(|| vec![1.0; expected]);
        if weights.len() != expected {
            return Err(SurfaceError::WeightCount { expected, actual: weights.len() });
        }
        if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(SurfaceError::InvalidWeight);
        }

        let mut surface = Self {
            degree_u,
            degree_v,
            u_count,
            v_count,
            knots_u,
            knots_v,
            poles,
            weights,
            homogeneous: Vec::new(),
            rational: true,
        };
        surface.finalize();
        Ok(surface)
    }

    /// Rebuild the homogeneous pole array and decide whether the surface is rational.
    ///
    /// When every weight equals 1 the surface demotes itself to a polynomial
    /// B-spline: weights are reset to exactly 1 and evaluation skips the rational
    /// division entirely.
    pub fn finalize(&mut self) {
        self.rational = self.weights.iter().any(|w| (w - 1.0).abs() > UNIT_WEIGHT_TOLERANCE);
        if !self.rational {
            self.weights.fill(1.0);
        }
        self.homogeneous = self
            .poles
            .iter()
            .zip(&self.weights)
            .map(|(p, w)| HPoint4::from_weighted(*p, *w))
            .collect();
    }

    #[must_use]
    pub const fn is_rational(&self) -> bool {
        self.rational
    }

    #[must_use]
    pub const fn degrees(&self) -> (usize, usize) {
        (self.degree_u, self.degree_v)
    }

    #[must_use]
    pub const fn counts(&self) -> (usize, usize) {
        (self.u_count, self.v_count)
    }

    #[must_use]
    pub fn poles(&self) -> &[Point3] {
        &self.poles
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn domain_u(&self) -> (f64, f64) {
        (self.knots_u[self.degree_u], self.knots_u[self.u_count])
    }

    #[must_use]
    pub fn domain_v(&self) -> (f64, f64) {
        (self.knots_v[self.degree_v], self.knots_v[self.v_count])
    }

    pub fn evaluate(&self, u: f64, v: f64, order: DerivativeOrder) -> SurfacePoint {
        let want = order.as_usize();
        let span_u = find_span(self.u_count - 1, self.degree_u, u, &self.knots_u);
        let span_v = find_span(self.v_count - 1, self.degree_v, v, &self.knots_v);
        let nu = basis_derivatives(span_u, u, self.degree_u, want, &self.knots_u);
        let nv = basis_derivatives(span_v, v, self.degree_v, want, &self.knots_v);

        // skl[k][l] = d^(k+l) S_w / du^k dv^l in homogeneous space.
        let mut skl = [[HPoint4::ZERO; 3]; 3];
        for k in 0..=want {
            for l in 0..=(want - k) {
                let mut acc = HPoint4::ZERO;
                for (jv, nv_l) in nv[l].iter().enumerate() {
                    if *nv_l == 0.0 {
                        continue;
                    }
                    let row = (span_v - self.degree_v + jv) * self.u_count;
                    for (iu, nu_k) in nu[k].iter().enumerate() {
                        if *nu_k == 0.0 {
                            continue;
                        }
                        let pole = self.homogeneous[row + span_u - self.degree_u + iu];
                        acc = acc.add_scaled(pole, nu_k * nv_l);
                    }
                }
                skl[k][l] = acc;
            }
        }

        if !self.rational {
            return polynomial_point(&skl, want);
        }
        rational_point(&skl, want)
    }
}

fn polynomial_point(skl: &[[HPoint4; 3]; 3], want: usize) -> SurfacePoint {
    let point = Point3::from(skl[0][0].xyz());
    let gradient = (want >= 1).then(|| [skl[1][0].xyz(), skl[0][1].xyz()]);
    let laplacian = (want >= 2).then(|| [skl[2][0].xyz(), skl[0][2].xyz(), skl[1][1].xyz()]);
    SurfacePoint { point, gradient, laplacian }
}

fn rational_point(skl: &[[HPoint4; 3]; 3], want: usize) -> SurfacePoint {
    let w = skl[0][0].w;
    let s = skl[0][0].xyz() * (1.0 / w);
    if want == 0 {
        return SurfacePoint::position(Point3::from(s));
    }

    let wu = skl[1][0].w;
    let wv = skl[0][1].w;
    let su = (skl[1][0].xyz() - s * wu) * (1.0 / w);
    let sv = (skl[0][1].xyz() - s * wv) * (1.0 / w);
    let gradient = Some([su, sv]);
    if want == 1 {
        return SurfacePoint { point: Point3::from(s), gradient, laplacian: None };
    }

    let wuu = skl[2][0].w;
    let wvv = skl[0][2].w;
    let wuv = skl[1][1].w;
    let suu = (skl[2][0].xyz() - su * (2.0 * wu) - s * wuu) * (1.0 / w);
    let svv = (skl[0][2].xyz() - sv * (2.0 * wv) - s * wvv) * (1.0 / w);
    let suv = (skl[1][1].xyz() - su * wv - sv * wu - s * wuv) * (1.0 / w);
    SurfacePoint { point: Point3::from(s), gradient, laplacian: Some([suu, svv, suv]) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter_cylinder(weight: f64) -> NurbsSurface {
        // Quadratic arc in XZ extruded along Y.
        let arc = [Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 1.0), Point3::new(0.0, 0.0, 1.0)];
        let mut poles = Vec::new();
        let mut weights = Vec::new();
        for j in 0..2 {
            for (i, p) in arc.iter().enumerate() {
                poles.push(Point3::new(p.x, j as f64 * 2.0, p.z));
                weights.push(if i == 1 { weight } else { 1.0 });
            }
        }
        NurbsSurface::new(
            2,
            1,
            3,
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            poles,
            Some(weights),
        )
        .unwrap()
    }

    #[test]
    fn unit_weights_demote_to_polynomial() {
        let s = quarter_cylinder(1.0);
        assert!(!s.is_rational());
        let r = quarter_cylinder(std::f64::consts::FRAC_1_SQRT_2);
        assert!(r.is_rational());
    }

    #[test]
    fn rational_arc_stays_on_cylinder() {
        let s = quarter_cylinder(std::f64::consts::FRAC_1_SQRT_2);
        for k in 0..=10 {
            let u = k as f64 / 10.0;
            let p = s.evaluate(u, 0.3, DerivativeOrder::Zero).point;
            let r = (p.x * p.x + p.z * p.z).sqrt();
            assert!((r - 1.0).abs() < 1e-12, "u={u} r={r}");
            assert!((p.y - 0.6).abs() < 1e-12);
        }
    }

    #[test]
    fn rational_derivatives_match_finite_differences() {
        let s = quarter_cylinder(std::f64::consts::FRAC_1_SQRT_2);
        let (u, v) = (0.4, 0.7);
        let h = 1e-6;
        let e = s.evaluate(u, v, DerivativeOrder::Two);
        let [su, sv] = e.gradient.unwrap();
        let fd_u = (s.evaluate(u + h, v, DerivativeOrder::Zero).point
            - s.evaluate(u - h, v, DerivativeOrder::Zero).point)
            * (0.5 / h);
        let fd_v = (s.evaluate(u, v + h, DerivativeOrder::Zero).point
            - s.evaluate(u, v - h, DerivativeOrder::Zero).point)
            * (0.5 / h);
        assert!((su - fd_u).length() < 1e-6);
        assert!((sv - fd_v).length() < 1e-6);

        let [suu, _, suv] = e.laplacian.unwrap();
        let g = 1e-4;
        let gp = s.evaluate(u + g, v, DerivativeOrder::One).gradient.unwrap();
        let gm = s.evaluate(u - g, v, DerivativeOrder::One).gradient.unwrap();
        assert!((suu - (gp[0] - gm[0]) * (0.5 / g)).length() < 1e-5);
        assert!((suv - (gp[1] - gm[1]) * (0.5 / g)).length() < 1e-5);
    }

    #[test]
    fn corner_points_round_trip() {
        let s = quarter_cylinder(1.0);
        assert_eq!(s.evaluate(0.0, 0.0, DerivativeOrder::Zero).point, s.poles()[0]);
        assert_eq!(s.evaluate(1.0, 1.0, DerivativeOrder::Zero).point, s.poles()[5]);
        // Power-of-two weights keep the homogeneous round trip exact.
        let r = quarter_cylinder(0.5);
        assert_eq!(r.evaluate(1.0, 0.0, DerivativeOrder::Zero).point, r.poles()[2]);
    }

    #[test]
    fn rejects_non_positive_weight() {
        let err = NurbsSurface::new(
            1,
            1,
            2,
            2,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![Point3::ORIGIN; 4],
            Some(vec![1.0, 0.0, 1.0, 1.0]),
        )
        .unwrap_err();
        assert_eq!(err, SurfaceError::InvalidWeight);
    }
}
