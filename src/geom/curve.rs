//! Restriction curves living in the parameter plane of a carrier surface.
//!
//! Edges of a face are described by a 2D curve `t -> (u, v)` over a linear
//! parameter interval. The mesher needs positions and the first two derivatives
//! (to apply chord and angle criteria through the chain rule).

use super::bspline::{basis_derivatives, find_span, validate_knots};
use super::core::UvPoint;
use super::surface::SurfaceError;

/// Position and derivatives of a restriction curve at one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSample {
    pub point: UvPoint,
    pub d1: UvPoint,
    pub d2: UvPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Curve2d {
    /// Segment from `start` (t = 0) to `end` (t = 1).
    Line { start: UvPoint, end: UvPoint },
    /// Polyline through `points`; vertex `i` sits at `t = i`.
    Polyline { points: Vec<UvPoint> },
    /// Non-rational B-spline in the parameter plane.
    Nurbs { degree: usize, knots: Vec<f64>, poles: Vec<UvPoint> },
}

impl Curve2d {
    #[must_use]
    pub const fn line(start: UvPoint, end: UvPoint) -> Self {
        Self::Line { start, end }
    }

    pub fn polyline(points: Vec<UvPoint>) -> Result<Self, SurfaceError> {
        if points.len() < 2 {
            return Err(SurfaceError::PoleCount { expected: 2, actual: points.len() });
        }
        Ok(Self::Polyline { points })
    }

    pub fn nurbs(degree: usize, knots: Vec<f64>, poles: Vec<UvPoint>) -> Result<Self, SurfaceError> {
        validate_knots(poles.len(), degree, &knots).map_err(SurfaceError::Knots)?;
        Ok(Self::Nurbs { degree, knots, poles })
    }

    /// Natural parameter interval of the curve.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        match self {
            Self::Line { .. } => (0.0, 1.0),
            Self::Polyline { points } => (0.0, (points.len() - 1) as f64),
            Self::Nurbs { degree, knots, poles } => (knots[*degree], knots[poles.len()]),
        }
    }

    #[must_use]
    pub fn point_at(&self, t: f64) -> UvPoint {
        self.sample(t).point
    }

    #[must_use]
    pub fn sample(&self, t: f64) -> CurveSample {
        let zero = UvPoint::new(0.0, 0.0);
        match self {
            Self::Line { start, end } => CurveSample {
                point: start.lerp(*end, t),
                d1: UvPoint::new(end.u - start.u, end.v - start.v),
                d2: zero,
            },
            Self::Polyline { points } => {
                let last = points.len() - 2;
                let seg = (t.floor().max(0.0) as usize).min(last);
                let a = points[seg];
                let b = points[seg + 1];
                CurveSample {
                    point: a.lerp(b, t - seg as f64),
                    d1: UvPoint::new(b.u - a.u, b.v - a.v),
                    d2: zero,
                }
            }
            Self::Nurbs { degree, knots, poles } => {
                let span = find_span(poles.len() - 1, *degree, t, knots);
                let ders = basis_derivatives(span, t, *degree, 2, knots);
                let mut out = [zero; 3];
                for (k, row) in ders.iter().enumerate() {
                    for (j, n) in row.iter().enumerate() {
                        let p = poles[span - degree + j];
                        out[k].u += p.u * n;
                        out[k].v += p.v * n;
                    }
                }
                CurveSample { point: out[0], d1: out[1], d2: out[2] }
            }
        }
    }

    /// Break parameters where the tangent may be discontinuous.
    #[must_use]
    pub fn breaks(&self) -> Vec<f64> {
        match self {
            Self::Line { .. } => Vec::new(),
            Self::Polyline { points } => (1..points.len() - 1).map(|i| i as f64).collect(),
            Self::Nurbs { degree, knots, poles } => {
                let (t0, t1) = (knots[*degree], knots[poles.len()]);
                let mut out: Vec<f64> = Vec::new();
                let mut i = degree + 1;
                while i < poles.len() {
                    let k = knots[i];
                    let mult = knots.iter().filter(|x| **x == k).count();
                    if mult >= *degree && k > t0 && k < t1 && out.last() != Some(&k) {
                        out.push(k);
                    }
                    i += 1;
                }
                out
            }
        }
    }
}
