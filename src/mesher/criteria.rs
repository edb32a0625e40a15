//! Meshing criteria and the admissible parameter steps they induce.

use serde::{Deserialize, Serialize};

use crate::geom::{
    CarrierSurface, CurveSample, DerivativeOrder, IsoAxis, UvDomain, UvPoint, Vec3,
};
use crate::topo::{Edge, EdgeCrossings};

/// Size, sag and angle limits applied to every mesh element.
///
/// `None` disables a criterion. With every criterion disabled a face keeps only
/// the points its topology imposes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshingCriteria {
    pub max_edge_length: Option<f64>,
    pub min_edge_length: f64,
    /// Maximum distance between a chord and the surface it approximates.
    pub chord_tolerance: Option<f64>,
    /// Maximum turning angle across one element, in radians.
    pub max_angle: Option<f64>,
}

impl Default for MeshingCriteria {
    fn default() -> Self {
        Self {
            max_edge_length: None,
            min_edge_length: 0.0,
            chord_tolerance: Some(1e-3),
            max_angle: Some(15f64.to_radians()),
        }
    }
}

impl MeshingCriteria {
    /// Largest parameter step allowed around a point with first and second
    /// derivatives `d1` and `d2` along the parameter.
    #[must_use]
    pub fn admissible_delta(&self, d1: Vec3, d2: Vec3) -> f64 {
        let speed = d1.length();
        if !speed.is_finite() || speed <= f64::EPSILON {
            return f64::INFINITY;
        }
        let mut delta = f64::INFINITY;
        if let Some(size) = self.max_edge_length.filter(|s| *s > 0.0) {
            delta = delta.min(size / speed);
        }
        let normal_curvature = d2.reject_from(d1).length();
        if let Some(sag) = self.chord_tolerance.filter(|s| *s > 0.0 && normal_curvature > f64::EPSILON) {
            delta = delta.min((8.0 * sag / normal_curvature).sqrt());
        }
        let turning = d1.cross(d2).length();
        if let Some(angle) = self.max_angle.filter(|a| *a > 0.0 && turning > f64::EPSILON) {
            delta = delta.min(angle * speed * speed / turning);
        }
        if self.min_edge_length > 0.0 {
            delta = delta.max(self.min_edge_length / speed);
        }
        delta
    }
}

/// Admissible steps along one parametric axis of a face, sampled on several iso
/// lines of the other axis and reduced to the most demanding value per interval.
#[must_use]
pub fn face_crossings(
    surface: &CarrierSurface,
    domain: UvDomain,
    axis: IsoAxis,
    criteria: &MeshingCriteria,
    lines: usize,
    samples: usize,
) -> EdgeCrossings {
    let (t0, t1) = domain.range(axis);
    let (s0, s1) = domain.range(axis.other());
    let samples = samples.max(1);
    let lines = lines.max(1);
    let coordinates: Vec<f64> = (0..=samples).map(|i| lerp(t0, t1, i as f64 / samples as f64)).collect();
    let mut delta_max = vec![f64::INFINITY; samples];
    for line in 0..lines {
        let s = lerp(s0, s1, (line as f64 + 0.5) / lines as f64);
        for (i, slot) in delta_max.iter_mut().enumerate() {
            let t = 0.5 * (coordinates[i] + coordinates[i + 1]);
            let (u, v) = match axis {
                IsoAxis::U => (t, s),
                IsoAxis::V => (s, t),
            };
            if let Some((d1, d2)) = surface.evaluate(u, v, DerivativeOrder::Two).along(axis) {
                *slot = slot.min(criteria.admissible_delta(d1, d2));
            }
        }
    }
    EdgeCrossings { coordinates, delta_max }
}

/// Admissible steps along a bounded edge, through the chain rule on its
/// restriction curve.
#[must_use]
pub fn edge_crossings(
    surface: &CarrierSurface,
    edge: &Edge,
    criteria: &MeshingCriteria,
    samples: usize,
) -> EdgeCrossings {
    let (t0, t1) = edge.boundary;
    let samples = samples.max(1);
    let mut coordinates: Vec<f64> = (0..=samples).map(|i| lerp(t0, t1, i as f64 / samples as f64)).collect();
    coordinates.extend(edge.curve.breaks().into_iter().filter(|b| *b > t0 && *b < t1));
    coordinates.sort_by(f64::total_cmp);
    coordinates.dedup();

    let delta_max = coordinates
        .windows(2)
        .map(|w| {
            let t = 0.5 * (w[0] + w[1]);
            let (d1, d2) = curve_derivatives(surface, &edge.curve.sample(t));
            criteria.admissible_delta(d1, d2)
        })
        .collect();
    EdgeCrossings { coordinates, delta_max }
}

fn curve_derivatives(surface: &CarrierSurface, sample: &CurveSample) -> (Vec3, Vec3) {
    let p = surface.evaluate(sample.point.u, sample.point.v, DerivativeOrder::Two);
    let Some([su, sv]) = p.gradient else {
        return (Vec3::ZERO, Vec3::ZERO);
    };
    let [suu, svv, suv] = p.laplacian.unwrap_or([Vec3::ZERO; 3]);
    let UvPoint { u: du, v: dv } = sample.d1;
    let UvPoint { u: ddu, v: ddv } = sample.d2;
    let d1 = su * du + sv * dv;
    let d2 = suu * (du * du) + suv * (2.0 * du * dv) + svv * (dv * dv) + su * ddu + sv * ddv;
    (d1, d2)
}

/// Number of elements the density `1 / delta` asks for over `[a, b]`.
#[must_use]
pub fn density_integral(crossings: &EdgeCrossings, a: f64, b: f64) -> f64 {
    if crossings.delta_max.is_empty() || b <= a {
        return 0.0;
    }
    let mut total = 0.0;
    for (i, delta) in crossings.delta_max.iter().enumerate() {
        let lo = crossings.coordinates[i].max(a);
        let hi = crossings.coordinates[i + 1].min(b);
        if hi > lo && delta.is_finite() && *delta > 0.0 {
            total += (hi - lo) / delta;
        }
    }
    total
}

/// Parameters splitting `[a, b]` into `parts` pieces of equal density.
#[must_use]
pub fn density_quantiles(crossings: &EdgeCrossings, a: f64, b: f64, parts: usize) -> Vec<f64> {
    if parts < 2 || b <= a {
        return Vec::new();
    }
    let total = density_integral(crossings, a, b);
    if total <= 0.0 {
        return (1..parts).map(|k| lerp(a, b, k as f64 / parts as f64)).collect();
    }

    let mut out = Vec::with_capacity(parts - 1);
    let mut k = 1;
    let mut acc = 0.0;
    for (i, delta) in crossings.delta_max.iter().enumerate() {
        let lo = crossings.coordinates[i].max(a);
        let hi = crossings.coordinates[i + 1].min(b);
        if hi <= lo || !delta.is_finite() || *delta <= 0.0 {
            continue;
        }
        let piece = (hi - lo) / delta;
        while k < parts {
            let target = total * k as f64 / parts as f64;
            if target > acc + piece {
                break;
            }
            out.push(lo + (target - acc) * delta);
            k += 1;
        }
        acc += piece;
    }
    out.retain(|t| *t > a && *t < b);
    out.dedup();
    out
}

/// Cut coordinates of `[a, b]` that satisfy the admissible steps, endpoints
/// included, with at most `max_cuts` coordinates.
#[must_use]
pub fn select_cuts(crossings: &EdgeCrossings, a: f64, b: f64, max_cuts: usize) -> Vec<f64> {
    let parts = density_integral(crossings, a, b).ceil();
    let parts = if parts.is_finite() { (parts as usize).clamp(1, max_cuts.max(2) - 1) } else { 1 };
    let mut out = Vec::with_capacity(parts + 1);
    out.push(a);
    out.extend(density_quantiles(crossings, a, b, parts));
    out.push(b);
    out
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    if t >= 1.0 { b } else { a + (b - a) * t }
}
