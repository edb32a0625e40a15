//! Cutting-point lists: merging and spacing.

use std::cmp::Ordering;

use crate::topo::{CuttingPoint, CuttingPointType, EdgeCrossings};

use super::criteria::{density_integral, density_quantiles};

const fn rank(kind: CuttingPointType) -> u8 {
    match kind {
        CuttingPointType::Vertex => 0,
        CuttingPointType::Imposed => 1,
        CuttingPointType::IsoU | CuttingPointType::IsoV | CuttingPointType::IsoUV => 2,
        CuttingPointType::Other => 3,
    }
}

fn compare(a: &CuttingPoint, b: &CuttingPoint) -> Ordering {
    a.coordinate.total_cmp(&b.coordinate).then_with(|| rank(a.kind).cmp(&rank(b.kind)))
}

/// Union of two opposite-node sets, first come first kept.
fn union_nodes(a: [Option<u32>; 2], b: [Option<u32>; 2]) -> [Option<u32>; 2] {
    let mut out = [None, None];
    let mut len = 0;
    for node in a.into_iter().chain(b).flatten() {
        if len < 2 && !out[..len].contains(&Some(node)) {
            out[len] = Some(node);
            len += 1;
        }
    }
    out
}

/// Fuse two points closer than their admissible delta; `None` when both must stay.
fn fuse(a: &CuttingPoint, b: &CuttingPoint) -> Option<CuttingPoint> {
    use CuttingPointType::{Imposed, IsoUV, Vertex};

    let (kind, coordinate) = match (a.kind, b.kind) {
        (Vertex, Vertex) => return None,
        (Vertex, _) => (Vertex, a.coordinate),
        (_, Vertex) => (Vertex, b.coordinate),
        (Imposed, Imposed) => (Imposed, 0.5 * (a.coordinate + b.coordinate)),
        (Imposed, _) => (Imposed, a.coordinate),
        (_, Imposed) => (Imposed, b.coordinate),
        (ka, kb) if ka.is_iso() && kb.is_iso() => {
            let kind = if ka == kb { ka } else { IsoUV };
            (kind, 0.5 * (a.coordinate + b.coordinate))
        }
        (ka, _) if ka.is_iso() => (ka, a.coordinate),
        (_, kb) if kb.is_iso() => (kb, b.coordinate),
        (ka, _) => (ka, 0.5 * (a.coordinate + b.coordinate)),
    };
    Some(CuttingPoint {
        coordinate,
        kind,
        opposite_nodes: union_nodes(a.opposite_nodes, b.opposite_nodes),
        delta: a.delta.min(b.delta),
    })
}

fn merge_pass(points: &[CuttingPoint]) -> (Vec<CuttingPoint>, bool) {
    let mut out: Vec<CuttingPoint> = Vec::with_capacity(points.len());
    let mut changed = false;
    for p in points {
        if let Some(last) = out.last_mut() {
            let gap = p.coordinate - last.coordinate;
            if gap < last.delta.min(p.delta) {
                if let Some(fused) = fuse(last, p) {
                    *last = fused;
                    changed = true;
                    continue;
                }
            }
        }
        out.push(*p);
    }
    (out, changed)
}

/// Element counts within this of an integer are rounded down.
const SPACING_SLACK: f64 = 1e-6;

/// Sort `points` and fuse every pair closer than the smaller of their deltas.
///
/// Vertex points win over everything else and never fuse with each other.
/// Imposed points win over iso and spacing points, two imposed points average.
/// Two iso points of different directions become [`CuttingPointType::IsoUV`].
/// Passes repeat until nothing changes, so merging a merged list returns it
/// unchanged.
#[must_use]
pub fn merge_cutting_points(mut points: Vec<CuttingPoint>) -> Vec<CuttingPoint> {
    points.retain(|p| p.coordinate.is_finite());
    points.sort_by(compare);
    loop {
        let (next, changed) = merge_pass(&points);
        points = next;
        if !changed {
            return points;
        }
    }
}

/// Insert [`CuttingPointType::Other`] points between consecutive cutting points
/// wherever the admissible step of `crossings` is smaller than the gap.
///
/// `delta_of` gives the merge delta of an inserted coordinate.
#[must_use]
pub fn apply_spacing(
    points: &[CuttingPoint],
    crossings: &EdgeCrossings,
    max_per_gap: usize,
    delta_of: impl Fn(f64) -> f64,
) -> Vec<CuttingPoint> {
    let mut out = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        out.push(*p);
        let Some(next) = points.get(i + 1) else {
            break;
        };
        let (a, b) = (p.coordinate, next.coordinate);
        let elements = density_integral(crossings, a, b);
        if !elements.is_finite() || elements <= 1.0 + SPACING_SLACK {
            continue;
        }
        let parts = ((elements - SPACING_SLACK).ceil() as usize).min(max_per_gap.max(1) + 1);
        out.extend(
            density_quantiles(crossings, a, b, parts)
                .into_iter()
                .map(|t| CuttingPoint::new(t, CuttingPointType::Other, delta_of(t))),
        );
    }
    out
}

/// Parameters in `(t0, t1)` where `f` crosses zero, refined by bisection.
///
/// `f` is sampled at `samples + 1` uniform parameters; an interval whose
/// endpoints have strictly opposite signs holds one root. Samples where `f`
/// is exactly zero count once, unless `f` vanishes on a whole interval.
#[must_use]
pub fn find_crossings(t0: f64, t1: f64, samples: usize, f: impl Fn(f64) -> f64) -> Vec<f64> {
    let samples = samples.max(1);
    let ts: Vec<f64> = (0..=samples)
        .map(|i| if i == samples { t1 } else { t0 + (t1 - t0) * i as f64 / samples as f64 })
        .collect();
    let values: Vec<f64> = ts.iter().map(|t| f(*t)).collect();

    let mut roots = Vec::new();
    for i in 0..samples {
        let (a, b) = (values[i], values[i + 1]);
        if a == 0.0 && i > 0 && values[i - 1] != 0.0 && b != 0.0 {
            roots.push(ts[i]);
        } else if a * b < 0.0 {
            roots.push(bisect(ts[i], ts[i + 1], a, &f));
        }
    }
    roots
}

fn bisect(mut lo: f64, mut hi: f64, mut f_lo: f64, f: &impl Fn(f64) -> f64) -> f64 {
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || hi - lo <= f64::EPSILON * (1.0 + mid.abs()) {
            return mid;
        }
        if (f_mid < 0.0) == (f_lo < 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}
