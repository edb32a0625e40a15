//! B-spline basis functions shared by NURBS surfaces and restriction curves.
//!
//! The evaluator follows the classic triangular table formulation: basis values
//! are built from the left/right knot differences and derivatives are obtained
//! from the same table without re-evaluating the recursion.

/// Highest derivative order the mesher asks for.
pub const MAX_DERIVATIVE_ORDER: usize = 2;

/// Locate the knot span index containing `t`.
///
/// `n` is the index of the last control point and `degree` the curve degree, so
/// the valid spans are `degree..=n`. Parameters at or past the end of the domain
/// map onto the last non-empty span.
#[must_use]
pub fn find_span(n: usize, degree: usize, t: f64, knots: &[f64]) -> usize {
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        return degree;
    }

    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Basis functions and their derivatives at `t` in knot span `span`.
///
/// Returns `ders[k][j]`: the k-th derivative of basis function `span - degree + j`,
/// for `k` in `0..=order` (capped at the degree; higher derivatives are zero).
#[must_use]
pub fn basis_derivatives(
    span: usize,
    t: f64,
    degree: usize,
    order: usize,
    knots: &[f64],
) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            // Lower triangle keeps the knot differences.
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = if ndu[j][r] == 0.0 { 0.0 } else { ndu[r][j - 1] / ndu[j][r] };
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; order + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let max_k = order.min(p);
    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let mut s1 = 0usize;
        let mut s2 = 1usize;
        a[0].fill(0.0);
        a[1].fill(0.0);
        a[0][0] = 1.0;

        for k in 1..=max_k {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;

            if r >= k {
                let denom = ndu[pk + 1][r - k];
                a[s2][0] = if denom == 0.0 { 0.0 } else { a[s1][0] / denom };
                d = a[s2][0] * ndu[r - k][pk];
            }

            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r as isize - 1 <= pk as isize { k - 1 } else { p - r };

            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                let denom = ndu[pk + 1][idx];
                a[s2][j] = if denom == 0.0 { 0.0 } else { (a[s1][j] - a[s1][j - 1]) / denom };
                d += a[s2][j] * ndu[idx][pk];
            }

            if r <= pk {
                let denom = ndu[pk + 1][r];
                a[s2][k] = if denom == 0.0 { 0.0 } else { -a[s1][k - 1] / denom };
                d += a[s2][k] * ndu[r][pk];
            }

            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=max_k {
        for value in &mut ders[k] {
            *value *= factor;
        }
        factor *= (p - k) as f64;
    }

    ders
}

/// Validate a knot vector for `count` control points of the given degree.
pub fn validate_knots(count: usize, degree: usize, knots: &[f64]) -> Result<(), String> {
    if degree == 0 {
        return Err("degree must be at least 1".to_string());
    }
    if count <= degree {
        return Err(format!(
            "need more than {degree} control points for degree {degree}, got {count}"
        ));
    }
    let expected = count + degree + 1;
    if knots.len() != expected {
        return Err(format!("expected {expected} knots, got {}", knots.len()));
    }
    if knots.iter().any(|k| !k.is_finite()) {
        return Err("knot vector contains non-finite values".to_string());
    }
    if knots.windows(2).any(|w| w[1] < w[0]) {
        return Err("knot vector must be non-decreasing".to_string());
    }
    if knots[count] <= knots[degree] {
        return Err("knot vector has an empty parameter domain".to_string());
    }
    Ok(())
}

/// Clamped uniform knot vector for `count` control points.
#[must_use]
pub fn clamped_uniform_knots(count: usize, degree: usize) -> Vec<f64> {
    let interior = count.saturating_sub(degree + 1);
    let mut knots = Vec::with_capacity(count + degree + 1);
    knots.extend(std::iter::repeat_n(0.0, degree + 1));
    for i in 1..=interior {
        knots.push(i as f64 / (interior + 1) as f64);
    }
    knots.extend(std::iter::repeat_n(1.0, degree + 1));
    knots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_partitions_unity_and_derivatives_sum_to_zero() {
        let knots = [0.0, 0.0, 0.0, 0.3, 0.7, 1.0, 1.0, 1.0];
        let n = 4;
        for &t in &[0.0, 0.1, 0.3, 0.55, 0.99, 1.0] {
            let span = find_span(n, 2, t, &knots);
            let ders = basis_derivatives(span, t, 2, 2, &knots);
            let sum: f64 = ders[0].iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "t={t} sum={sum}");
            let d1: f64 = ders[1].iter().sum();
            let d2: f64 = ders[2].iter().sum();
            assert!(d1.abs() < 1e-9);
            assert!(d2.abs() < 1e-9);
        }
    }

    #[test]
    fn bernstein_derivatives_match_closed_form() {
        // Degree 2 Bezier knots: N0 = (1-t)^2, N1 = 2t(1-t), N2 = t^2.
        let knots = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let t = 0.25;
        let span = find_span(2, 2, t, &knots);
        let ders = basis_derivatives(span, t, 2, 2, &knots);
        assert!((ders[0][0] - 0.5625).abs() < 1e-12);
        assert!((ders[1][0] + 1.5).abs() < 1e-12);
        assert!((ders[1][1] - 1.0).abs() < 1e-12);
        assert!((ders[2][0] - 2.0).abs() < 1e-12);
        assert!((ders[2][1] + 4.0).abs() < 1e-12);
    }

    #[test]
    fn endpoints_have_exact_unit_basis() {
        let knots = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let start = basis_derivatives(find_span(2, 2, 0.0, &knots), 0.0, 2, 0, &knots);
        assert_eq!(start[0], vec![1.0, 0.0, 0.0]);
        let end = basis_derivatives(find_span(2, 2, 1.0, &knots), 1.0, 2, 0, &knots);
        assert_eq!(end[0], vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn second_derivative_of_linear_basis_is_zero() {
        let knots = [0.0, 0.0, 1.0, 1.0];
        let ders = basis_derivatives(1, 0.4, 1, 2, &knots);
        assert_eq!(ders.len(), 3);
        assert!(ders[2].iter().all(|d| *d == 0.0));
    }

    #[test]
    fn knot_validation_rejects_bad_vectors() {
        assert!(validate_knots(3, 2, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).is_ok());
        assert!(validate_knots(3, 2, &[0.0, 0.0, 1.0, 1.0, 1.0]).is_err());
        assert!(validate_knots(3, 2, &[0.0, 0.0, 0.0, 0.5, 0.2, 1.0]).is_err());
        assert!(validate_knots(2, 2, &[0.0, 0.0, 0.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn clamped_uniform_has_expected_length() {
        let knots = clamped_uniform_knots(5, 3);
        assert_eq!(knots.len(), 9);
        assert_eq!(knots[3], 0.0);
        assert!((knots[4] - 0.5).abs() < 1e-12);
        assert_eq!(knots[5], 1.0);
    }
}
