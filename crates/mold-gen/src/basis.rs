//! B-spline span lookup, basis functions, and surface evaluation for
//! [`FittedNurbs`] data.

use cast_types::{DPoint, DVector, FittedNurbs};

/// Knot span containing `t`: `i` with `knots[i] <= t < knots[i+1]`,
/// clamped so the end of the domain stays in the last valid span.
pub(crate) fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
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

/// The `degree + 1` nonzero basis values `N[span-degree..=span]` at `t`.
pub(crate) fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;
    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            if denom.abs() < 1e-30 {
                n[j] = saved;
                continue;
            }
            let temp = n[r] / denom;
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }
    n
}

/// Basis values and first derivatives at `t` (the `d = 1` case of the
/// standard derivative recurrence).
pub(crate) fn basis_functions_d1(
    knots: &[f64],
    span: usize,
    degree: usize,
    t: f64,
) -> (Vec<f64>, Vec<f64>) {
    let values = basis_functions(knots, span, degree, t);
    let mut derivatives = vec![0.0; degree + 1];
    if degree == 0 {
        return (values, derivatives);
    }
    // Derivative from the degree-1 basis.
    let lower = basis_functions_of_degree(knots, span, degree - 1, t);
    let p = degree as f64;
    for i in 0..=degree {
        let mut d = 0.0;
        if i > 0 {
            let denom = knots[span - degree + i + degree] - knots[span - degree + i];
            if denom.abs() > 1e-30 {
                d += p * lower[i - 1] / denom;
            }
        }
        if i < degree {
            let denom = knots[span + i + 1] - knots[span - degree + i + 1];
            if denom.abs() > 1e-30 {
                d -= p * lower[i] / denom;
            }
        }
        derivatives[i] = d;
    }
    (values, derivatives)
}

/// Nonzero degree-(p-1) basis at `span`: entry `k` is
/// `N_{span-p+1+k, p-1}`, exactly the offsets the derivative
/// recurrence consumes.
fn basis_functions_of_degree(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    basis_functions(knots, span, degree, t)
}

/// Evaluate a fitted surface point (rational form; fitted weights are
/// 1.0 but imported data may not be).
pub fn surface_point(surface: &FittedNurbs, u: f64, v: f64) -> DPoint {
    let nu = surface.count_u - 1;
    let nv = surface.count_v - 1;
    let su = find_span(&surface.knots_u, nu, surface.degree_u, u);
    let sv = find_span(&surface.knots_v, nv, surface.degree_v, v);
    let bu = basis_functions(&surface.knots_u, su, surface.degree_u, u);
    let bv = basis_functions(&surface.knots_v, sv, surface.degree_v, v);

    let mut acc = DVector::zeros();
    let mut w_acc = 0.0;
    for (a, &wu) in bu.iter().enumerate() {
        let i = su - surface.degree_u + a;
        for (b, &wv) in bv.iter().enumerate() {
            let j = sv - surface.degree_v + b;
            let w = surface.weights[i * surface.count_v + j] * wu * wv;
            let p = surface.control_points[i * surface.count_v + j];
            acc += DVector::new(p[0], p[1], p[2]) * w;
            w_acc += w;
        }
    }
    DPoint::from(acc / w_acc.max(1e-30))
}

/// Surface point with first derivatives (quotient rule over the
/// homogeneous form).
pub fn surface_point_with_derivatives(
    surface: &FittedNurbs,
    u: f64,
    v: f64,
) -> (DPoint, DVector, DVector) {
    let nu = surface.count_u - 1;
    let nv = surface.count_v - 1;
    let su = find_span(&surface.knots_u, nu, surface.degree_u, u);
    let sv = find_span(&surface.knots_v, nv, surface.degree_v, v);
    let (bu, du) = basis_functions_d1(&surface.knots_u, su, surface.degree_u, u);
    let (bv, dv) = basis_functions_d1(&surface.knots_v, sv, surface.degree_v, v);

    let mut a00 = DVector::zeros();
    let mut a10 = DVector::zeros();
    let mut a01 = DVector::zeros();
    let (mut w00, mut w10, mut w01) = (0.0, 0.0, 0.0);
    for a in 0..bu.len() {
        let i = su - surface.degree_u + a;
        for b in 0..bv.len() {
            let j = sv - surface.degree_v + b;
            let w = surface.weights[i * surface.count_v + j];
            let p = surface.control_points[i * surface.count_v + j];
            let hp = DVector::new(p[0], p[1], p[2]) * w;
            a00 += hp * (bu[a] * bv[b]);
            a10 += hp * (du[a] * bv[b]);
            a01 += hp * (bu[a] * dv[b]);
            w00 += w * bu[a] * bv[b];
            w10 += w * du[a] * bv[b];
            w01 += w * bu[a] * dv[b];
        }
    }
    let w00 = if w00.abs() < 1e-30 { 1e-30 } else { w00 };
    let point = a00 / w00;
    let der_u = (a10 - point * w10) / w00;
    let der_v = (a01 - point * w01) / w00;
    (DPoint::from(point), der_u, der_v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bilinear() -> FittedNurbs {
        FittedNurbs {
            degree_u: 1,
            degree_v: 1,
            count_u: 2,
            count_v: 2,
            control_points: vec![
                [0.0, 0.0, 0.0],
                [0.0, 2.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 2.0, 0.0],
            ],
            weights: vec![1.0; 4],
            knots_u: vec![0.0, 0.0, 1.0, 1.0],
            knots_v: vec![0.0, 0.0, 1.0, 1.0],
        }
    }

    #[test]
    fn bilinear_patch_interpolates() {
        let surface = flat_bilinear();
        let p = surface_point(&surface, 0.0, 0.0);
        assert!((p.coords.norm()) < 1e-14);
        let p = surface_point(&surface, 1.0, 1.0);
        assert!((p.x - 1.0).abs() < 1e-14 && (p.y - 2.0).abs() < 1e-14);
        let p = surface_point(&surface, 0.5, 0.25);
        assert!((p.x - 0.5).abs() < 1e-14 && (p.y - 0.5).abs() < 1e-14);
    }

    #[test]
    fn derivatives_of_bilinear_patch_are_constant() {
        let surface = flat_bilinear();
        let (_, der_u, der_v) = surface_point_with_derivatives(&surface, 0.3, 0.7);
        assert!((der_u - DVector::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((der_v - DVector::new(0.0, 2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn span_lookup_clamps_to_domain() {
        let knots = vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0];
        // degree 2, 4 control points, n = 3.
        assert_eq!(find_span(&knots, 3, 2, 0.0), 2);
        assert_eq!(find_span(&knots, 3, 2, 0.49), 2);
        assert_eq!(find_span(&knots, 3, 2, 0.5), 3);
        assert_eq!(find_span(&knots, 3, 2, 1.0), 3);
    }
}
