//! Parameter charts from a control face's `[0,1]²` domain onto the
//! local domains of its refined children.
//!
//! Quad faces split into four quadrant charts, one per child; these are
//! affine. A triangle face is parametrized as a collapsed quad (the
//! `v = 1` edge of the square degenerates to the third corner), mapped
//! through barycentric weights onto the face's three children; that
//! chart is rational, so its Jacobian and Hessian are carried
//! analytically.

/// A parameter map `(u, v) → (s, t)` with first and second derivatives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chart2 {
    pub s: f64,
    pub t: f64,
    /// Rows `[ds/du, ds/dv]` and `[dt/du, dt/dv]`.
    pub j: [[f64; 2]; 2],
    /// Hessian of `s`: `[[s_uu, s_uv], [s_uv, s_vv]]`.
    pub h_s: [[f64; 2]; 2],
    /// Hessian of `t`.
    pub h_t: [[f64; 2]; 2],
}

impl Chart2 {
    fn affine(s: f64, t: f64, j: [[f64; 2]; 2]) -> Self {
        Self {
            s,
            t,
            j,
            h_s: [[0.0; 2]; 2],
            h_t: [[0.0; 2]; 2],
        }
    }

    /// Compose with an affine inner map `(s, t) → (s', t')`.
    pub fn then_affine(&self, s2: f64, t2: f64, j2: [[f64; 2]; 2]) -> Self {
        let mut j = [[0.0; 2]; 2];
        for r in 0..2 {
            for c in 0..2 {
                j[r][c] = j2[r][0] * self.j[0][c] + j2[r][1] * self.j[1][c];
            }
        }
        let combine = |r: usize| -> [[f64; 2]; 2] {
            let mut h = [[0.0; 2]; 2];
            for a in 0..2 {
                for b in 0..2 {
                    h[a][b] = j2[r][0] * self.h_s[a][b] + j2[r][1] * self.h_t[a][b];
                }
            }
            h
        };
        Self {
            s: s2,
            t: t2,
            j,
            h_s: combine(0),
            h_t: combine(1),
        }
    }
}

/// Which quadrant of the unit square holds `(u, v)`; ties go to the
/// upper child so the selection is total.
pub(crate) fn quadrant(u: f64, v: f64) -> usize {
    match (u < 0.5, v < 0.5) {
        (true, true) => 0,
        (false, true) => 1,
        (false, false) => 2,
        (true, false) => 3,
    }
}

/// Local coordinates and Jacobian of quadrant `k`'s child chart.
///
/// Child `k` of a quad face `[v0, v1, v2, v3]` is `[vp(v_k), ep(e_k),
/// fp, ep(e_{k-1})]`; its local frame is rotated a quarter turn per
/// corner, which the Jacobians below encode.
pub(crate) fn quadrant_chart(k: usize, u: f64, v: f64) -> Chart2 {
    match k {
        0 => Chart2::affine(2.0 * u, 2.0 * v, [[2.0, 0.0], [0.0, 2.0]]),
        1 => Chart2::affine(2.0 * v, 2.0 * (1.0 - u), [[0.0, 2.0], [-2.0, 0.0]]),
        2 => Chart2::affine(2.0 * (1.0 - u), 2.0 * (1.0 - v), [[-2.0, 0.0], [0.0, -2.0]]),
        _ => Chart2::affine(2.0 * (1.0 - v), 2.0 * u, [[0.0, -2.0], [2.0, 0.0]]),
    }
}

/// Select the child of a quad face for `(u, v)` in the face domain.
pub(crate) fn quad_select(u: f64, v: f64) -> (usize, Chart2) {
    let k = quadrant(u, v);
    (k, quadrant_chart(k, u, v))
}

/// Barycentric weights of the collapsed-quad triangle parametrization
/// with first and second partials. `w2` absorbs the whole `v = 1` edge.
fn collapse_weights(u: f64, v: f64) -> [Bary; 3] {
    [
        Bary {
            w: (1.0 - u) * (1.0 - v),
            wu: -(1.0 - v),
            wv: -(1.0 - u),
            wuv: 1.0,
        },
        Bary {
            w: u * (1.0 - v),
            wu: 1.0 - v,
            wv: -u,
            wuv: -1.0,
        },
        Bary {
            w: v,
            wu: 0.0,
            wv: 1.0,
            wuv: 0.0,
        },
    ]
}

#[derive(Debug, Clone, Copy)]
struct Bary {
    w: f64,
    wu: f64,
    wv: f64,
    wuv: f64,
}

/// Select the child of a triangle face for `(u, v)` and produce the full
/// second-order chart onto that child's `[0,1]²` domain.
///
/// Within child `k` the chart solves the inverse bilinear problem
/// `A = s(3 − t)`, `B = t(3 − s)` with `A = 6·w_{k+1}` and
/// `B = 6·w_{k+2}`; the discriminant stays positive away from the
/// collapsed corner, where only the Jacobian (not the map) degenerates.
pub(crate) fn tri_select(u: f64, v: f64) -> (usize, Chart2) {
    let w = collapse_weights(u, v);
    let mut k = 0;
    for i in 1..3 {
        if w[i].w > w[k].w {
            k = i;
        }
    }
    let a = w[(k + 1) % 3];
    let b = w[(k + 2) % 3];

    let (aa, bb) = (6.0 * a.w, 6.0 * b.w);
    let c = aa - bb - 9.0;
    let d = (c * c - 36.0 * bb).max(1e-30);
    let sqrt_d = d.sqrt();

    let t = (9.0 + bb - aa - sqrt_d) / 6.0;
    let s = aa / (3.0 - t);

    // Partials of t and s with respect to (A, B).
    let d32 = d * sqrt_d;
    let t_a = (-1.0 - c / sqrt_d) / 6.0;
    let t_b = (1.0 + (c + 18.0) / sqrt_d) / 6.0;
    let t_aa = 6.0 * bb / d32;
    let t_ab = -3.0 * (aa + bb - 9.0) / d32;
    let t_bb = 6.0 * aa / d32;

    let inv = 1.0 / (3.0 - t);
    let inv2 = inv * inv;
    let inv3 = inv2 * inv;
    let s_a = inv + aa * t_a * inv2;
    let s_b = aa * t_b * inv2;
    let s_aa = (2.0 * t_a + aa * t_aa) * inv2 + 2.0 * aa * t_a * t_a * inv3;
    let s_ab = t_b * inv2 + aa * (t_ab * inv2 + 2.0 * t_a * t_b * inv3);
    let s_bb = aa * (t_bb * inv2 + 2.0 * t_b * t_b * inv3);

    // Chain through A(u, v) = 6 a.w and B(u, v) = 6 b.w.
    let (a_u, a_v, a_uv) = (6.0 * a.wu, 6.0 * a.wv, 6.0 * a.wuv);
    let (b_u, b_v, b_uv) = (6.0 * b.wu, 6.0 * b.wv, 6.0 * b.wuv);

    let chain1 = |f_a: f64, f_b: f64| -> [f64; 2] {
        [f_a * a_u + f_b * b_u, f_a * a_v + f_b * b_v]
    };
    let chain2 = |f_a: f64, f_b: f64, f_aa: f64, f_ab: f64, f_bb: f64| -> [[f64; 2]; 2] {
        let duu = f_aa * a_u * a_u + 2.0 * f_ab * a_u * b_u + f_bb * b_u * b_u;
        let dvv = f_aa * a_v * a_v + 2.0 * f_ab * a_v * b_v + f_bb * b_v * b_v;
        let duv = f_aa * a_u * a_v
            + f_ab * (a_u * b_v + a_v * b_u)
            + f_bb * b_u * b_v
            + f_a * a_uv
            + f_b * b_uv;
        [[duu, duv], [duv, dvv]]
    };

    let js = chain1(s_a, s_b);
    let jt = chain1(t_a, t_b);
    (
        k,
        Chart2 {
            s,
            t,
            j: [js, jt],
            h_s: chain2(s_a, s_b, s_aa, s_ab, s_bb),
            h_t: chain2(t_a, t_b, t_aa, t_ab, t_bb),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_quadrant_charts_hit_child_corners() {
        // Face corner 1 is child 1's local origin.
        let (k, c) = quad_select(1.0, 0.0);
        assert_eq!(k, 1);
        assert!(c.s.abs() < 1e-15 && c.t.abs() < 1e-15);
        // The face center is every child's far corner; quadrant 2 wins ties.
        let (k, c) = quad_select(0.5, 0.5);
        assert_eq!(k, 2);
        assert!((c.s - 1.0).abs() < 1e-15 && (c.t - 1.0).abs() < 1e-15);
    }

    #[test]
    fn tri_chart_hits_known_landmarks() {
        // Corner 0.
        let (k, c) = tri_select(0.0, 0.0);
        assert_eq!(k, 0);
        assert!(c.s.abs() < 1e-12 && c.t.abs() < 1e-12);
        // Whole top edge collapses onto corner 2.
        let (k, c) = tri_select(0.3, 1.0);
        assert_eq!(k, 2);
        assert!(c.s.abs() < 1e-12 && c.t.abs() < 1e-12);
        // Face centroid parameter lands inside child 2 at its far corner
        // side; weights (1/4, 1/4, 1/2).
        let (k, c) = tri_select(0.5, 0.5);
        assert_eq!(k, 2);
        assert!(c.s > 0.0 && c.s < 1.0 && c.t > 0.0 && c.t < 1.0);
    }

    #[test]
    fn tri_chart_jacobian_matches_finite_differences() {
        let (u, v) = (0.31, 0.22);
        let (k, c) = tri_select(u, v);
        let h = 1e-6;
        let (ku, cu) = tri_select(u + h, v);
        let (kv, cv) = tri_select(u, v + h);
        assert_eq!(k, ku);
        assert_eq!(k, kv);
        assert!((c.j[0][0] - (cu.s - c.s) / h).abs() < 1e-5);
        assert!((c.j[1][0] - (cu.t - c.t) / h).abs() < 1e-5);
        assert!((c.j[0][1] - (cv.s - c.s) / h).abs() < 1e-5);
        assert!((c.j[1][1] - (cv.t - c.t) / h).abs() < 1e-5);
    }

    #[test]
    fn tri_chart_hessian_matches_finite_differences() {
        let (u, v) = (0.18, 0.27);
        let h = 1e-5;
        let (_, c) = tri_select(u, v);
        let (_, cp) = tri_select(u + h, v);
        let (_, cm) = tri_select(u - h, v);
        let s_uu = (cp.s - 2.0 * c.s + cm.s) / (h * h);
        assert!((c.h_s[0][0] - s_uu).abs() < 1e-3);
        let (_, cpp) = tri_select(u + h, v + h);
        let (_, cpm) = tri_select(u + h, v - h);
        let (_, cmp) = tri_select(u - h, v + h);
        let (_, cmm) = tri_select(u - h, v - h);
        let s_uv = (cpp.s - cpm.s - cmp.s + cmm.s) / (4.0 * h * h);
        assert!((c.h_s[0][1] - s_uv).abs() < 1e-3);
    }
}
