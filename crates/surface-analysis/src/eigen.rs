//! Smallest eigenpairs of the generalized problem `−L v = λ A v`.
//!
//! The normalized operator `M = −A^{-1/2} L A^{-1/2}` is symmetric
//! positive semi-definite, so the generalized problem reduces to an
//! ordinary symmetric one in `y = A^{1/2} v`. Smallest eigenvalues of
//! `M` are obtained as the largest of the Gershgorin-shifted operator
//! `B = σI − M` via Lanczos iteration with full reorthogonalization;
//! the small tridiagonal system is handed to a dense symmetric solver.

use cast_types::{CancelToken, EigenMode};
use nalgebra::{DMatrix, DVector as DnVector};

use crate::error::AnalysisError;
use crate::laplacian::{matvec, LaplaceOperator};

/// Residual tolerance for a Ritz pair to count as converged.
const RITZ_TOL: f64 = 1e-8;
/// Two eigenvalues within this relative distance share a multiplicity
/// hint.
const MULTIPLICITY_REL_TOL: f64 = 1e-6;

/// Solve for the `k` smallest eigenpairs. Cancellable between Lanczos
/// steps.
pub fn solve_smallest(
    operator: &LaplaceOperator,
    k: usize,
    cancel: Option<&CancelToken>,
) -> Result<Vec<EigenMode>, AnalysisError> {
    let n = operator.vertex_count();
    let k = k.min(n.saturating_sub(1)).max(1);

    // Gershgorin upper bound of M = -L_n.
    let mut sigma = 0.0_f64;
    for row in operator.normalized().row_iter() {
        let s: f64 = row.values().iter().map(|v| v.abs()).sum();
        sigma = sigma.max(s);
    }
    sigma = sigma.max(1e-12);

    // Sphere-like spectra cluster in triples; generous Krylov depth
    // keeps the clustered small modes converging.
    let steps = (8 * k + 80).min(n);
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(steps);
    let mut alphas: Vec<f64> = Vec::with_capacity(steps);
    let mut betas: Vec<f64> = Vec::with_capacity(steps);

    // Deterministic start vector.
    let mut q = pseudo_random(n, 0x5eed);
    normalize(&mut q);

    let mut scratch = vec![0.0_f64; n];
    let mut iterations = 0usize;
    for j in 0..steps {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
        }
        iterations = j + 1;

        // w = B q = sigma q - M q = sigma q + L_n q.
        matvec(operator.normalized(), &q, &mut scratch);
        let mut w: Vec<f64> = (0..n).map(|i| sigma * q[i] + scratch[i]).collect();

        let alpha = dot(&q, &w);
        alphas.push(alpha);
        for (wi, qi) in w.iter_mut().zip(&q) {
            *wi -= alpha * qi;
        }
        if let Some(prev) = basis.last() {
            let beta_prev = *betas.last().unwrap_or(&0.0);
            for (wi, pi) in w.iter_mut().zip(prev) {
                *wi -= beta_prev * pi;
            }
        }
        basis.push(q.clone());
        // Full reorthogonalization keeps the basis clean enough for
        // clustered spectra.
        for b in &basis {
            let c = dot(&w, b);
            for (wi, bi) in w.iter_mut().zip(b) {
                *wi -= c * bi;
            }
        }

        let beta = norm(&w);
        if beta < 1e-13 {
            break;
        }
        betas.push(beta);
        for wi in w.iter_mut() {
            *wi /= beta;
        }
        q = w;
    }

    let m = basis.len();
    let mut tri = DMatrix::<f64>::zeros(m, m);
    for i in 0..m {
        tri[(i, i)] = alphas[i];
        if i + 1 < m {
            tri[(i, i + 1)] = betas[i];
            tri[(i + 1, i)] = betas[i];
        }
    }
    let decomposition = tri.symmetric_eigen();

    // Ritz values of B, largest first -> smallest eigenvalues of M.
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| {
        decomposition.eigenvalues[b]
            .partial_cmp(&decomposition.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let last_beta = betas.last().copied().unwrap_or(0.0);
    let mass_scale: Vec<f64> = operator
        .mass()
        .iter()
        .map(|&mi| 1.0 / mi.max(1e-30).sqrt())
        .collect();

    let mut modes = Vec::with_capacity(k);
    let mut eigenvalues = Vec::with_capacity(k);
    for &col in order.iter().take(k) {
        let theta = decomposition.eigenvalues[col];
        let y = decomposition.eigenvectors.column(col);

        // Residual estimate for a Lanczos Ritz pair. The k smallest
        // must all converge; a hole in the spectrum is a failure, not
        // something to paper over with higher modes.
        let residual = (last_beta * y[m - 1]).abs();
        if residual > RITZ_TOL * sigma.max(1.0) {
            break;
        }

        // Assemble the Ritz vector in normalized coordinates.
        let mut vector = vec![0.0_f64; n];
        for (j, b) in basis.iter().enumerate() {
            let w = y[j];
            for (vi, bi) in vector.iter_mut().zip(b) {
                *vi += w * bi;
            }
        }
        // Back to the vertex function: v = A^{-1/2} y.
        for (vi, s) in vector.iter_mut().zip(&mass_scale) {
            *vi *= s;
        }
        deterministic_sign(&mut vector);

        let lambda = (sigma - theta).max(0.0);
        eigenvalues.push(lambda);
        modes.push(EigenMode {
            index: modes.len(),
            eigenvalue: lambda,
            values: vector,
            multiplicity_hint: 1,
        });
    }

    if modes.len() < k {
        return Err(AnalysisError::EigenSolverDidNotConverge {
            requested: k,
            converged: modes.len(),
            iterations,
        });
    }

    // Multiplicity hints from eigenvalue clustering.
    for i in 0..modes.len() {
        let lambda = eigenvalues[i];
        let scale = lambda.abs().max(1.0);
        modes[i].multiplicity_hint = eigenvalues
            .iter()
            .filter(|&&other| (other - lambda).abs() <= MULTIPLICITY_REL_TOL * scale)
            .count();
    }

    tracing::debug!(
        modes = modes.len(),
        iterations,
        lambda0 = modes.first().map(|m| m.eigenvalue).unwrap_or(f64::NAN),
        "eigensolve complete"
    );
    Ok(modes)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

fn normalize(a: &mut [f64]) {
    let n = norm(a);
    if n > 0.0 {
        for x in a.iter_mut() {
            *x /= n;
        }
    }
}

/// Deterministic start vector (xorshift); eigensolves must be
/// reproducible run to run.
fn pseudo_random(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed | 1;
    (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state as f64 / u64::MAX as f64) - 0.5
        })
        .collect()
}

/// Flip the vector so its largest-magnitude entry is positive; sign of
/// an eigenvector is otherwise arbitrary and would flip run to run.
fn deterministic_sign(v: &mut [f64]) {
    let mut best = 0usize;
    for (i, x) in v.iter().enumerate() {
        if x.abs() > v[best].abs() {
            best = i;
        }
    }
    if v[best] < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
}

/// Convenience: the `DnVector` form of a mode's values.
pub fn mode_vector(mode: &EigenMode) -> DnVector<f64> {
    DnVector::from_vec(mode.values.clone())
}
