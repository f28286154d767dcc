//! Eigenmodes of the Laplace-Beltrami operator.

use serde::{Deserialize, Serialize};

/// One solution of the generalized eigenproblem `−L v = λ A v`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigenMode {
    /// Position in the ascending spectrum; mode 0 is the constant.
    pub index: usize,
    /// Eigenvalue, `≥ 0` (0 for the constant mode on a closed surface).
    pub eigenvalue: f64,
    /// Eigenfunction sampled at tessellation vertices.
    pub values: Vec<f64>,
    /// Number of near-equal eigenvalues around this one. Symmetric shapes
    /// produce repeated eigenvalues whose eigenfunctions mix freely.
    pub multiplicity_hint: usize,
}

impl EigenMode {
    /// True when this is (numerically) the constant kernel mode.
    pub fn is_constant_mode(&self, tol: f64) -> bool {
        self.eigenvalue.abs() <= tol
    }
}
