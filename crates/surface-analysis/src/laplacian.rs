//! Cotangent-weight Laplace-Beltrami operator on a tessellated limit
//! surface.

use std::collections::HashMap;
use std::sync::Arc;

use cast_types::{to_dpoint, TessellationResult};
use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};
use subd_eval::SubdEvaluator;
use uuid::Uuid;

use crate::error::AnalysisError;

/// Cotangents are clamped here to keep near-degenerate triangles from
/// dominating the operator.
const COT_CLAMP: f64 = 100.0;
/// Triangles with a smaller cross-product magnitude contribute nothing.
const DEGENERATE_CROSS: f64 = 1e-10;

/// The assembled operator: `L` (cotangent weights, negative
/// semi-definite), the barycentric lumped mass diagonal `A`, and the
/// symmetric normalized form `A^{-1/2} L A^{-1/2}`.
#[derive(Debug, Clone)]
pub struct LaplaceOperator {
    laplacian: CsrMatrix<f64>,
    normalized: CsrMatrix<f64>,
    mass: Vec<f64>,
    degenerate_triangles: usize,
}

/// Invariant report from [`LaplaceOperator::verify`].
#[derive(Debug, Clone, Copy)]
pub struct LaplacianCheck {
    /// `max |L_ij - L_ji|`.
    pub symmetry_residual: f64,
    /// `max |(L · 1)_i|`.
    pub constant_residual: f64,
    pub nonzeros: usize,
    pub vertex_count: usize,
    pub degenerate_triangles: usize,
}

impl LaplacianCheck {
    /// Symmetric to 1e-10 and constants in the kernel to 1e-8.
    pub fn passes(&self) -> bool {
        self.symmetry_residual <= 1e-10 && self.constant_residual <= 1e-8
    }
}

impl LaplaceOperator {
    /// Assemble from a tessellation of the limit surface.
    pub fn assemble(mesh: &TessellationResult) -> Self {
        let n = mesh.vertex_count();
        let mut weights: HashMap<(u32, u32), f64> = HashMap::new();
        let mut mass = vec![0.0_f64; n];
        let mut degenerate = 0usize;

        for tri in &mesh.triangles {
            let [a, b, c] = *tri;
            let pa = to_dpoint(&mesh.vertices[a as usize]);
            let pb = to_dpoint(&mesh.vertices[b as usize]);
            let pc = to_dpoint(&mesh.vertices[c as usize]);

            let cross = (pb - pa).cross(&(pc - pa));
            let cross_norm = cross.norm();
            if cross_norm < DEGENERATE_CROSS {
                degenerate += 1;
                continue;
            }
            let area = cross_norm / 2.0;
            for &v in tri {
                mass[v as usize] += area / 3.0;
            }

            // Each corner's cotangent weights the opposite edge.
            for (apex, e0, e1) in [(pa, b, c), (pb, c, a), (pc, a, b)] {
                let p0 = to_dpoint(&mesh.vertices[e0 as usize]);
                let p1 = to_dpoint(&mesh.vertices[e1 as usize]);
                let u = p0 - apex;
                let w = p1 - apex;
                let cross = u.cross(&w).norm();
                let cot = if cross > DEGENERATE_CROSS {
                    (u.dot(&w) / cross).clamp(-COT_CLAMP, COT_CLAMP)
                } else {
                    0.0
                };
                let key = (e0.min(e1), e0.max(e1));
                *weights.entry(key).or_insert(0.0) += cot / 2.0;
            }
        }

        let mut coo = CooMatrix::new(n, n);
        let mut coo_n = CooMatrix::new(n, n);
        let mut diagonal = vec![0.0_f64; n];
        let mass_scale: Vec<f64> = mass
            .iter()
            .map(|&m| 1.0 / m.max(1e-30).sqrt())
            .collect();
        let mut entries: Vec<((u32, u32), f64)> = weights.into_iter().collect();
        entries.sort_unstable_by_key(|&(k, _)| k);
        for ((i, j), w) in entries {
            let (i, j) = (i as usize, j as usize);
            coo.push(i, j, w);
            coo.push(j, i, w);
            coo_n.push(i, j, w * mass_scale[i] * mass_scale[j]);
            coo_n.push(j, i, w * mass_scale[i] * mass_scale[j]);
            diagonal[i] -= w;
            diagonal[j] -= w;
        }
        for i in 0..n {
            coo.push(i, i, diagonal[i]);
            coo_n.push(i, i, diagonal[i] * mass_scale[i] * mass_scale[i]);
        }

        if degenerate > 0 {
            tracing::warn!(degenerate, "degenerate triangles skipped in Laplacian assembly");
        }

        Self {
            laplacian: CsrMatrix::from(&coo),
            normalized: CsrMatrix::from(&coo_n),
            mass,
            degenerate_triangles: degenerate,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.mass.len()
    }

    pub fn laplacian(&self) -> &CsrMatrix<f64> {
        &self.laplacian
    }

    /// `L_n = A^{-1/2} L A^{-1/2}`.
    pub fn normalized(&self) -> &CsrMatrix<f64> {
        &self.normalized
    }

    /// Barycentric vertex areas (the diagonal of `A`).
    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    pub fn degenerate_triangles(&self) -> usize {
        self.degenerate_triangles
    }

    /// `y = L x`.
    pub fn apply(&self, x: &[f64], y: &mut [f64]) {
        matvec(&self.laplacian, x, y);
    }

    /// `y = L_n x`.
    pub fn apply_normalized(&self, x: &[f64], y: &mut [f64]) {
        matvec(&self.normalized, x, y);
    }

    /// Check the operator invariants.
    pub fn verify(&self) -> LaplacianCheck {
        let n = self.vertex_count();
        let mut symmetry_residual = 0.0_f64;
        for (i, row) in self.laplacian.row_iter().enumerate() {
            for (&j, &v) in row.col_indices().iter().zip(row.values()) {
                let transposed = csr_get(&self.laplacian, j, i);
                symmetry_residual = symmetry_residual.max((v - transposed).abs());
            }
        }
        let ones = vec![1.0_f64; n];
        let mut image = vec![0.0_f64; n];
        self.apply(&ones, &mut image);
        let constant_residual = image.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()));

        LaplacianCheck {
            symmetry_residual,
            constant_residual,
            nonzeros: self.laplacian.nnz(),
            vertex_count: n,
            degenerate_triangles: self.degenerate_triangles,
        }
    }
}

pub(crate) fn matvec(csr: &CsrMatrix<f64>, x: &[f64], y: &mut [f64]) {
    for (i, row) in csr.row_iter().enumerate() {
        let mut acc = 0.0;
        for (&j, &v) in row.col_indices().iter().zip(row.values()) {
            acc += v * x[j];
        }
        y[i] = acc;
    }
}

fn csr_get(csr: &CsrMatrix<f64>, i: usize, j: usize) -> f64 {
    let row = csr.row(i);
    match row.col_indices().binary_search(&j) {
        Ok(pos) => row.values()[pos],
        Err(_) => 0.0,
    }
}

/// Builds and caches Laplacians keyed by (cage identity, tessellation
/// level). The cache invalidates wholesale with the cage: a new cage has
/// a new id.
#[derive(Default)]
pub struct LaplacianBuilder {
    cache: HashMap<(Uuid, u8), Arc<LaplaceOperator>>,
}

impl LaplacianBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tessellate the evaluator's limit surface at `level` (uniform) and
    /// assemble, or return the cached operator for this cage and level.
    pub fn build(
        &mut self,
        evaluator: &SubdEvaluator,
        level: u8,
    ) -> Result<Arc<LaplaceOperator>, AnalysisError> {
        let key = (evaluator.cage_id()?, level);
        if let Some(operator) = self.cache.get(&key) {
            return Ok(operator.clone());
        }
        let mesh = evaluator.tessellate(level, false)?;
        let operator = Arc::new(LaplaceOperator::assemble(&mesh));
        self.cache.insert(key, operator.clone());
        Ok(operator)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
