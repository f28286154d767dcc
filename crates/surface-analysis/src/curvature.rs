//! Fundamental forms, shape operator, and principal curvatures on the
//! exact limit surface.

use cast_types::{to_vector, CancelToken, CurvatureResult, DVector, FundamentalForms};
use nalgebra::Matrix2;
use subd_eval::SubdEvaluator;

use crate::error::AnalysisError;

/// Metric determinants below this are a pinch or cusp.
const METRIC_EPSILON: f64 = 1e-12;

/// Differential analysis against an initialized evaluator.
pub struct CurvatureAnalyzer<'a> {
    evaluator: &'a SubdEvaluator,
}

impl<'a> CurvatureAnalyzer<'a> {
    pub fn new(evaluator: &'a SubdEvaluator) -> Self {
        Self { evaluator }
    }

    /// Curvature data at `(face, u, v)`.
    ///
    /// Computes both fundamental forms from exact derivatives, the shape
    /// operator `S = I⁻¹ II`, and its eigenstructure. Fails with
    /// `DegenerateMetric` where the first form is singular.
    pub fn evaluate(&self, face: u32, u: f32, v: f32) -> Result<CurvatureResult, AnalysisError> {
        let d = self
            .evaluator
            .evaluate_limit_with_second_derivatives(face, u, v)?;

        let e = d.du.dot(&d.du);
        let f = d.du.dot(&d.dv);
        let g = d.dv.dot(&d.dv);
        let det = e * g - f * f;
        if det <= METRIC_EPSILON {
            return Err(AnalysisError::DegenerateMetric { face, u, v, det });
        }

        let normal = d.du.cross(&d.dv).normalize();
        let l = d.duu.dot(&normal);
        let m = d.duv.dot(&normal);
        let n = d.dvv.dot(&normal);

        // Shape operator in the (du, dv) basis.
        let shape = Matrix2::new(
            (l * g - m * f) / det,
            (m * g - n * f) / det,
            (m * e - l * f) / det,
            (n * e - m * f) / det,
        );
        let gaussian = shape.determinant();
        let mean = shape.trace() / 2.0;

        // Eigenvalues of the (generally non-symmetric) 2x2 operator are
        // real for a valid metric; order kappa1 >= kappa2.
        let disc = (mean * mean - gaussian).max(0.0).sqrt();
        let kappa1 = mean + disc;
        let kappa2 = mean - disc;

        let dir1 = principal_direction(&shape, kappa1, &d.du, &d.dv, &normal);
        let mut dir2 = normal.cross(&dir1);
        if dir2.norm() > 1e-30 {
            dir2 = dir2.normalize();
        }

        Ok(CurvatureResult {
            kappa1,
            kappa2,
            direction1: to_vector(&dir1),
            direction2: to_vector(&dir2),
            normal: to_vector(&normal),
            gaussian,
            mean,
            forms: FundamentalForms { e, f, g, l, m, n },
        })
    }

    /// Evaluate curvature at many parameters; cancellable between points.
    pub fn evaluate_batch(
        &self,
        samples: &[(u32, f32, f32)],
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<CurvatureResult>, AnalysisError> {
        let mut results = Vec::with_capacity(samples.len());
        for &(face, u, v) in samples {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }
            }
            results.push(self.evaluate(face, u, v)?);
        }
        Ok(results)
    }
}

/// Eigenvector of the shape operator for eigenvalue `kappa`, lifted to
/// 3D via `(α, β) ↦ α ∂u + β ∂v` and normalized.
fn principal_direction(
    shape: &Matrix2<f64>,
    kappa: f64,
    du: &DVector,
    dv: &DVector,
    normal: &DVector,
) -> DVector {
    // (S - kappa I) (α, β)^T = 0; pick the larger row for stability.
    let a = shape[(0, 0)] - kappa;
    let b = shape[(0, 1)];
    let c = shape[(1, 0)];
    let d = shape[(1, 1)] - kappa;
    let (alpha, beta) = if a.abs().max(b.abs()) >= c.abs().max(d.abs()) {
        if b.abs() > 1e-30 {
            (1.0, -a / b)
        } else if a.abs() > 1e-30 {
            (0.0, 1.0)
        } else {
            (1.0, 0.0)
        }
    } else if d.abs() > 1e-30 {
        (1.0, -c / d)
    } else if c.abs() > 1e-30 {
        (0.0, 1.0)
    } else {
        (1.0, 0.0)
    };

    let lifted = du * alpha + dv * beta;
    if lifted.norm() > 1e-30 {
        // Project into the tangent plane for orthogonality to n.
        let projected = lifted - normal * lifted.dot(normal);
        if projected.norm() > 1e-30 {
            return projected.normalize();
        }
        return lifted.normalize();
    }
    // Umbilic point: any tangent direction is principal.
    let fallback = du.normalize();
    fallback - normal * fallback.dot(normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cast_types::{ControlCage, Point};

    fn analyzer_for(cage: &ControlCage) -> SubdEvaluator {
        let mut evaluator = SubdEvaluator::new();
        evaluator.initialize(cage).unwrap();
        evaluator
    }

    fn unit_square() -> ControlCage {
        ControlCage::new(
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn flat_quad_has_zero_curvature() {
        let evaluator = analyzer_for(&unit_square());
        let analyzer = CurvatureAnalyzer::new(&evaluator);
        let c = analyzer.evaluate(0, 0.5, 0.5).unwrap();
        assert!(c.gaussian.abs() < 1e-4);
        assert!(c.mean.abs() < 1e-4);
        assert!(c.kappa1.abs() < 1e-4 && c.kappa2.abs() < 1e-4);
        assert!(c.normal.z.abs() > 1.0 - 1e-4);
    }

    #[test]
    fn fundamental_form_identities_hold_on_cube() {
        let p = |x: f32, y: f32, z: f32| Point::new(x, y, z);
        let cage = ControlCage::new(
            vec![
                p(0.0, 0.0, 0.0),
                p(1.0, 0.0, 0.0),
                p(1.0, 1.0, 0.0),
                p(0.0, 1.0, 0.0),
                p(0.0, 0.0, 1.0),
                p(1.0, 0.0, 1.0),
                p(1.0, 1.0, 1.0),
                p(0.0, 1.0, 1.0),
            ],
            vec![
                vec![0, 3, 2, 1],
                vec![4, 5, 6, 7],
                vec![0, 1, 5, 4],
                vec![1, 2, 6, 5],
                vec![2, 3, 7, 6],
                vec![3, 0, 4, 7],
            ],
            vec![],
        )
        .unwrap();
        let evaluator = analyzer_for(&cage);
        let analyzer = CurvatureAnalyzer::new(&evaluator);
        for &(face, u, v) in &[(0u32, 0.5f32, 0.5f32), (2, 0.3, 0.4), (4, 0.7, 0.6)] {
            let c = analyzer.evaluate(face, u, v).unwrap();
            let f = &c.forms;
            let det = f.metric_det();
            let k = (f.l * f.n - f.m * f.m) / det;
            let h = (f.e * f.n - 2.0 * f.f * f.m + f.g * f.l) / (2.0 * det);
            assert_relative_eq!(k, c.gaussian, epsilon = 1e-4);
            assert_relative_eq!(h, c.mean, epsilon = 1e-4);
            assert!(c.kappa1 >= c.kappa2);
            // Principal directions: unit, orthogonal, tangent.
            assert!((c.direction1.norm() - 1.0).abs() < 1e-3);
            assert!((c.direction2.norm() - 1.0).abs() < 1e-3);
            assert!(c.direction1.dot(&c.direction2).abs() < 1e-3);
            assert!(c.direction1.dot(&c.normal).abs() < 1e-3);
        }
    }

    #[test]
    fn batch_matches_pointwise() {
        let evaluator = analyzer_for(&unit_square());
        let analyzer = CurvatureAnalyzer::new(&evaluator);
        let samples = vec![(0u32, 0.25f32, 0.25f32), (0, 0.75, 0.5)];
        let batch = analyzer.evaluate_batch(&samples, None).unwrap();
        for (i, &(f, u, v)) in samples.iter().enumerate() {
            let single = analyzer.evaluate(f, u, v).unwrap();
            assert_eq!(batch[i].mean, single.mean);
        }
    }

    #[test]
    fn cancelled_batch_reports_cancelled() {
        let evaluator = analyzer_for(&unit_square());
        let analyzer = CurvatureAnalyzer::new(&evaluator);
        let token = CancelToken::new();
        token.cancel();
        let result = analyzer.evaluate_batch(&[(0, 0.5, 0.5)], Some(&token));
        assert!(matches!(result, Err(AnalysisError::Cancelled)));
    }
}
