//! Differential-geometry results reported by the curvature analyzer.

use serde::{Deserialize, Serialize};

use crate::geometry::Vector;

/// Coefficients of the first and second fundamental forms at a point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FundamentalForms {
    pub e: f64,
    pub f: f64,
    pub g: f64,
    pub l: f64,
    pub m: f64,
    pub n: f64,
}

impl FundamentalForms {
    /// Determinant of the first form, `EG − F²`.
    pub fn metric_det(&self) -> f64 {
        self.e * self.g - self.f * self.f
    }
}

/// Full curvature data at one surface point.
///
/// Principal curvatures are ordered `κ₁ ≥ κ₂`; the principal directions
/// are unit, mutually orthogonal, and tangent to the surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvatureResult {
    pub kappa1: f64,
    pub kappa2: f64,
    pub direction1: Vector,
    pub direction2: Vector,
    pub normal: Vector,
    pub gaussian: f64,
    pub mean: f64,
    pub forms: FundamentalForms,
}

impl CurvatureResult {
    /// `|H|`, used by lenses that only care about bending magnitude.
    pub fn abs_mean(&self) -> f64 {
        self.mean.abs()
    }

    /// Root-mean-square curvature `√((κ₁² + κ₂²)/2)`.
    pub fn rms(&self) -> f64 {
        ((self.kappa1 * self.kappa1 + self.kappa2 * self.kappa2) / 2.0).sqrt()
    }
}
