//! Fitted rational B-spline surfaces and their quality metrics.

use serde::{Deserialize, Serialize};

/// Structural defects in NURBS data, found by [`FittedNurbs::validate`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum NurbsDataError {
    #[error("control point count {actual} does not match count_u * count_v = {expected}")]
    ControlPointCount { expected: usize, actual: usize },

    #[error("weight count {actual} does not match control point count {expected}")]
    WeightCount { expected: usize, actual: usize },

    #[error("{direction} knot vector has {actual} knots, expected count + degree + 1 = {expected}")]
    KnotCount {
        direction: char,
        expected: usize,
        actual: usize,
    },

    #[error("{direction} knot vector decreases at index {index}")]
    KnotOrder { direction: char, index: usize },

    #[error("degree must be at least 1, got {0}")]
    DegreeTooLow(usize),
}

/// A rational tensor-product B-spline surface in the form the modeling
/// kernel and the wire protocol both consume: flattened knot vectors with
/// multiplicities expanded, row-major control net, parallel weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedNurbs {
    pub degree_u: usize,
    pub degree_v: usize,
    pub count_u: usize,
    pub count_v: usize,
    /// Row-major `count_u × count_v` control net: index `i * count_v + j`.
    pub control_points: Vec<[f64; 3]>,
    /// Parallel to `control_points`; all 1.0 for a non-rational fit.
    pub weights: Vec<f64>,
    /// `count_u + degree_u + 1` knots, non-decreasing.
    pub knots_u: Vec<f64>,
    /// `count_v + degree_v + 1` knots, non-decreasing.
    pub knots_v: Vec<f64>,
}

impl FittedNurbs {
    pub fn control_point(&self, i: usize, j: usize) -> [f64; 3] {
        self.control_points[i * self.count_v + j]
    }

    /// Check the structural laws relating degrees, counts, and knots.
    pub fn validate(&self) -> Result<(), NurbsDataError> {
        if self.degree_u < 1 {
            return Err(NurbsDataError::DegreeTooLow(self.degree_u));
        }
        if self.degree_v < 1 {
            return Err(NurbsDataError::DegreeTooLow(self.degree_v));
        }
        let expected = self.count_u * self.count_v;
        if self.control_points.len() != expected {
            return Err(NurbsDataError::ControlPointCount {
                expected,
                actual: self.control_points.len(),
            });
        }
        if self.weights.len() != expected {
            return Err(NurbsDataError::WeightCount {
                expected,
                actual: self.weights.len(),
            });
        }
        for (direction, knots, count, degree) in [
            ('u', &self.knots_u, self.count_u, self.degree_u),
            ('v', &self.knots_v, self.count_v, self.degree_v),
        ] {
            let expected = count + degree + 1;
            if knots.len() != expected {
                return Err(NurbsDataError::KnotCount {
                    direction,
                    expected,
                    actual: knots.len(),
                });
            }
            for i in 1..knots.len() {
                if knots[i] < knots[i - 1] {
                    return Err(NurbsDataError::KnotOrder {
                        direction,
                        index: i,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Deviation of a fitted surface from the exact limit surface, measured
/// at an independent validation grid. Distances are in model units (mm).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FittingQuality {
    pub max_deviation: f64,
    pub mean_deviation: f64,
    pub rms_deviation: f64,
    pub sample_count: usize,
    /// `max_deviation < 0.1` mm, the kernel's acceptance threshold.
    pub passes_tolerance: bool,
}

/// The fitting acceptance threshold in millimeters.
pub const FITTING_TOLERANCE_MM: f64 = 0.1;

#[cfg(test)]
mod tests {
    use super::*;

    fn bilinear_patch() -> FittedNurbs {
        FittedNurbs {
            degree_u: 1,
            degree_v: 1,
            count_u: 2,
            count_v: 2,
            control_points: vec![
                [0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
            ],
            weights: vec![1.0; 4],
            knots_u: vec![0.0, 0.0, 1.0, 1.0],
            knots_v: vec![0.0, 0.0, 1.0, 1.0],
        }
    }

    #[test]
    fn valid_patch_passes() {
        assert!(bilinear_patch().validate().is_ok());
    }

    #[test]
    fn knot_count_law_is_enforced() {
        let mut patch = bilinear_patch();
        patch.knots_u.push(1.0);
        assert!(matches!(
            patch.validate(),
            Err(NurbsDataError::KnotCount { direction: 'u', .. })
        ));
    }

    #[test]
    fn weight_count_law_is_enforced() {
        let mut patch = bilinear_patch();
        patch.weights.pop();
        assert!(matches!(
            patch.validate(),
            Err(NurbsDataError::WeightCount { .. })
        ));
    }

    #[test]
    fn decreasing_knots_are_rejected() {
        let mut patch = bilinear_patch();
        patch.knots_v = vec![0.0, 1.0, 0.5, 1.0];
        assert!(matches!(
            patch.validate(),
            Err(NurbsDataError::KnotOrder { direction: 'v', .. })
        ));
    }
}
