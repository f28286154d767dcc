use cast_types::NurbsDataError;
use subd_eval::EvalError;

/// Errors from mold synthesis.
#[derive(Debug, thiserror::Error)]
pub enum MoldError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("region '{id}' spans {faces} control faces; NURBS fitting handles single-face regions only")]
    MultiFaceRegion { id: String, faces: usize },

    #[error("sample density {density} too low; need at least 3")]
    SampleDensityTooLow { density: usize },

    #[error("invalid NURBS data: {0}")]
    InvalidNurbsData(#[from] NurbsDataError),

    #[error("draft angle {angle_deg} deg outside (0, 45]")]
    InvalidDraftAngle { angle_deg: f64 },

    #[error("surface is empty or null")]
    NullSurface,

    #[error("wall thickness {thickness} must be positive")]
    InvalidWallThickness { thickness: f64 },

    #[error("interpolation system is singular in {direction} direction")]
    SingularInterpolation { direction: char },

    #[error("fitted surface deviates {max_deviation:.4} mm from the limit surface (tolerance {tolerance} mm)")]
    FittingToleranceExceeded { max_deviation: f64, tolerance: f64 },

    #[error("solid construction failed: {reason}")]
    SolidConstructionFailed { reason: String },

    #[error("boolean operation failed: {reason}")]
    BooleanOperationFailed { reason: String },

    #[error("operation cancelled")]
    Cancelled,
}
