use subd_eval::EvalError;

/// Errors from differential and spectral analysis.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("degenerate metric at face {face} ({u}, {v}): EG - F^2 = {det}")]
    DegenerateMetric { face: u32, u: f32, v: f32, det: f64 },

    #[error("eigensolver did not converge: {converged} of {requested} modes after {iterations} iterations")]
    EigenSolverDidNotConverge {
        requested: usize,
        converged: usize,
        iterations: usize,
    },

    #[error("region '{id}' is invalid: {reason}")]
    InvalidRegion { id: String, reason: String },

    #[error("regions '{a}' and '{b}' cannot be merged: {reason}")]
    CannotMerge { a: String, b: String, reason: String },

    #[error("split curve does not separate region '{id}'")]
    SplitNotSeparating { id: String },

    #[error("operation cancelled")]
    Cancelled,
}
