use cast_types::CageError;

/// Errors from limit-surface evaluation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("invalid cage: {reason}")]
    InvalidCage { reason: String },

    #[error("face {face} is not a control face of this cage")]
    InvalidFace { face: u32 },

    #[error("parameter ({u}, {v}) outside [0, 1] x [0, 1]")]
    ParameterOutOfRange { u: f32, v: f32 },

    #[error("tessellation level {level} above maximum {max}")]
    LevelOutOfRange { level: u8, max: u8 },

    #[error("evaluator is not initialized")]
    NotInitialized,

    #[error("topology refiner already consumed; build a fresh evaluator for new topology")]
    AlreadyRefined,

    #[error("operation cancelled")]
    Cancelled,
}

impl From<CageError> for EvalError {
    fn from(e: CageError) -> Self {
        EvalError::InvalidCage {
            reason: e.to_string(),
        }
    }
}
