//! Cage builders and pipeline glue shared across the scenario suites.

use cast_types::{ControlCage, EdgeKey, Point};
use subd_eval::{EvalError, SubdEvaluator};

/// Unified error type for harness plumbing.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("evaluator error: {0}")]
    Eval(#[from] EvalError),

    #[error("analysis error: {0}")]
    Analysis(#[from] surface_analysis::AnalysisError),

    #[error("mold error: {0}")]
    Mold(#[from] mold_gen::MoldError),

    #[error("wire error: {0}")]
    Wire(#[from] wire_format::WireError),
}

/// The unit square in z = 0: one quad face.
pub fn unit_square_cage() -> ControlCage {
    flat_quad_cage(1.0)
}

/// An axis-aligned square quad of the given edge length in z = 0.
pub fn flat_quad_cage(size: f32) -> ControlCage {
    ControlCage::new(
        vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(size, 0.0, 0.0),
            Point::new(size, size, 0.0),
            Point::new(0.0, size, 0.0),
        ],
        vec![vec![0, 1, 2, 3]],
        vec![],
    )
    .expect("flat quad cage is valid")
}

/// The unit cube, six quads wound outward. Face 0 is the bottom
/// (z = 0), face 1 the top, faces 2..=5 the sides.
pub fn unit_cube_cage() -> ControlCage {
    unit_cube_cage_with_creases(&[])
}

/// Unit cube with crease sharpness applied to the given edges.
pub fn unit_cube_cage_with_creases(creases: &[(u32, u32, f32)]) -> ControlCage {
    let p = |x: f32, y: f32, z: f32| Point::new(x, y, z);
    ControlCage::new(
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
        creases
            .iter()
            .map(|&(a, b, s)| (EdgeKey::new(a, b), s))
            .collect(),
    )
    .expect("cube cage is valid")
}

/// Build and initialize an evaluator for a cage.
pub fn initialized_evaluator(cage: &ControlCage) -> Result<SubdEvaluator, HarnessError> {
    let mut evaluator = SubdEvaluator::new();
    evaluator.initialize(cage)?;
    Ok(evaluator)
}

/// A bridge payload for the unit cube, as JSON.
pub fn cube_payload_json() -> String {
    serde_json::json!({
        "type": "subd_control_cage",
        "version": "1.0",
        "vertices": [
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]
        ],
        "faces": [
            [0, 3, 2, 1], [4, 5, 6, 7], [0, 1, 5, 4],
            [1, 2, 6, 5], [2, 3, 7, 6], [3, 0, 4, 7]
        ]
    })
    .to_string()
}
