//! Decomposition lenses.
//!
//! A lens turns the analyzed surface into [`ParametricRegion`]s by one
//! mathematical criterion. The set of lenses is closed and selected by
//! tag; they differ only in how regions are produced, never in the
//! region shape itself.

pub mod differential;
pub mod spectral;

use cast_types::{CancelToken, ControlCage, ParametricRegion, RegionIdGenerator};
use subd_eval::SubdEvaluator;

use crate::error::AnalysisError;
use crate::laplacian::LaplaceOperator;

/// Which lens to run.
#[derive(Debug, Clone)]
pub enum LensKind {
    Differential(differential::DifferentialConfig),
    Spectral(spectral::SpectralConfig),
}

/// Run a lens against an initialized evaluator.
///
/// Pinned regions are the session's concern: lenses always produce a
/// fresh, unpinned set and never destroy anything.
pub fn run_lens(
    kind: &LensKind,
    evaluator: &SubdEvaluator,
    cage: &ControlCage,
    operator: Option<&LaplaceOperator>,
    ids: &mut RegionIdGenerator,
    cancel: Option<&CancelToken>,
) -> Result<Vec<ParametricRegion>, AnalysisError> {
    match kind {
        LensKind::Differential(config) => {
            differential::DifferentialLens::new(config.clone()).extract_regions(
                evaluator, cage, ids, cancel,
            )
        }
        LensKind::Spectral(config) => {
            let operator = operator.ok_or_else(|| AnalysisError::InvalidRegion {
                id: String::new(),
                reason: "spectral lens requires a Laplace operator".into(),
            })?;
            spectral::SpectralLens::new(config.clone()).extract_regions(
                evaluator, operator, ids, cancel,
            )
        }
    }
}

/// Control-face adjacency via shared cage edges.
pub(crate) fn face_adjacency(cage: &ControlCage) -> Vec<Vec<u32>> {
    use std::collections::HashMap;
    let mut edge_faces: HashMap<cast_types::EdgeKey, Vec<u32>> = HashMap::new();
    for (fi, face) in cage.faces().iter().enumerate() {
        for k in 0..face.len() {
            let key = cast_types::EdgeKey::new(face[k], face[(k + 1) % face.len()]);
            edge_faces.entry(key).or_default().push(fi as u32);
        }
    }
    let mut adjacency = vec![Vec::new(); cage.face_count()];
    for faces in edge_faces.values() {
        if faces.len() == 2 {
            adjacency[faces[0] as usize].push(faces[1]);
            adjacency[faces[1] as usize].push(faces[0]);
        }
    }
    for list in &mut adjacency {
        list.sort_unstable();
        list.dedup();
    }
    adjacency
}
