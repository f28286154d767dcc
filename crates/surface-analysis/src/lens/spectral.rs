//! Region discovery through Laplace-Beltrami eigenmodes.

use std::collections::{BTreeMap, HashMap};

use cast_types::{CancelToken, EigenMode, ParametricRegion, RegionIdGenerator, TessellationResult};
use subd_eval::SubdEvaluator;

use crate::eigen::solve_smallest;
use crate::error::AnalysisError;
use crate::laplacian::LaplaceOperator;
use crate::partition::DisjointSet;

#[derive(Debug, Clone)]
pub struct SpectralConfig {
    /// How many eigenpairs to solve for (the constant mode included).
    pub mode_count: usize,
    /// Which modes to decompose by; mode 0 is skipped automatically.
    pub mode_indices: Vec<usize>,
    /// Tessellation level of the sampling substrate. Must match the
    /// level the Laplacian was built at.
    pub level: u8,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            mode_count: 8,
            mode_indices: vec![1, 2, 3],
            level: 2,
        }
    }
}

pub struct SpectralLens {
    config: SpectralConfig,
}

impl SpectralLens {
    pub fn new(config: SpectralConfig) -> Self {
        Self { config }
    }

    /// Solve the eigenproblem and cut the surface along nodal lines of
    /// the chosen modes.
    pub fn extract_regions(
        &self,
        evaluator: &SubdEvaluator,
        operator: &LaplaceOperator,
        ids: &mut RegionIdGenerator,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<ParametricRegion>, AnalysisError> {
        let mesh = evaluator.tessellate(self.config.level, false)?;
        let modes = solve_smallest(operator, self.config.mode_count.clamp(2, 50), cancel)?;

        let mut regions = Vec::new();
        for &index in &self.config.mode_indices {
            if index == 0 || index >= modes.len() {
                // The constant mode has no nodal structure.
                continue;
            }
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }
            }
            let mode = &modes[index];
            let score = resonance(operator, mode);
            for faces in nodal_face_domains(&mesh, mode) {
                if faces.is_empty() {
                    continue;
                }
                let mut region = ParametricRegion::new(
                    ids.next_id(),
                    faces,
                    format!("spectral:mode_{index}"),
                    score,
                );
                region
                    .metadata
                    .insert("eigenvalue".into(), serde_json::json!(mode.eigenvalue));
                region.metadata.insert(
                    "multiplicity_hint".into(),
                    serde_json::json!(mode.multiplicity_hint),
                );
                regions.push(region);
            }
        }

        tracing::debug!(regions = regions.len(), "spectral lens complete");
        Ok(regions)
    }
}

/// Nodal domains of a mode, mapped to control faces.
///
/// Vertices cluster by eigenfunction sign over tessellation edges; each
/// triangle votes for the domain holding a majority of its corners, and
/// each control face goes to the domain winning most of its triangles.
fn nodal_face_domains(mesh: &TessellationResult, mode: &EigenMode) -> Vec<Vec<u32>> {
    let sign: Vec<bool> = mode.values.iter().map(|&x| x >= 0.0).collect();

    let mut set = DisjointSet::new(mesh.vertex_count());
    for tri in &mesh.triangles {
        for k in 0..3 {
            let a = tri[k];
            let b = tri[(k + 1) % 3];
            if sign[a as usize] == sign[b as usize] {
                set.union(a, b);
            }
        }
    }

    // face -> domain-root -> triangle votes.
    let mut votes: HashMap<u32, BTreeMap<u32, usize>> = HashMap::new();
    for (t, tri) in mesh.triangles.iter().enumerate() {
        let roots = [set.find(tri[0]), set.find(tri[1]), set.find(tri[2])];
        let winner = if roots[0] == roots[1] || roots[0] == roots[2] {
            roots[0]
        } else if roots[1] == roots[2] {
            roots[1]
        } else {
            continue; // three-way split triangle carries no vote
        };
        *votes
            .entry(mesh.parent_face[t])
            .or_default()
            .entry(winner)
            .or_insert(0) += 1;
    }

    let mut domains: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (face, tallies) in votes {
        let (&winner, _) = tallies
            .iter()
            .max_by_key(|&(&root, &count)| (count, std::cmp::Reverse(root)))
            .expect("face with votes");
        domains.entry(winner).or_default().push(face);
    }
    domains
        .into_values()
        .map(|mut faces| {
            faces.sort_unstable();
            faces
        })
        .collect()
}

/// Inter-domain over intra-domain gradient energy, clamped to [0, 1].
///
/// Energies are taken over the Laplacian's off-diagonal weights; a mode
/// whose variation concentrates on nodal boundaries scores high.
fn resonance(operator: &LaplaceOperator, mode: &EigenMode) -> f32 {
    let sign: Vec<bool> = mode.values.iter().map(|&x| x >= 0.0).collect();
    let mut inter = 0.0_f64;
    let mut intra = 0.0_f64;
    for (i, row) in operator.laplacian().row_iter().enumerate() {
        for (&j, &w) in row.col_indices().iter().zip(row.values()) {
            if j <= i {
                continue;
            }
            let energy = w.abs() * (mode.values[i] - mode.values[j]).powi(2);
            if sign[i] == sign[j] {
                intra += energy;
            } else {
                inter += energy;
            }
        }
    }
    (inter / intra.max(1e-30)).clamp(0.0, 1.0) as f32
}
