//! Region discovery through curvature coherence.

use std::collections::HashMap;

use cast_types::{
    CancelToken, ControlCage, CurvatureResult, ParametricPoint, ParametricRegion,
    RegionIdGenerator,
};
use subd_eval::SubdEvaluator;

use crate::curvature::CurvatureAnalyzer;
use crate::error::AnalysisError;
use crate::lens::face_adjacency;
use crate::partition::DisjointSet;

/// Per-sample curvature class by the signs of H and K.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurvatureClass {
    Convex,
    Concave,
    Saddle,
    Flat,
}

impl CurvatureClass {
    pub fn label(self) -> &'static str {
        match self {
            Self::Convex => "convex",
            Self::Concave => "concave",
            Self::Saddle => "saddle",
            Self::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DifferentialConfig {
    /// Curvature sample grid per face (s×s).
    pub sample_grid: usize,
    /// |H| below this is flat.
    pub tau_h: f64,
    /// |K| below this is flat.
    pub tau_k: f64,
    /// Components smaller than this merge into their largest neighbor.
    pub min_region_size: usize,
    /// Percentile (0, 0.5] of |κ₁| classified as ridge (top) and valley
    /// (bottom) samples.
    pub feature_percentile: f64,
}

impl Default for DifferentialConfig {
    fn default() -> Self {
        Self {
            sample_grid: 3,
            tau_h: 0.01,
            tau_k: 0.001,
            min_region_size: 2,
            feature_percentile: 0.1,
        }
    }
}

/// Ridge and valley sample sets, feeding boundary-curve construction.
#[derive(Debug, Clone, Default)]
pub struct FeatureLines {
    pub ridges: Vec<ParametricPoint>,
    pub valleys: Vec<ParametricPoint>,
}

pub struct DifferentialLens {
    config: DifferentialConfig,
}

impl DifferentialLens {
    pub fn new(config: DifferentialConfig) -> Self {
        Self { config }
    }

    // With outward normals (counter-clockwise winding) a convex body
    // has H < 0 under the L = <P_uu, n> convention.
    fn classify(&self, c: &CurvatureResult) -> CurvatureClass {
        if c.mean.abs() <= self.config.tau_h && c.gaussian.abs() <= self.config.tau_k {
            CurvatureClass::Flat
        } else if c.gaussian < -self.config.tau_k {
            CurvatureClass::Saddle
        } else if c.mean < -self.config.tau_h {
            CurvatureClass::Convex
        } else if c.mean > self.config.tau_h {
            CurvatureClass::Concave
        } else {
            CurvatureClass::Flat
        }
    }

    /// Sample, classify, cluster, score.
    pub fn extract_regions(
        &self,
        evaluator: &SubdEvaluator,
        cage: &ControlCage,
        ids: &mut RegionIdGenerator,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<ParametricRegion>, AnalysisError> {
        let face_count = cage.face_count();
        let analyzer = CurvatureAnalyzer::new(evaluator);
        let samples = self.sample_parameters();

        // Majority class and mean H per face. Samples on a degenerate
        // chart spot are skipped rather than failing the whole face.
        let mut face_class = Vec::with_capacity(face_count);
        let mut face_mean_h = vec![0.0_f64; face_count];
        for face in 0..face_count as u32 {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }
            }
            let mut counts: HashMap<CurvatureClass, usize> = HashMap::new();
            let mut h_sum = 0.0;
            let mut h_count = 0usize;
            for &(u, v) in &samples {
                match analyzer.evaluate(face, u, v) {
                    Ok(c) => {
                        *counts.entry(self.classify(&c)).or_insert(0) += 1;
                        h_sum += c.mean;
                        h_count += 1;
                    }
                    Err(AnalysisError::DegenerateMetric { .. }) => continue,
                    Err(e) => return Err(e),
                }
            }
            face_mean_h[face as usize] = if h_count > 0 {
                h_sum / h_count as f64
            } else {
                0.0
            };
            face_class.push(majority(&counts));
        }

        // Union neighboring same-class faces.
        let adjacency = face_adjacency(cage);
        let mut set = DisjointSet::new(face_count);
        for (f, neighbors) in adjacency.iter().enumerate() {
            for &g in neighbors {
                if face_class[f] == face_class[g as usize] {
                    set.union(f as u32, g);
                }
            }
        }

        // Fold undersized components into their largest neighbor.
        let mut components = set.components();
        loop {
            components.sort_by_key(|c| c.len());
            let Some(small) = components
                .iter()
                .position(|c| c.len() < self.config.min_region_size)
            else {
                break;
            };
            if components.len() == 1 {
                break;
            }
            let small_faces = components[small].clone();
            let mut best: Option<(usize, usize)> = None;
            for (i, component) in components.iter().enumerate() {
                if i == small {
                    continue;
                }
                let touches = component.iter().any(|&f| {
                    adjacency[f as usize]
                        .iter()
                        .any(|&g| small_faces.contains(&g))
                });
                if touches && best.map(|(_, len)| component.len() > len).unwrap_or(true) {
                    best = Some((i, component.len()));
                }
            }
            let Some((target, _)) = best else { break };
            let absorbed_class = face_class[components[target][0] as usize];
            for &f in &small_faces {
                face_class[f as usize] = absorbed_class;
            }
            let mut merged = components.remove(small);
            let target = if target > small { target - 1 } else { target };
            components[target].append(&mut merged);
            components[target].sort_unstable();
        }

        // Score and emit.
        let mut regions = Vec::with_capacity(components.len());
        components.sort();
        for faces in components {
            let class = face_class[faces[0] as usize];
            let strength = coherence(&faces, &face_mean_h);
            let mut region = ParametricRegion::new(
                ids.next_id(),
                faces.iter().copied(),
                format!("differential:{}", class.label()),
                strength,
            );
            region.metadata.insert(
                "mean_h".into(),
                serde_json::json!(mean_of(&faces, &face_mean_h)),
            );
            region
                .metadata
                .insert("class".into(), serde_json::json!(class.label()));
            regions.push(region);
        }

        tracing::debug!(regions = regions.len(), "differential lens complete");
        Ok(regions)
    }

    /// Ridge/valley sample sets: top and bottom percentile of |κ₁|.
    pub fn extract_feature_lines(
        &self,
        evaluator: &SubdEvaluator,
        cage: &ControlCage,
    ) -> Result<FeatureLines, AnalysisError> {
        let analyzer = CurvatureAnalyzer::new(evaluator);
        let samples = self.sample_parameters();
        let mut scored: Vec<(f64, ParametricPoint)> = Vec::new();
        for face in 0..cage.face_count() as u32 {
            for &(u, v) in &samples {
                match analyzer.evaluate(face, u, v) {
                    Ok(c) => scored.push((c.kappa1.abs(), ParametricPoint::new(face, u, v))),
                    Err(AnalysisError::DegenerateMetric { .. }) => continue,
                    Err(e) => return Err(e),
                }
            }
        }
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let band = ((scored.len() as f64) * self.config.feature_percentile).ceil() as usize;
        let valleys = scored.iter().take(band).map(|&(_, p)| p).collect();
        let ridges = scored.iter().rev().take(band).map(|&(_, p)| p).collect();
        Ok(FeatureLines { ridges, valleys })
    }

    fn sample_parameters(&self) -> Vec<(f32, f32)> {
        let s = self.config.sample_grid.max(1);
        let mut samples = Vec::with_capacity(s * s);
        for j in 0..s {
            for i in 0..s {
                // Interior grid: (i+1)/(s+1) keeps samples off corners.
                samples.push((
                    (i + 1) as f32 / (s + 1) as f32,
                    (j + 1) as f32 / (s + 1) as f32,
                ));
            }
        }
        samples
    }
}

fn majority(counts: &HashMap<CurvatureClass, usize>) -> CurvatureClass {
    let mut best = CurvatureClass::Flat;
    let mut best_count = 0usize;
    let mut tied = false;
    for &class in &[
        CurvatureClass::Convex,
        CurvatureClass::Concave,
        CurvatureClass::Saddle,
        CurvatureClass::Flat,
    ] {
        let count = counts.get(&class).copied().unwrap_or(0);
        if count > best_count {
            best = class;
            best_count = count;
            tied = false;
        } else if count == best_count && count > 0 {
            tied = true;
        }
    }
    // Ties break toward flat.
    if tied {
        CurvatureClass::Flat
    } else {
        best
    }
}

fn mean_of(faces: &[u32], values: &[f64]) -> f64 {
    faces.iter().map(|&f| values[f as usize]).sum::<f64>() / faces.len() as f64
}

/// `1 − σ(H) / (|H̄| + ε)`, clamped to [0, 1]: high when the region's
/// mean curvature is internally coherent.
fn coherence(faces: &[u32], face_mean_h: &[f64]) -> f32 {
    let mean = mean_of(faces, face_mean_h);
    let variance = faces
        .iter()
        .map(|&f| (face_mean_h[f as usize] - mean).powi(2))
        .sum::<f64>()
        / faces.len() as f64;
    let sigma = variance.sqrt();
    (1.0 - sigma / (mean.abs() + 1e-9)).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_types::Point;

    fn cube() -> (SubdEvaluator, ControlCage) {
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
        let mut evaluator = SubdEvaluator::new();
        evaluator.initialize(&cage).unwrap();
        (evaluator, cage)
    }

    #[test]
    fn cube_clusters_into_one_convex_region() {
        let (evaluator, cage) = cube();
        let mut ids = RegionIdGenerator::new();
        let lens = DifferentialLens::new(DifferentialConfig::default());
        let regions = lens
            .extract_regions(&evaluator, &cage, &mut ids, None)
            .unwrap();
        // The subdivided cube is uniformly convex: one region, all faces.
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].face_count(), 6);
        assert_eq!(regions[0].unity_principle, "differential:convex");
        assert!(regions[0].unity_strength > 0.5);
        assert!(!regions[0].pinned);
    }

    #[test]
    fn regions_validate_and_carry_metadata() {
        let (evaluator, cage) = cube();
        let mut ids = RegionIdGenerator::new();
        let lens = DifferentialLens::new(DifferentialConfig::default());
        let regions = lens
            .extract_regions(&evaluator, &cage, &mut ids, None)
            .unwrap();
        for region in &regions {
            assert!(!region.is_empty());
            assert!(region.metadata.contains_key("class"));
            assert!((0.0..=1.0).contains(&region.unity_strength));
        }
    }

    #[test]
    fn feature_lines_partition_by_percentile() {
        let (evaluator, cage) = cube();
        let lens = DifferentialLens::new(DifferentialConfig {
            feature_percentile: 0.2,
            ..Default::default()
        });
        let lines = lens.extract_feature_lines(&evaluator, &cage).unwrap();
        assert!(!lines.ridges.is_empty());
        assert_eq!(lines.ridges.len(), lines.valleys.len());
    }
}
