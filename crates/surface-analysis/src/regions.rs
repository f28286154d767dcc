//! Region algebra: merge, split along a parametric curve, validate.
//!
//! These are pure functions of their inputs plus an id generator; the
//! argument regions are never mutated.

use std::collections::BTreeSet;

use cast_types::{
    to_dpoint, ControlCage, DPoint, DVector, ParametricCurve, ParametricRegion,
    RegionIdGenerator,
};
use subd_eval::SubdEvaluator;

use crate::error::AnalysisError;
use crate::lens::face_adjacency;

/// Samples taken per curve segment when rasterizing a split curve.
const CURVE_SAMPLES_PER_SEGMENT: usize = 16;

/// Per-control-face limit surface areas, measured on a tessellation.
/// Merge weights region strength by these.
#[derive(Debug, Clone)]
pub struct FaceAreas {
    areas: Vec<f64>,
}

impl FaceAreas {
    /// Measure from a level-2 uniform tessellation.
    pub fn measure(evaluator: &SubdEvaluator) -> Result<Self, AnalysisError> {
        let mesh = evaluator.tessellate(2, false)?;
        let mut areas = vec![0.0_f64; evaluator.face_count()?];
        for (t, tri) in mesh.triangles.iter().enumerate() {
            let [a, b, c] = *tri;
            let pa = to_dpoint(&mesh.vertices[a as usize]);
            let pb = to_dpoint(&mesh.vertices[b as usize]);
            let pc = to_dpoint(&mesh.vertices[c as usize]);
            areas[mesh.parent_face[t] as usize] += (pb - pa).cross(&(pc - pa)).norm() / 2.0;
        }
        Ok(Self { areas })
    }

    pub fn area(&self, face: u32) -> f64 {
        self.areas.get(face as usize).copied().unwrap_or(0.0)
    }

    pub fn region_area(&self, region: &ParametricRegion) -> f64 {
        region.faces.iter().map(|&f| self.area(f)).sum()
    }
}

/// Can `a` and `b` merge? Both non-empty, disjoint, and adjacent via a
/// shared control edge unless the caller explicitly allows disconnected
/// unions.
pub fn can_merge(
    a: &ParametricRegion,
    b: &ParametricRegion,
    cage: &ControlCage,
    allow_non_adjacent: bool,
) -> bool {
    if a.is_empty() || b.is_empty() || !a.is_disjoint(b) {
        return false;
    }
    if allow_non_adjacent {
        return true;
    }
    let adjacency = face_adjacency(cage);
    a.faces.iter().any(|&f| {
        adjacency[f as usize]
            .iter()
            .any(|&g| b.contains_face(g))
    })
}

/// Merge regions into one: faces are the union, strength the
/// area-weighted mean, pinned if any input is pinned. Boundary curves
/// are dropped; the merged outer perimeter no longer matches any
/// input's curves.
pub fn merge(
    regions: &[&ParametricRegion],
    areas: &FaceAreas,
    ids: &mut RegionIdGenerator,
) -> Result<ParametricRegion, AnalysisError> {
    let first = regions.first().ok_or_else(|| AnalysisError::InvalidRegion {
        id: String::new(),
        reason: "merge requires at least one region".into(),
    })?;

    let mut faces = BTreeSet::new();
    let mut weighted = 0.0_f64;
    let mut total_area = 0.0_f64;
    let mut pinned = false;
    for region in regions {
        for &f in &region.faces {
            if !faces.insert(f) {
                return Err(AnalysisError::CannotMerge {
                    a: first.id.clone(),
                    b: region.id.clone(),
                    reason: format!("face {f} appears in more than one input"),
                });
            }
        }
        let area = areas.region_area(region);
        weighted += region.unity_strength as f64 * area;
        total_area += area;
        pinned |= region.pinned;
    }
    if faces.is_empty() {
        return Err(AnalysisError::InvalidRegion {
            id: first.id.clone(),
            reason: "merged region would be empty".into(),
        });
    }

    let strength = if total_area > 0.0 {
        (weighted / total_area) as f32
    } else {
        first.unity_strength
    };
    let mut merged = ParametricRegion::new(ids.next_id(), faces, "merged", strength);
    merged.pinned = pinned;
    Ok(merged)
}

/// Split a region by which side of `curve` each face center falls on.
///
/// Face centers are limit points at `(face, 1/2, 1/2)`; the side is the
/// sign of the offset against the curve's binormal (tangent × surface
/// normal) at the nearest curve sample. Fails with `SplitNotSeparating`
/// when every center lands on one side.
pub fn split(
    region: &ParametricRegion,
    curve: &ParametricCurve,
    evaluator: &SubdEvaluator,
    ids: &mut RegionIdGenerator,
) -> Result<(ParametricRegion, ParametricRegion), AnalysisError> {
    if region.is_empty() {
        return Err(AnalysisError::InvalidRegion {
            id: region.id.clone(),
            reason: "cannot split an empty region".into(),
        });
    }

    let field = SignedCurveField::build(curve, evaluator)?;

    let mut left = BTreeSet::new();
    let mut right = BTreeSet::new();
    for &face in &region.faces {
        let center = evaluator.evaluate_limit_point(face, 0.5, 0.5)?;
        if field.side(&to_dpoint(&center)) >= 0.0 {
            left.insert(face);
        } else {
            right.insert(face);
        }
    }
    if left.is_empty() || right.is_empty() {
        return Err(AnalysisError::SplitNotSeparating {
            id: region.id.clone(),
        });
    }

    let strength = region.unity_strength * 0.9;
    let make = |faces: BTreeSet<u32>, ids: &mut RegionIdGenerator| {
        let mut part = ParametricRegion::new(
            ids.next_id(),
            faces,
            region.unity_principle.clone(),
            strength,
        );
        part.boundaries = vec![curve.clone()];
        part
    };
    Ok((make(left, ids), make(right, ids)))
}

/// Check region invariants: non-empty, faces in range, strength in
/// [0, 1]. Returns all findings rather than the first.
pub fn validate(region: &ParametricRegion, cage: &ControlCage) -> (bool, Vec<String>) {
    let mut issues = Vec::new();
    if region.is_empty() {
        issues.push("region has no faces".to_string());
    }
    for &f in &region.faces {
        if !cage.contains_face(f) {
            issues.push(format!("face {f} out of range (cage has {} faces)", cage.face_count()));
        }
    }
    if !(0.0..=1.0).contains(&region.unity_strength) {
        issues.push(format!(
            "unity strength {} outside [0, 1]",
            region.unity_strength
        ));
    }
    (issues.is_empty(), issues)
}

/// The split curve rasterized to 3D with binormals.
struct SignedCurveField {
    points: Vec<DPoint>,
    binormals: Vec<DVector>,
}

impl SignedCurveField {
    fn build(curve: &ParametricCurve, evaluator: &SubdEvaluator) -> Result<Self, AnalysisError> {
        let samples = (curve.segment_count().max(1)) * CURVE_SAMPLES_PER_SEGMENT;
        let mut points = Vec::with_capacity(samples + 1);
        let mut normals = Vec::with_capacity(samples + 1);
        for i in 0..=samples {
            let t = i as f32 / samples as f32;
            let Some(p) = curve.evaluate(t) else {
                return Err(AnalysisError::InvalidRegion {
                    id: String::new(),
                    reason: "split curve has no points".into(),
                });
            };
            let (position, normal) = evaluator.evaluate_limit(p.face, p.u, p.v)?;
            points.push(to_dpoint(&position));
            normals.push(DVector::new(
                normal.x as f64,
                normal.y as f64,
                normal.z as f64,
            ));
        }

        let mut binormals = Vec::with_capacity(points.len());
        for i in 0..points.len() {
            let tangent = if i + 1 < points.len() {
                points[i + 1] - points[i]
            } else {
                points[i] - points[i - 1]
            };
            let b = tangent.cross(&normals[i]);
            binormals.push(if b.norm() > 1e-30 {
                b.normalize()
            } else {
                DVector::z()
            });
        }
        Ok(Self { points, binormals })
    }

    /// Signed offset of `p` against the nearest curve sample.
    fn side(&self, p: &DPoint) -> f64 {
        let mut best = 0usize;
        let mut best_d2 = f64::INFINITY;
        for (i, q) in self.points.iter().enumerate() {
            let d2 = (p - q).norm_squared();
            if d2 < best_d2 {
                best_d2 = d2;
                best = i;
            }
        }
        (p - self.points[best]).dot(&self.binormals[best])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_types::{ParametricPoint, Point};

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

    fn region(id: &str, faces: &[u32]) -> ParametricRegion {
        ParametricRegion::new(id, faces.iter().copied(), "differential:convex", 0.8)
    }

    #[test]
    fn merge_unions_faces_and_weights_strength() {
        let (evaluator, cage) = cube();
        let areas = FaceAreas::measure(&evaluator).unwrap();
        let mut ids = RegionIdGenerator::new();
        let mut a = region("a", &[0, 2]);
        a.unity_strength = 1.0;
        let mut b = region("b", &[1, 3]);
        b.unity_strength = 0.5;
        b.pinned = true;

        assert!(can_merge(&a, &b, &cage, false));
        let merged = merge(&[&a, &b], &areas, &mut ids).unwrap();
        let faces: Vec<u32> = merged.faces.iter().copied().collect();
        assert_eq!(faces, vec![0, 1, 2, 3]);
        assert!(merged.pinned);
        // Cube symmetry: all faces share the same area, so the weighted
        // mean is the plain mean.
        assert!((merged.unity_strength - 0.75).abs() < 1e-3);
        // Inputs untouched.
        assert_eq!(a.face_count(), 2);
        assert_eq!(b.face_count(), 2);
    }

    #[test]
    fn overlapping_merge_is_rejected() {
        let (evaluator, cage) = cube();
        let areas = FaceAreas::measure(&evaluator).unwrap();
        let mut ids = RegionIdGenerator::new();
        let a = region("a", &[0, 1]);
        let b = region("b", &[1, 2]);
        assert!(!can_merge(&a, &b, &cage, false));
        assert!(matches!(
            merge(&[&a, &b], &areas, &mut ids),
            Err(AnalysisError::CannotMerge { .. })
        ));
    }

    #[test]
    fn split_partitions_cube_by_equator() {
        let (evaluator, _cage) = cube();
        let mut ids = RegionIdGenerator::new();
        let whole = region("whole", &[0, 1, 2, 3, 4, 5]);
        // A closed equatorial loop around the four side faces at mid
        // height: side faces are 2..=5 and their centers sit on z=1/2.
        let curve = ParametricCurve::new(
            vec![
                ParametricPoint::new(2, 0.5, 0.5),
                ParametricPoint::new(3, 0.5, 0.5),
                ParametricPoint::new(4, 0.5, 0.5),
                ParametricPoint::new(5, 0.5, 0.5),
            ],
            true,
        );
        let (a, b) = split(&whole, &curve, &evaluator, &mut ids).unwrap();
        // Union is the original, intersection empty.
        let mut union: Vec<u32> = a.faces.iter().chain(b.faces.iter()).copied().collect();
        union.sort_unstable();
        assert_eq!(union, vec![0, 1, 2, 3, 4, 5]);
        assert!(a.is_disjoint(&b));
        // Top and bottom faces are separated by the equator.
        let top_side = a.contains_face(1);
        let bottom_in_other = if top_side {
            b.contains_face(0)
        } else {
            a.contains_face(0)
        };
        assert!(bottom_in_other, "bottom and top must not share a side");
        assert!((a.unity_strength - 0.72).abs() < 1e-5);
        assert_eq!(a.boundaries.len(), 1);
    }

    #[test]
    fn degenerate_split_reports_not_separating() {
        let (evaluator, _cage) = cube();
        let mut ids = RegionIdGenerator::new();
        let whole = region("whole", &[1]);
        let curve = ParametricCurve::new(
            vec![
                ParametricPoint::new(2, 0.5, 0.5),
                ParametricPoint::new(3, 0.5, 0.5),
            ],
            false,
        );
        assert!(matches!(
            split(&whole, &curve, &evaluator, &mut ids),
            Err(AnalysisError::SplitNotSeparating { .. })
        ));
    }

    #[test]
    fn validate_reports_all_issues() {
        let (_evaluator, cage) = cube();
        let mut bad = region("bad", &[0, 99]);
        bad.unity_strength = 1.5;
        let (ok, issues) = validate(&bad, &cage);
        assert!(!ok);
        assert_eq!(issues.len(), 2);
        let good = region("good", &[0, 1]);
        assert!(validate(&good, &cage).0);
    }
}
