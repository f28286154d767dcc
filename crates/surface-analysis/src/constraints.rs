//! Manufacturability validation: draft angles, demolding occlusion,
//! wall thickness.

use cast_types::{
    to_dpoint, ConstraintReport, ConstraintViolation, ControlCage, DPoint, DVector,
    ParametricRegion, Severity, TessellationResult,
};
use subd_eval::SubdEvaluator;

use crate::error::AnalysisError;

/// Validation thresholds. Defaults are rigid-plaster slip casting
/// practice: half a degree of draft is the physical minimum, two
/// degrees the recommendation, three millimeters the minimum wall.
#[derive(Debug, Clone)]
pub struct ConstraintThresholds {
    pub min_draft_deg: f64,
    pub recommended_draft_deg: f64,
    pub min_wall_thickness_mm: f64,
    /// Tessellation level used for the occlusion ray test. Level 4 is
    /// dense enough that the violation set is stable under refinement
    /// for the shapes this kernel targets; raise it for thin features.
    pub occlusion_level: u8,
}

impl Default for ConstraintThresholds {
    fn default() -> Self {
        Self {
            min_draft_deg: 0.5,
            recommended_draft_deg: 2.0,
            min_wall_thickness_mm: 3.0,
            occlusion_level: 4,
        }
    }
}

/// Optional per-face wall thickness probe (mm).
pub type ThicknessProbe<'a> = &'a dyn Fn(u32) -> Option<f64>;

/// Pure validator over an initialized evaluator and its cage.
pub struct ConstraintValidator<'a> {
    evaluator: &'a SubdEvaluator,
    cage: &'a ControlCage,
    thresholds: ConstraintThresholds,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new(evaluator: &'a SubdEvaluator, cage: &'a ControlCage) -> Self {
        Self {
            evaluator,
            cage,
            thresholds: ConstraintThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ConstraintThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Validate a region against a demolding direction.
    pub fn validate_region(
        &self,
        region: &ParametricRegion,
        direction: &DVector,
        thickness: Option<ThicknessProbe<'_>>,
    ) -> Result<ConstraintReport, AnalysisError> {
        let d = normalize_direction(direction)?;
        let mut report = ConstraintReport::default();

        for &face in &region.faces {
            self.check_draft(face, &d, &mut report)?;
            self.check_crease_features(face, &mut report);
            if let Some(probe) = thickness {
                self.check_wall_thickness(face, probe, &mut report);
            }
        }
        self.check_occlusion(region, &d, &mut report)?;

        // Errors first, then by descending score: worst findings lead.
        report.violations.sort_by(|a, b| {
            severity_rank(a.severity)
                .cmp(&severity_rank(b.severity))
                .then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.face.cmp(&b.face))
        });
        Ok(report)
    }

    /// Draft angle policy at the face center.
    ///
    /// `draft = 90° − angle(n, d)`: the angle between the surface and
    /// the plane perpendicular to the pull. Exactly zero draft falls
    /// into the insufficient-draft error band (inclusive lower bound).
    fn check_draft(
        &self,
        face: u32,
        d: &DVector,
        report: &mut ConstraintReport,
    ) -> Result<(), AnalysisError> {
        let (_, normal) = self.evaluator.evaluate_limit(face, 0.5, 0.5)?;
        let n = DVector::new(normal.x as f64, normal.y as f64, normal.z as f64);
        let angle = n.dot(d).clamp(-1.0, 1.0).acos().to_degrees();
        let mut draft = 90.0 - angle;
        // Grazing faces: a numerically negative zero is zero draft
        // (insufficient), not an undercut.
        if (-1e-6..0.0).contains(&draft) {
            draft = 0.0;
        }

        let t = &self.thresholds;
        if draft < 0.0 {
            report.push(ConstraintViolation {
                severity: Severity::Error,
                description: format!("undercut at face {face}: draft {draft:.2} deg"),
                face,
                score: 1.0,
                remediation: "split the region or flip the demolding direction".into(),
            });
        } else if draft < t.min_draft_deg {
            report.push(ConstraintViolation {
                severity: Severity::Error,
                description: format!(
                    "insufficient draft for rigid plaster at face {face}: {draft:.2} deg (minimum {:.1})",
                    t.min_draft_deg
                ),
                face,
                score: (1.0 - draft / t.recommended_draft_deg).clamp(0.0, 1.0) as f32,
                remediation: "add draft or choose a steeper demolding direction".into(),
            });
        } else if draft < t.recommended_draft_deg {
            report.push(ConstraintViolation {
                severity: Severity::Warning,
                description: format!(
                    "below recommended {:.0} deg draft at face {face}: {draft:.2} deg",
                    t.recommended_draft_deg
                ),
                face,
                score: (1.0 - draft / t.recommended_draft_deg).clamp(0.0, 1.0) as f32,
                remediation: "consider additional draft for reliable release".into(),
            });
        }
        Ok(())
    }

    /// Sharp creases the user kept are documented as features.
    fn check_crease_features(&self, face: u32, report: &mut ConstraintReport) {
        let Some(verts) = self.cage.faces().get(face as usize) else {
            return;
        };
        for k in 0..verts.len() {
            let edge = cast_types::EdgeKey::new(verts[k], verts[(k + 1) % verts.len()]);
            let sharpness = self.cage.sharpness(edge);
            if sharpness > 0.0 {
                report.push(ConstraintViolation {
                    severity: Severity::Feature,
                    description: format!(
                        "sharp crease (sharpness {sharpness:.1}) retained on face {face}"
                    ),
                    face,
                    score: (sharpness / 10.0).clamp(0.0, 1.0) as f32,
                    remediation: "verify the crease demolds cleanly or soften it".into(),
                });
            }
        }
    }

    fn check_wall_thickness(
        &self,
        face: u32,
        probe: ThicknessProbe<'_>,
        report: &mut ConstraintReport,
    ) {
        let Some(thickness) = probe(face) else {
            return;
        };
        let min = self.thresholds.min_wall_thickness_mm;
        if thickness < min {
            report.push(ConstraintViolation {
                severity: Severity::Warning,
                description: format!(
                    "wall thickness {thickness:.2} mm below minimum {min:.1} mm at face {face}"
                ),
                face,
                score: (1.0 - thickness / min).clamp(0.0, 1.0) as f32,
                remediation: "thicken the wall or accept a fragile cast".into(),
            });
        }
    }

    /// Ray-cast each face center along the demolding direction against
    /// the region's tessellated envelope; a re-entry means the path is
    /// occluded.
    fn check_occlusion(
        &self,
        region: &ParametricRegion,
        d: &DVector,
        report: &mut ConstraintReport,
    ) -> Result<(), AnalysisError> {
        let mesh = self
            .evaluator
            .tessellate(self.thresholds.occlusion_level, false)?;
        let triangles: Vec<usize> = (0..mesh.triangle_count())
            .filter(|&t| region.contains_face(mesh.parent_face[t]))
            .collect();
        if triangles.is_empty() {
            return Ok(());
        }

        let extent = extent_along(&mesh, &triangles, d).max(1e-12);
        let epsilon = extent * 1e-4;

        for &face in &region.faces {
            let (center, _) = self.evaluator.evaluate_limit(face, 0.5, 0.5)?;
            let origin = to_dpoint(&center) + d * epsilon;
            let mut nearest: Option<f64> = None;
            for &t in &triangles {
                let [a, b, c] = triangle_points(&mesh, t);
                if let Some(hit) = ray_triangle(&origin, d, &a, &b, &c) {
                    if hit > epsilon && nearest.map(|n| hit < n).unwrap_or(true) {
                        nearest = Some(hit);
                    }
                }
            }
            if let Some(depth) = nearest {
                report.push(ConstraintViolation {
                    severity: Severity::Error,
                    description: format!(
                        "occluded demolding path at face {face}: surface re-entry after {depth:.3}"
                    ),
                    face,
                    score: (depth / extent).clamp(0.0, 1.0) as f32,
                    remediation: "split the region so each piece pulls free".into(),
                });
            }
        }
        Ok(())
    }
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Error => 0,
        Severity::Warning => 1,
        Severity::Feature => 2,
    }
}

fn normalize_direction(direction: &DVector) -> Result<DVector, AnalysisError> {
    let norm = direction.norm();
    if norm < 1e-12 {
        return Err(AnalysisError::InvalidRegion {
            id: String::new(),
            reason: "demolding direction has zero length".into(),
        });
    }
    Ok(direction / norm)
}

fn triangle_points(mesh: &TessellationResult, t: usize) -> [DPoint; 3] {
    let [a, b, c] = mesh.triangles[t];
    [
        to_dpoint(&mesh.vertices[a as usize]),
        to_dpoint(&mesh.vertices[b as usize]),
        to_dpoint(&mesh.vertices[c as usize]),
    ]
}

fn extent_along(mesh: &TessellationResult, triangles: &[usize], d: &DVector) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &t in triangles {
        for p in triangle_points(mesh, t) {
            let h = p.coords.dot(d);
            min = min.min(h);
            max = max.max(h);
        }
    }
    (max - min).max(0.0)
}

/// Möller-Trumbore; returns the ray parameter of the hit.
fn ray_triangle(
    origin: &DPoint,
    direction: &DVector,
    a: &DPoint,
    b: &DPoint,
    c: &DPoint,
) -> Option<f64> {
    let e1 = b - a;
    let e2 = c - a;
    let p = direction.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < 1e-14 {
        return None;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = direction.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv;
    if t > 0.0 {
        Some(t)
    } else {
        None
    }
}
