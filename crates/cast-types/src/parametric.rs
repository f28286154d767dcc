//! Parametric addressing: points, curves, and regions on the limit surface.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The atomic addressable location on the surface: a control face and a
/// parameter pair in `[0, 1]²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParametricPoint {
    pub face: u32,
    pub u: f32,
    pub v: f32,
}

impl ParametricPoint {
    pub fn new(face: u32, u: f32, v: f32) -> Self {
        Self { face, u, v }
    }

    pub fn in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.u) && (0.0..=1.0).contains(&self.v)
    }
}

/// A piecewise-linear curve in parameter space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametricCurve {
    pub points: Vec<ParametricPoint>,
    pub closed: bool,
}

impl ParametricCurve {
    pub fn new(points: Vec<ParametricPoint>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Number of linear segments, counting the closing segment.
    pub fn segment_count(&self) -> usize {
        match self.points.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }

    /// Evaluate at `t ∈ [0, 1]` by piecewise-linear interpolation.
    ///
    /// Interpolation in (u, v) is only meaningful within one face chart;
    /// a segment whose endpoints sit on different faces snaps to the
    /// nearer endpoint instead of blending across the chart boundary.
    pub fn evaluate(&self, t: f32) -> Option<ParametricPoint> {
        if self.points.is_empty() {
            return None;
        }
        if self.points.len() == 1 {
            return Some(self.points[0]);
        }

        let segments = self.segment_count() as f32;
        let s = t.clamp(0.0, 1.0) * segments;
        let idx = (s.floor() as usize).min(self.segment_count() - 1);
        let local = s - idx as f32;

        let a = self.points[idx];
        let b = self.points[(idx + 1) % self.points.len()];

        if a.face == b.face {
            Some(ParametricPoint::new(
                a.face,
                a.u + (b.u - a.u) * local,
                a.v + (b.v - a.v) * local,
            ))
        } else if local < 0.5 {
            Some(a)
        } else {
            Some(b)
        }
    }
}

/// A subset of control faces treated as a unit by decomposition.
///
/// Regions are values: lenses and region operations build new regions
/// instead of mutating existing ones. Only the session layer above the
/// kernel tracks a current set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametricRegion {
    /// Unique id, generated monotonically per session.
    pub id: String,
    /// Control-face indices, deduplicated and ordered.
    pub faces: BTreeSet<u32>,
    /// Boundary curves in the parameter space of the region's faces.
    pub boundaries: Vec<ParametricCurve>,
    /// Which lens produced the region, e.g. `"differential:convex"` or
    /// `"spectral:mode_3"`.
    pub unity_principle: String,
    /// Coherence of the region under its lens, in `[0, 1]`.
    pub unity_strength: f32,
    /// Pinned regions survive re-running a lens.
    pub pinned: bool,
    /// Opaque per-lens data, carried through serialization untouched.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ParametricRegion {
    pub fn new(
        id: impl Into<String>,
        faces: impl IntoIterator<Item = u32>,
        unity_principle: impl Into<String>,
        unity_strength: f32,
    ) -> Self {
        Self {
            id: id.into(),
            faces: faces.into_iter().collect(),
            boundaries: Vec::new(),
            unity_principle: unity_principle.into(),
            unity_strength,
            pinned: false,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn contains_face(&self, face: u32) -> bool {
        self.faces.contains(&face)
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.faces.is_disjoint(&other.faces)
    }
}

/// Monotonic region-id source for one analysis session.
///
/// Identical inputs to merge/split reproduce the same face sets but may
/// receive fresh ids; only monotonicity is guaranteed.
#[derive(Debug, Default)]
pub struct RegionIdGenerator {
    next: u64,
}

impl RegionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("region_{}", self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_evaluates_endpoints_and_midpoint() {
        let curve = ParametricCurve::new(
            vec![
                ParametricPoint::new(0, 0.0, 0.0),
                ParametricPoint::new(0, 1.0, 0.5),
            ],
            false,
        );
        let start = curve.evaluate(0.0).unwrap();
        let mid = curve.evaluate(0.5).unwrap();
        let end = curve.evaluate(1.0).unwrap();
        assert_eq!(start.u, 0.0);
        assert!((mid.u - 0.5).abs() < 1e-6 && (mid.v - 0.25).abs() < 1e-6);
        assert_eq!(end.u, 1.0);
    }

    #[test]
    fn cross_face_segment_snaps_to_nearer_endpoint() {
        let curve = ParametricCurve::new(
            vec![
                ParametricPoint::new(0, 0.9, 0.5),
                ParametricPoint::new(1, 0.1, 0.5),
            ],
            false,
        );
        assert_eq!(curve.evaluate(0.25).unwrap().face, 0);
        assert_eq!(curve.evaluate(0.75).unwrap().face, 1);
    }

    #[test]
    fn closed_curve_wraps_final_segment() {
        let curve = ParametricCurve::new(
            vec![
                ParametricPoint::new(0, 0.0, 0.0),
                ParametricPoint::new(0, 1.0, 0.0),
                ParametricPoint::new(0, 1.0, 1.0),
            ],
            true,
        );
        assert_eq!(curve.segment_count(), 3);
        // Last third interpolates back toward the first point.
        let p = curve.evaluate(0.999).unwrap();
        assert!(p.u < 0.1 && p.v < 0.1);
    }

    #[test]
    fn region_ids_are_monotonic() {
        let mut generator = RegionIdGenerator::new();
        assert_eq!(generator.next_id(), "region_0");
        assert_eq!(generator.next_id(), "region_1");
    }
}
