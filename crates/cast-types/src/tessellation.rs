//! Triangulated samples of the limit surface.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Vector};

/// A triangulation of the limit surface.
///
/// Produced by the evaluator either for display or as the sampling
/// substrate of the Laplacian. Never the authoritative geometry: every
/// vertex is an exact limit point, but the triangles between them are
/// an approximation at the chosen density.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TessellationResult {
    /// Exact limit positions.
    pub vertices: Vec<Point>,
    /// Unit surface normals, parallel to `vertices`.
    pub normals: Vec<Vector>,
    /// Triangle vertex indices.
    pub triangles: Vec<[u32; 3]>,
    /// Control-face id that produced each triangle, parallel to `triangles`.
    pub parent_face: Vec<u32>,
}

impl TessellationResult {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Structural consistency: index ranges, parallel array lengths.
    pub fn is_consistent(&self) -> bool {
        let n = self.vertices.len() as u32;
        self.normals.len() == self.vertices.len()
            && self.parent_face.len() == self.triangles.len()
            && self
                .triangles
                .iter()
                .all(|t| t.iter().all(|&i| i < n))
    }

    /// Iterate triangle corner positions.
    pub fn triangle_points(&self, t: usize) -> [Point; 3] {
        let [a, b, c] = self.triangles[t];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Axis-aligned bounds, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v[i]);
                max[i] = max[i].max(v[i]);
            }
        }
        Some((min, max))
    }
}
