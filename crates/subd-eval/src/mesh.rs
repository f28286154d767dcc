//! Quad-dominant mesh connectivity used by the refiner and evaluator.
//!
//! A [`SubdMesh`] is either the base cage (triangles and quads) or a
//! refined level (quads only). Adjacency is rebuilt on construction;
//! boundary-ness of an edge is carried explicitly so that clipped
//! fragments (see `descent`) keep the true cage boundary distinct from
//! their own cut edges.

use std::collections::HashMap;

use cast_types::{to_dpoint, ControlCage, DPoint, EdgeKey};

use crate::error::EvalError;

#[derive(Debug, Clone)]
pub(crate) struct MeshEdge {
    pub verts: [u32; 2],
    /// Incident faces, up to two for a manifold edge.
    pub faces: Vec<u32>,
    /// Semi-sharp crease sharpness; decremented per refinement level.
    pub sharpness: f64,
    /// True cage boundary. In fragments this differs from having a
    /// single incident face.
    pub hard_boundary: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SubdMesh {
    pub positions: Vec<DPoint>,
    pub faces: Vec<Vec<u32>>,
    pub edges: Vec<MeshEdge>,
    pub edge_map: HashMap<EdgeKey, u32>,
    pub vert_faces: Vec<Vec<u32>>,
    pub vert_edges: Vec<Vec<u32>>,
}

impl SubdMesh {
    /// Build connectivity for the given faces. `sharpness` supplies the
    /// crease value per edge key; `hard_boundary_override` forces the
    /// boundary flag (fragments pass the flags of their source mesh).
    pub fn build(
        positions: Vec<DPoint>,
        faces: Vec<Vec<u32>>,
        sharpness: impl Fn(EdgeKey) -> f64,
        hard_boundary_override: Option<&HashMap<EdgeKey, bool>>,
    ) -> Result<Self, EvalError> {
        let vertex_count = positions.len();
        let mut edges: Vec<MeshEdge> = Vec::new();
        let mut edge_map: HashMap<EdgeKey, u32> = HashMap::new();
        let mut vert_faces: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];
        let mut vert_edges: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];

        for (fi, face) in faces.iter().enumerate() {
            for &v in face {
                vert_faces[v as usize].push(fi as u32);
            }
            for k in 0..face.len() {
                let a = face[k];
                let b = face[(k + 1) % face.len()];
                let key = EdgeKey::new(a, b);
                let ei = *edge_map.entry(key).or_insert_with(|| {
                    let id = edges.len() as u32;
                    edges.push(MeshEdge {
                        verts: [key.0, key.1],
                        faces: Vec::new(),
                        sharpness: sharpness(key),
                        hard_boundary: false,
                    });
                    vert_edges[key.0 as usize].push(id);
                    vert_edges[key.1 as usize].push(id);
                    id
                });
                let edge = &mut edges[ei as usize];
                edge.faces.push(fi as u32);
                if edge.faces.len() > 2 {
                    return Err(EvalError::InvalidCage {
                        reason: format!(
                            "edge ({}, {}) is non-manifold ({} incident faces)",
                            key.0,
                            key.1,
                            edge.faces.len()
                        ),
                    });
                }
            }
        }

        for edge in &mut edges {
            let key = EdgeKey::new(edge.verts[0], edge.verts[1]);
            edge.hard_boundary = match hard_boundary_override {
                Some(flags) => flags.get(&key).copied().unwrap_or(false),
                None => edge.faces.len() == 1,
            };
        }

        Ok(Self {
            positions,
            faces,
            edges,
            edge_map,
            vert_faces,
            vert_edges,
        })
    }

    pub fn from_cage(cage: &ControlCage) -> Result<Self, EvalError> {
        let positions = cage.vertices().iter().map(to_dpoint).collect();
        let faces = cage.faces().to_vec();
        Self::build(positions, faces, |key| cage.sharpness(key) as f64, None)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_between(&self, a: u32, b: u32) -> Option<u32> {
        self.edge_map.get(&EdgeKey::new(a, b)).copied()
    }

    /// The face on the other side of edge (a, b) from `face`.
    pub fn face_across(&self, a: u32, b: u32, face: u32) -> Option<u32> {
        let edge = &self.edges[self.edge_between(a, b)? as usize];
        edge.faces.iter().copied().find(|&f| f != face)
    }

    pub fn valence(&self, v: u32) -> usize {
        self.vert_edges[v as usize].len()
    }

    /// Number of hard-boundary edges incident to `v`.
    pub fn boundary_edge_count(&self, v: u32) -> usize {
        self.vert_edges[v as usize]
            .iter()
            .filter(|&&e| self.edges[e as usize].hard_boundary)
            .count()
    }

    pub fn is_boundary_vertex(&self, v: u32) -> bool {
        self.boundary_edge_count(v) > 0
    }

    /// Sharpness of edge (a, b); 0 when absent.
    pub fn edge_sharpness(&self, a: u32, b: u32) -> f64 {
        self.edge_between(a, b)
            .map(|e| self.edges[e as usize].sharpness)
            .unwrap_or(0.0)
    }

    /// True when some edge incident to `v` carries semi-sharp sharpness.
    pub fn has_sharp_incident_edge(&self, v: u32) -> bool {
        self.vert_edges[v as usize]
            .iter()
            .any(|&e| self.edges[e as usize].sharpness > 0.0)
    }

    /// Index of `v` within face `f`.
    pub fn corner_index(&self, f: u32, v: u32) -> Option<usize> {
        self.faces[f as usize].iter().position(|&w| w == v)
    }

    /// Counter-clockwise 1-ring of an interior vertex on a quad mesh.
    ///
    /// Returns per incident face `i` the edge neighbor `e_i` (the vertex
    /// after `v` in face `i`) and the diagonal vertex `d_i`. `None` for
    /// boundary vertices or if the walk does not close (non-manifold).
    pub fn ordered_ring(&self, v: u32) -> Option<(Vec<u32>, Vec<u32>)> {
        if self.is_boundary_vertex(v) {
            return None;
        }
        let n = self.vert_faces[v as usize].len();
        if n == 0 || self.valence(v) != n {
            return None;
        }

        let mut edge_neighbors = Vec::with_capacity(n);
        let mut diagonals = Vec::with_capacity(n);
        let start = self.vert_faces[v as usize][0];
        let mut face = start;
        for _ in 0..n {
            let verts = &self.faces[face as usize];
            if verts.len() != 4 {
                return None;
            }
            let i = self.corner_index(face, v)?;
            let next = verts[(i + 1) % 4];
            let diag = verts[(i + 2) % 4];
            let prev = verts[(i + 3) % 4];
            edge_neighbors.push(next);
            diagonals.push(diag);
            // CCW successor shares the edge (v, prev).
            face = self.face_across(v, prev, face)?;
        }
        if face != start {
            return None;
        }
        Some((edge_neighbors, diagonals))
    }

    /// The two hard-boundary edge neighbors of a boundary vertex.
    pub fn boundary_neighbors(&self, v: u32) -> Option<(u32, u32)> {
        let mut ends = self.vert_edges[v as usize].iter().filter_map(|&e| {
            let edge = &self.edges[e as usize];
            if edge.hard_boundary {
                Some(if edge.verts[0] == v {
                    edge.verts[1]
                } else {
                    edge.verts[0]
                })
            } else {
                None
            }
        });
        let a = ends.next()?;
        let b = ends.next()?;
        if ends.next().is_some() {
            return None;
        }
        Some((a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_types::Point;

    fn cube_cage() -> ControlCage {
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
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn cube_adjacency_counts() {
        let mesh = SubdMesh::from_cage(&cube_cage()).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.edge_count(), 12);
        assert_eq!(mesh.face_count(), 6);
        for v in 0..8 {
            assert_eq!(mesh.valence(v), 3);
            assert!(!mesh.is_boundary_vertex(v));
        }
    }

    #[test]
    fn cube_ring_walk_closes() {
        let mesh = SubdMesh::from_cage(&cube_cage()).unwrap();
        let (edge_neighbors, diagonals) = mesh.ordered_ring(0).unwrap();
        assert_eq!(edge_neighbors.len(), 3);
        assert_eq!(diagonals.len(), 3);
        // Edge neighbors of corner 0 are its three cube neighbors.
        let mut sorted = edge_neighbors.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 3, 4]);
    }

    #[test]
    fn single_quad_is_all_boundary() {
        let cage = ControlCage::new(
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
            vec![],
        )
        .unwrap();
        let mesh = SubdMesh::from_cage(&cage).unwrap();
        for e in &mesh.edges {
            assert!(e.hard_boundary);
        }
        assert!(mesh.ordered_ring(0).is_none());
        assert_eq!(mesh.boundary_neighbors(0), Some((1, 3)));
    }

    #[test]
    fn rejects_non_manifold_edge() {
        let positions = vec![DPoint::new(0.0, 0.0, 0.0); 5];
        let faces = vec![vec![0, 1, 2], vec![0, 1, 3], vec![0, 1, 4]];
        let result = SubdMesh::build(positions, faces, |_| 0.0, None);
        assert!(matches!(result, Err(EvalError::InvalidCage { .. })));
    }
}
