//! The control cage: the immutable polygonal input of an analysis session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Point;

/// Unordered vertex-index pair identifying a cage edge.
///
/// Always stored with the smaller index first so that `(i, j)` and `(j, i)`
/// name the same edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey(pub u32, pub u32);

impl EdgeKey {
    pub fn new(a: u32, b: u32) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Errors raised while constructing a [`ControlCage`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum CageError {
    #[error("cage has no faces")]
    Empty,

    #[error("face {face} references vertex {vertex} but cage has {vertex_count} vertices")]
    IndexOutOfRange {
        face: usize,
        vertex: u32,
        vertex_count: usize,
    },

    #[error("face {face} has {arity} vertices; faces must be triangles or quads")]
    BadArity { face: usize, arity: usize },

    #[error("face {face} repeats vertex {vertex}")]
    DuplicateVertex { face: usize, vertex: u32 },

    #[error("crease {edge:?} does not lie on any face")]
    CreaseNotAnEdge { edge: EdgeKey },

    #[error("crease {edge:?} sharpness {sharpness} outside [0, 10]")]
    SharpnessOutOfRange { edge: EdgeKey, sharpness: f32 },
}

/// The polygonal control mesh whose Catmull-Clark limit surface is the
/// geometry under analysis.
///
/// Constructed once per session by the bridge and immutable thereafter;
/// it never crosses the wire itself (the bridge payload does), so it
/// carries no serde. Vertex order within a face defines the face
/// orientation. An optional crease map attaches a semi-sharp sharpness
/// in `[0, 10]` to edges.
#[derive(Debug, Clone)]
pub struct ControlCage {
    id: Uuid,
    vertices: Vec<Point>,
    faces: Vec<Vec<u32>>,
    creases: BTreeMap<EdgeKey, f32>,
}

impl ControlCage {
    /// Validate and build a cage. See [`CageError`] for the invariants.
    pub fn new(
        vertices: Vec<Point>,
        faces: Vec<Vec<u32>>,
        creases: Vec<(EdgeKey, f32)>,
    ) -> Result<Self, CageError> {
        if faces.is_empty() {
            return Err(CageError::Empty);
        }

        let vertex_count = vertices.len();
        let mut edge_set = std::collections::BTreeSet::new();
        for (fi, face) in faces.iter().enumerate() {
            if face.len() < 3 || face.len() > 4 {
                return Err(CageError::BadArity {
                    face: fi,
                    arity: face.len(),
                });
            }
            for (k, &v) in face.iter().enumerate() {
                if v as usize >= vertex_count {
                    return Err(CageError::IndexOutOfRange {
                        face: fi,
                        vertex: v,
                        vertex_count,
                    });
                }
                if face[..k].contains(&v) {
                    return Err(CageError::DuplicateVertex { face: fi, vertex: v });
                }
            }
            for k in 0..face.len() {
                edge_set.insert(EdgeKey::new(face[k], face[(k + 1) % face.len()]));
            }
        }

        let mut crease_map = BTreeMap::new();
        for (edge, sharpness) in creases {
            if !(0.0..=10.0).contains(&sharpness) {
                return Err(CageError::SharpnessOutOfRange { edge, sharpness });
            }
            if !edge_set.contains(&edge) {
                return Err(CageError::CreaseNotAnEdge { edge });
            }
            crease_map.insert(edge, sharpness);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            vertices,
            faces,
            creases: crease_map,
        })
    }

    /// Structural identity of this cage. Caches (Laplacians, fitted
    /// surfaces) key on it; a different cage always has a different id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Vec<u32>] {
        &self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Sharpness of an edge, 0.0 when un-creased.
    pub fn sharpness(&self, edge: EdgeKey) -> f32 {
        self.creases.get(&edge).copied().unwrap_or(0.0)
    }

    pub fn creases(&self) -> impl Iterator<Item = (EdgeKey, f32)> + '_ {
        self.creases.iter().map(|(&e, &s)| (e, s))
    }

    /// True when `face` is a valid control-face index.
    pub fn contains_face(&self, face: u32) -> bool {
        (face as usize) < self.faces.len()
    }
}
