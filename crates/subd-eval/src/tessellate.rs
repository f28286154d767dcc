//! Limit-surface triangulation with topological welding.
//!
//! Level `L` samples each control face on a grid of `2^L + 2` segments
//! per side; `adaptive` doubles the density on faces touching an
//! extraordinary feature. Samples shared between faces are welded
//! through topological keys (cage vertex, cage edge + reduced fraction)
//! so shared positions are computed once and the mesh is watertight at
//! uniform density. Adaptive density can leave T-junctions along
//! density changes; that mode is for display, the Laplacian builds on
//! uniform tessellations.

use std::collections::HashMap;

use cast_types::{to_point, to_vector, EdgeKey, TessellationResult};

use crate::error::EvalError;
use crate::evaluator::{unit_normal, EvalState, RawEval, SubdEvaluator};

/// Maximum tessellation level.
pub const MAX_LEVEL: u8 = 6;

/// Welding key for one grid sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SampleKey {
    /// A cage vertex.
    Vertex(u32),
    /// A point on a cage edge at a reduced fraction along the edge's
    /// canonical (low index → high index) direction.
    Edge(EdgeKey, u32, u32),
    /// Face-interior sample, never shared.
    Interior(u32, u32, u32),
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

fn edge_key(a: u32, b: u32, num: u32, den: u32) -> SampleKey {
    let (num, den) = {
        let g = gcd(num, den);
        (num / g, den / g)
    };
    if a <= b {
        SampleKey::Edge(EdgeKey::new(a, b), num, den)
    } else {
        SampleKey::Edge(EdgeKey::new(a, b), den - num, den)
    }
}

/// Classify the grid sample `(i, j)` of `face` (arity 3 or 4, grid of
/// `m` segments) as a weld key.
fn sample_key(face: u32, verts: &[u32], m: u32, i: u32, j: u32) -> SampleKey {
    let quad = verts.len() == 4;
    let (v0, v1, v2) = (verts[0], verts[1], verts[2]);
    let v3 = if quad { verts[3] } else { v2 };

    if !quad && j == m {
        // The collapsed edge of a triangle chart.
        return SampleKey::Vertex(v2);
    }
    match ((i == 0, i == m), (j == 0, j == m)) {
        ((true, _), (true, _)) => SampleKey::Vertex(v0),
        ((_, true), (true, _)) => SampleKey::Vertex(v1),
        ((_, true), (_, true)) => SampleKey::Vertex(v2),
        ((true, _), (_, true)) => SampleKey::Vertex(v3),
        (_, (true, _)) => edge_key(v0, v1, i, m),
        (_, (_, true)) => edge_key(v3, v2, i, m),
        ((true, _), _) => edge_key(v0, v3, j, m),
        ((_, true), _) => edge_key(v1, v2, j, m),
        _ => SampleKey::Interior(face, i, j),
    }
}

/// Does `face` touch an extraordinary feature (non-quad, irregular
/// corner valence, or crease)? Used for adaptive density.
fn is_feature_face(state: &EvalState, face: usize) -> bool {
    let verts = &state.base_faces[face];
    if verts.len() != 4 {
        return true;
    }
    verts.iter().any(|&v| {
        if state.base.has_sharp_incident_edge(v) {
            return true;
        }
        if state.base.is_boundary_vertex(v) {
            let faces = state.base.vert_faces[v as usize].len();
            faces > 2
        } else {
            state.base.valence(v) != 4
        }
    })
}

pub(crate) fn tessellate(
    state: &EvalState,
    level: u8,
    adaptive: bool,
) -> Result<TessellationResult, EvalError> {
    if level > MAX_LEVEL {
        return Err(EvalError::LevelOutOfRange {
            level,
            max: MAX_LEVEL,
        });
    }
    let base_segments = (1u32 << level) + 2;

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut triangles: Vec<[u32; 3]> = Vec::new();
    let mut parent_face = Vec::new();
    let mut weld: HashMap<SampleKey, u32> = HashMap::new();

    for face in 0..state.base_faces.len() {
        let verts = state.base_faces[face].clone();
        let m = if adaptive && is_feature_face(state, face) {
            base_segments * 2
        } else {
            base_segments
        };

        // Resolve grid sample ids, evaluating on first sight of a key.
        let mut grid = vec![0u32; ((m + 1) * (m + 1)) as usize];
        for j in 0..=m {
            for i in 0..=m {
                let key = sample_key(face as u32, &verts, m, i, j);
                let id = match weld.get(&key) {
                    Some(&id) => id,
                    None => {
                        let u = i as f64 / m as f64;
                        let v = j as f64 / m as f64;
                        let (p, n) = sample(state, face as u32, u, v, &key);
                        let id = vertices.len() as u32;
                        vertices.push(to_point(&p));
                        normals.push(to_vector(&n));
                        weld.insert(key, id);
                        id
                    }
                };
                grid[(j * (m + 1) + i) as usize] = id;
            }
        }

        for j in 0..m {
            for i in 0..m {
                let a = grid[(j * (m + 1) + i) as usize];
                let b = grid[(j * (m + 1) + i + 1) as usize];
                let c = grid[((j + 1) * (m + 1) + i + 1) as usize];
                let d = grid[((j + 1) * (m + 1) + i) as usize];
                for tri in [[a, b, c], [a, c, d]] {
                    if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
                        triangles.push(tri);
                        parent_face.push(face as u32);
                    }
                }
            }
        }
    }

    tracing::debug!(
        level,
        adaptive,
        vertices = vertices.len(),
        triangles = triangles.len(),
        "tessellated limit surface"
    );

    Ok(TessellationResult {
        vertices,
        normals,
        triangles,
        parent_face,
    })
}

fn sample(
    state: &EvalState,
    face: u32,
    u: f64,
    v: f64,
    key: &SampleKey,
) -> (cast_types::DPoint, cast_types::DVector) {
    if let SampleKey::Vertex(cage_vertex) = key {
        let vertex = state.l2_vertex_of_cage[*cage_vertex as usize];
        return SubdEvaluator::corner_sample(state, face, u, v, vertex);
    }
    match SubdEvaluator::eval_raw(state, face, u, v) {
        RawEval::Jet(jet) => (jet.p, unit_normal(&jet)),
        RawEval::Corner { vertex } => SubdEvaluator::corner_sample(state, face, u, v, vertex),
    }
}
