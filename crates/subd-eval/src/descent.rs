//! Evaluation of irregular patches by bounded local subdivision.
//!
//! A quad whose support touches an extraordinary vertex, a semi-sharp
//! crease, or an irregular boundary configuration is not a single
//! B-spline. Away from the irregular corner the limit surface still is
//! piecewise B-spline at a finer level, so the evaluator carves out a
//! two-ring fragment around the quad, subdivides it locally toward the
//! query point, and evaluates the first regular sub-patch it reaches.
//! The subdivision count is bounded by the parameter's distance to the
//! irregular corner; queries that pin the corner itself resolve through
//! the vertex limit masks instead. This is the patch-table analogue of
//! Stam's eigenbasis evaluation: the same subdivision matrix is applied
//! a bounded number of times instead of being diagonalized.

use std::collections::HashMap;

use cast_types::{DPoint, DVector, EdgeKey};

use crate::chart::{quadrant, quadrant_chart, Chart2};
use crate::mesh::SubdMesh;
use crate::patch::{eval_bspline, extract_net, is_regular, SurfaceJet};
use crate::refine::catmull_clark_step;

/// Beyond this depth the remaining domain is below 2⁻⁴⁸ of a patch; the
/// query is treated as sitting on the irregular corner itself.
const MAX_DEPTH: usize = 48;

/// A local neighborhood of the evaluator's refined mesh, re-extracted
/// after each subdivision so it stays small. Fragment cut edges are
/// distinguishable from true cage boundary through the mesh's hard
/// boundary flags; everything within two rings of the target quad
/// subdivides with correct stencils.
pub(crate) struct Fragment {
    pub mesh: SubdMesh,
    pub target: u32,
}

impl Fragment {
    /// Extract the two-ring neighborhood of `target` from `source`.
    pub fn extract(source: &SubdMesh, target: u32) -> Fragment {
        let mut face_set: Vec<u32> = vec![target];
        let mut in_set = vec![false; source.face_count()];
        in_set[target as usize] = true;
        for _ring in 0..2 {
            let current = face_set.clone();
            for f in current {
                for &v in &source.faces[f as usize] {
                    for &g in &source.vert_faces[v as usize] {
                        if !in_set[g as usize] {
                            in_set[g as usize] = true;
                            face_set.push(g);
                        }
                    }
                }
            }
        }
        face_set.sort_unstable();

        let mut vert_remap: HashMap<u32, u32> = HashMap::new();
        let mut positions = Vec::new();
        let mut faces = Vec::new();
        for &f in &face_set {
            let verts = &source.faces[f as usize];
            let mut mapped = Vec::with_capacity(verts.len());
            for &v in verts {
                let id = *vert_remap.entry(v).or_insert_with(|| {
                    positions.push(source.positions[v as usize]);
                    (positions.len() - 1) as u32
                });
                mapped.push(id);
            }
            faces.push(mapped);
        }

        let mut sharpness: HashMap<EdgeKey, f64> = HashMap::new();
        let mut hard: HashMap<EdgeKey, bool> = HashMap::new();
        for (&src, &dst) in &vert_remap {
            for &e in &source.vert_edges[src as usize] {
                let edge = &source.edges[e as usize];
                let other = if edge.verts[0] == src {
                    edge.verts[1]
                } else {
                    edge.verts[0]
                };
                if let Some(&dst_other) = vert_remap.get(&other) {
                    let key = EdgeKey::new(dst, dst_other);
                    if edge.sharpness > 0.0 {
                        sharpness.insert(key, edge.sharpness);
                    }
                    if edge.hard_boundary {
                        hard.insert(key, true);
                    }
                }
            }
        }

        let target_local = face_set.binary_search(&target).expect("target in set") as u32;
        let mesh = SubdMesh::build(
            positions,
            faces,
            |key| sharpness.get(&key).copied().unwrap_or(0.0),
            Some(&hard),
        )
        .expect("fragment of a manifold mesh is manifold");
        Fragment {
            mesh,
            target: target_local,
        }
    }
}

/// Result of descending to a parameter on an irregular quad.
pub(crate) enum DescentResult {
    /// A regular sub-patch was reached; the jet is with respect to the
    /// original quad's `(s, t)` (chart scaling already applied).
    Patch(SurfaceJet),
    /// The query pinned an irregular corner; `vertex` is the id of that
    /// corner in the evaluator's refined mesh.
    Corner { vertex: u32 },
}

/// Evaluate quad `q` of `source` at `(s, t)` by local subdivision.
pub(crate) fn descend(source: &SubdMesh, q: u32, s: f64, t: f64) -> DescentResult {
    let mut fragment = Fragment::extract(source, q);
    let (s0, t0) = (s, t);
    let (mut s, mut t) = (s, t);
    // Accumulated chart from the original (s, t) to the current quad.
    let mut chart = Chart2 {
        s,
        t,
        j: [[1.0, 0.0], [0.0, 1.0]],
        h_s: [[0.0; 2]; 2],
        h_t: [[0.0; 2]; 2],
    };

    for _depth in 0..MAX_DEPTH {
        if is_regular(&fragment.mesh, fragment.target) {
            let net = extract_net(&fragment.mesh, fragment.target);
            return DescentResult::Patch(eval_bspline(&net, s, t).pullback(&chart));
        }

        let step = catmull_clark_step(&fragment.mesh).expect("fragment refinement");
        let k = quadrant(s, t);
        let local = quadrant_chart(k, s, t);
        chart = chart.then_affine(local.s, local.t, local.j);
        (s, t) = (local.s, local.t);

        let child = step.children[fragment.target as usize][k];
        fragment = Fragment::extract(&step.mesh, child);
    }

    // The query is (numerically) on the irregular corner: only a
    // parameter pinned to a corner keeps selecting that corner's
    // quadrant for all 48 levels. Report which corner of the original
    // quad it is.
    let vertex = source.faces[q as usize][quadrant(s0, t0)];
    DescentResult::Corner { vertex }
}

/// Limit position and normal of a mesh vertex through the vertex limit
/// masks.
///
/// Interior vertices (any valence, no semi-sharp incident edges) use the
/// Catmull-Clark limit mask and the tangent masks of Halstead et al.;
/// hard-boundary vertices use the boundary curve mask. `None` when a
/// mask does not apply (semi-sharp vertices evaluate through `descend`
/// at a nudged parameter instead).
pub(crate) fn vertex_limit(mesh: &SubdMesh, v: u32) -> Option<(DPoint, Option<DVector>)> {
    if mesh.has_sharp_incident_edge(v) {
        return None;
    }
    let position = mesh.positions[v as usize];

    if mesh.vert_faces[v as usize].len() == 1 {
        // Cage corner: interpolated; normal comes from the patch.
        return Some((position, None));
    }
    if mesh.is_boundary_vertex(v) {
        let (a, b) = mesh.boundary_neighbors(v)?;
        let pa = mesh.positions[a as usize];
        let pb = mesh.positions[b as usize];
        let limit = DPoint::from((pa.coords + 4.0 * position.coords + pb.coords) / 6.0);
        return Some((limit, None));
    }

    let (ring, diag) = mesh.ordered_ring(v)?;
    let n = ring.len();
    let nf = n as f64;

    let mut edge_sum = DVector::zeros();
    let mut face_sum = DVector::zeros();
    for i in 0..n {
        edge_sum += mesh.positions[ring[i] as usize].coords;
        face_sum += mesh.positions[diag[i] as usize].coords;
    }
    let limit = DPoint::from(
        (nf * nf * position.coords + 4.0 * edge_sum + face_sum) / (nf * (nf + 5.0)),
    );

    // Tangent masks.
    let alpha = 1.0
        + (2.0 * std::f64::consts::PI / nf).cos()
        + (std::f64::consts::PI / nf).cos()
            * (2.0 * (9.0 + (2.0 * std::f64::consts::PI / nf).cos())).sqrt();
    let mut tau1 = DVector::zeros();
    let mut tau2 = DVector::zeros();
    for i in 0..n {
        let a0 = 2.0 * std::f64::consts::PI * i as f64 / nf;
        let a1 = 2.0 * std::f64::consts::PI * (i as f64 + 1.0) / nf;
        tau1 += mesh.positions[ring[i] as usize].coords * (alpha * a0.cos())
            + mesh.positions[diag[i] as usize].coords * (a0.cos() + a1.cos());
        tau2 += mesh.positions[ring[i] as usize].coords * (alpha * a0.sin())
            + mesh.positions[diag[i] as usize].coords * (a0.sin() + a1.sin());
    }
    let normal = tau1.cross(&tau2);
    let normal = if normal.norm() > 1e-30 {
        Some(normal.normalize())
    } else {
        None
    };
    Some((limit, normal))
}
