//! One Catmull-Clark refinement step and the one-shot topology refiner.

use std::collections::HashMap;

use cast_types::{DPoint, DVector, EdgeKey};

use crate::error::EvalError;
use crate::mesh::SubdMesh;

/// Output of one refinement step.
pub(crate) struct RefineStep {
    pub mesh: SubdMesh,
    /// Child face ids per parent face, one per parent corner.
    pub children: Vec<Vec<u32>>,
    /// Child vertex id of each parent vertex (the vertex-point block).
    pub vertex_children: Vec<u32>,
}

/// Centroid of a face's vertex positions.
fn face_point(mesh: &SubdMesh, f: usize) -> DPoint {
    let verts = &mesh.faces[f];
    let mut acc = DVector::zeros();
    for &v in verts {
        acc += mesh.positions[v as usize].coords;
    }
    DPoint::from(acc / verts.len() as f64)
}

/// Apply one Catmull-Clark step with semi-sharp crease and boundary rules.
///
/// Boundary interpolation is "edge and corner": hard-boundary edges
/// subdivide as curve midpoints, boundary vertices follow the crease
/// rule, and a vertex with a single incident face is a hard corner.
/// Semi-sharp sharpness decays by one per step; fractional sharpness
/// blends the smooth and sharp rules.
pub(crate) fn catmull_clark_step(mesh: &SubdMesh) -> Result<RefineStep, EvalError> {
    let face_count = mesh.face_count();
    let edge_count = mesh.edge_count();
    let vertex_count = mesh.vertex_count();

    let face_points: Vec<DPoint> = (0..face_count).map(|f| face_point(mesh, f)).collect();

    // Edge points: smooth = average of endpoints and adjacent face
    // points; sharp = midpoint; fractional sharpness blends.
    let mut edge_points = Vec::with_capacity(edge_count);
    for edge in &mesh.edges {
        let p0 = mesh.positions[edge.verts[0] as usize];
        let p1 = mesh.positions[edge.verts[1] as usize];
        let midpoint = DPoint::from((p0.coords + p1.coords) / 2.0);
        let point = if edge.hard_boundary || edge.faces.len() < 2 {
            midpoint
        } else {
            let fp0 = face_points[edge.faces[0] as usize];
            let fp1 = face_points[edge.faces[1] as usize];
            let smooth =
                DPoint::from((p0.coords + p1.coords + fp0.coords + fp1.coords) / 4.0);
            let t = edge.sharpness.clamp(0.0, 1.0);
            DPoint::from(smooth.coords.lerp(&midpoint.coords, t))
        };
        edge_points.push(point);
    }

    // Vertex points.
    let mut vertex_points = Vec::with_capacity(vertex_count);
    for v in 0..vertex_count as u32 {
        let position = mesh.positions[v as usize];
        let incident_faces = &mesh.vert_faces[v as usize];
        let incident_edges = &mesh.vert_edges[v as usize];

        let point = if incident_faces.len() == 1 {
            // Lone corner of the cage boundary: interpolated.
            position
        } else if mesh.is_boundary_vertex(v) {
            match mesh.boundary_neighbors(v) {
                Some((a, b)) => {
                    let pa = mesh.positions[a as usize];
                    let pb = mesh.positions[b as usize];
                    DPoint::from((pa.coords + 6.0 * position.coords + pb.coords) / 8.0)
                }
                // More than two boundary edges: treat as a corner.
                None => position,
            }
        } else {
            let n = incident_edges.len() as f64;
            let mut face_avg = DVector::zeros();
            for &f in incident_faces {
                face_avg += face_points[f as usize].coords;
            }
            face_avg /= incident_faces.len() as f64;
            let mut mid_avg = DVector::zeros();
            for &e in incident_edges {
                let edge = &mesh.edges[e as usize];
                mid_avg += (mesh.positions[edge.verts[0] as usize].coords
                    + mesh.positions[edge.verts[1] as usize].coords)
                    / 2.0;
            }
            mid_avg /= incident_edges.len() as f64;
            let smooth =
                DPoint::from((face_avg + 2.0 * mid_avg + (n - 3.0) * position.coords) / n);

            let sharp_edges: Vec<u32> = incident_edges
                .iter()
                .copied()
                .filter(|&e| mesh.edges[e as usize].sharpness > 0.0)
                .collect();
            match sharp_edges.len() {
                0 | 1 => smooth,
                2 => {
                    let far = |e: u32| {
                        let edge = &mesh.edges[e as usize];
                        let w = if edge.verts[0] == v {
                            edge.verts[1]
                        } else {
                            edge.verts[0]
                        };
                        mesh.positions[w as usize].coords
                    };
                    let crease = DPoint::from(
                        (far(sharp_edges[0]) + 6.0 * position.coords + far(sharp_edges[1]))
                            / 8.0,
                    );
                    let avg: f64 = sharp_edges
                        .iter()
                        .map(|&e| mesh.edges[e as usize].sharpness)
                        .sum::<f64>()
                        / 2.0;
                    DPoint::from(smooth.coords.lerp(&crease.coords, avg.clamp(0.0, 1.0)))
                }
                _ => {
                    let avg: f64 = sharp_edges
                        .iter()
                        .map(|&e| mesh.edges[e as usize].sharpness)
                        .sum::<f64>()
                        / sharp_edges.len() as f64;
                    DPoint::from(smooth.coords.lerp(&position.coords, avg.clamp(0.0, 1.0)))
                }
            }
        };
        vertex_points.push(point);
    }

    // Child vertex layout: [face points | edge points | vertex points].
    let fp_base = 0u32;
    let ep_base = face_count as u32;
    let vp_base = (face_count + edge_count) as u32;
    let mut positions = Vec::with_capacity(face_count + edge_count + vertex_count);
    positions.extend(face_points);
    positions.extend(edge_points);
    positions.extend(vertex_points);

    // Child faces: for parent corner k, [vp(v_k), ep(e_k), fp(f), ep(e_k-1)].
    let mut faces = Vec::new();
    let mut children = Vec::with_capacity(face_count);
    for (f, verts) in mesh.faces.iter().enumerate() {
        let n = verts.len();
        let mut child_ids = Vec::with_capacity(n);
        for k in 0..n {
            let v = verts[k];
            let e_k = mesh
                .edge_between(v, verts[(k + 1) % n])
                .expect("face edge must exist");
            let e_prev = mesh
                .edge_between(verts[(k + n - 1) % n], v)
                .expect("face edge must exist");
            child_ids.push(faces.len() as u32);
            faces.push(vec![
                vp_base + v,
                ep_base + e_k,
                fp_base + f as u32,
                ep_base + e_prev,
            ]);
        }
        children.push(child_ids);
    }

    // Child sharpness: a parent edge splits into two children keyed by
    // (edge point, vertex point); sharpness decays by one. Hard
    // boundary propagates structurally through the same keys.
    let mut child_sharpness: HashMap<EdgeKey, f64> = HashMap::new();
    let mut child_boundary: HashMap<EdgeKey, bool> = HashMap::new();
    for (e, edge) in mesh.edges.iter().enumerate() {
        for &v in &edge.verts {
            let key = EdgeKey::new(ep_base + e as u32, vp_base + v);
            if edge.sharpness > 0.0 {
                child_sharpness.insert(key, (edge.sharpness - 1.0).max(0.0));
            }
            if edge.hard_boundary {
                child_boundary.insert(key, true);
            }
        }
    }

    let mesh = SubdMesh::build(
        positions,
        faces,
        |key| child_sharpness.get(&key).copied().unwrap_or(0.0),
        Some(&child_boundary),
    )?;

    Ok(RefineStep {
        mesh,
        children,
        vertex_children: (0..vertex_count as u32).map(|v| vp_base + v).collect(),
    })
}

/// Two Catmull-Clark steps: the first turns every face into quads, the
/// second isolates extraordinary vertices so each quad touches at most
/// one irregular corner.
pub(crate) struct RefinedTopology {
    pub level1: RefineStep,
    pub level2: RefineStep,
}

/// One-shot wrapper around topology refinement.
///
/// The refiner consumes its base mesh on the first call; the evaluator
/// keeps the resulting patch representation and re-tessellates from it
/// at any level. Attempting to refine again is a state error, never
/// silent corruption.
pub(crate) struct TopologyRefiner {
    base: Option<SubdMesh>,
}

impl TopologyRefiner {
    pub fn new(base: SubdMesh) -> Self {
        Self { base: Some(base) }
    }

    pub fn refine(&mut self) -> Result<RefinedTopology, EvalError> {
        let base = self.base.take().ok_or(EvalError::AlreadyRefined)?;
        let level1 = catmull_clark_step(&base)?;
        let level2 = catmull_clark_step(&level1.mesh)?;
        Ok(RefinedTopology { level1, level2 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_types::{ControlCage, Point};

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
    fn cube_step_counts() {
        let base = SubdMesh::from_cage(&cube_cage()).unwrap();
        let step = catmull_clark_step(&base).unwrap();
        // 6 face points + 12 edge points + 8 vertex points.
        assert_eq!(step.mesh.vertex_count(), 26);
        assert_eq!(step.mesh.face_count(), 24);
        assert!(step.mesh.faces.iter().all(|f| f.len() == 4));
    }

    #[test]
    fn cube_step_shrinks_towards_centroid() {
        let base = SubdMesh::from_cage(&cube_cage()).unwrap();
        let step = catmull_clark_step(&base).unwrap();
        // Subdivided cube vertices pull strictly inside the unit cube.
        for (i, p) in step.mesh.positions.iter().enumerate() {
            // Skip face points which sit on the original faces.
            if i >= 6 {
                assert!(p.x > -1e-12 && p.x < 1.0 + 1e-12);
            }
        }
        // A vertex point of a cube corner moves off the corner.
        let corner_child = step.vertex_children[0] as usize;
        let p = step.mesh.positions[corner_child];
        assert!(p.coords.norm() > 1e-3, "corner vertex must move inward");
        assert!(
            (p.x - p.y).abs() < 1e-12 && (p.y - p.z).abs() < 1e-12,
            "cube symmetry preserved at corner"
        );
    }

    #[test]
    fn refiner_is_one_shot() {
        let base = SubdMesh::from_cage(&cube_cage()).unwrap();
        let mut refiner = TopologyRefiner::new(base);
        assert!(refiner.refine().is_ok());
        assert!(matches!(refiner.refine(), Err(EvalError::AlreadyRefined)));
    }

    #[test]
    fn planar_quad_boundary_rules_keep_plane_and_corners() {
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
        let base = SubdMesh::from_cage(&cage).unwrap();
        let step = catmull_clark_step(&base).unwrap();
        for p in &step.mesh.positions {
            assert!(p.z.abs() < 1e-15, "planar cage stays planar");
        }
        // Corner vertices are interpolated.
        let c0 = step.mesh.positions[step.vertex_children[0] as usize];
        assert!(c0.coords.norm() < 1e-15);
    }

    #[test]
    fn semi_sharp_crease_decays() {
        let cage = ControlCage::new(
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
            vec![(EdgeKey::new(0, 1), 2.0)],
        )
        .unwrap();
        let base = SubdMesh::from_cage(&cage).unwrap();
        let step = catmull_clark_step(&base).unwrap();
        let creased: Vec<f64> = step
            .mesh
            .edges
            .iter()
            .filter(|e| e.sharpness > 0.0)
            .map(|e| e.sharpness)
            .collect();
        assert_eq!(creased.len(), 2, "crease splits into two children");
        assert!(creased.iter().all(|&s| (s - 1.0).abs() < 1e-12));
    }
}
