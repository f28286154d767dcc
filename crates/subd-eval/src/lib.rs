//! Exact Catmull-Clark limit-surface evaluation.
//!
//! The evaluator answers point, derivative, and tangent-frame queries
//! at arbitrary `(face, u, v)` parameters of a control cage's limit
//! surface, without accumulating error across queries: regular regions
//! evaluate as bicubic B-splines of the refined control net, irregular
//! regions by bounded local subdivision with vertex limit masks at the
//! extraordinary points themselves.

mod chart;
mod descent;
mod error;
mod mesh;
mod patch;
mod refine;
mod tessellate;

mod evaluator;

pub use error::EvalError;
pub use evaluator::{LimitDerivatives, LimitSecondDerivatives, SubdEvaluator, TangentFrame};
pub use tessellate::MAX_LEVEL;

#[cfg(test)]
mod tests {
    use super::*;
    use cast_types::{ControlCage, Point};

    pub(crate) fn unit_square_cage() -> ControlCage {
        ControlCage::new(
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
            vec![],
        )
        .unwrap()
    }

    pub(crate) fn unit_cube_cage() -> ControlCage {
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

    fn initialized(cage: &ControlCage) -> SubdEvaluator {
        let mut evaluator = SubdEvaluator::new();
        evaluator.initialize(cage).unwrap();
        evaluator
    }

    #[test]
    fn uninitialized_evaluator_reports_state_error() {
        let evaluator = SubdEvaluator::new();
        assert!(matches!(
            evaluator.evaluate_limit_point(0, 0.5, 0.5),
            Err(EvalError::NotInitialized)
        ));
    }

    #[test]
    fn initialize_twice_is_refused() {
        let cage = unit_square_cage();
        let mut evaluator = initialized(&cage);
        assert!(matches!(
            evaluator.initialize(&cage),
            Err(EvalError::AlreadyRefined)
        ));
    }

    #[test]
    fn rejects_bad_face_and_parameters() {
        let evaluator = initialized(&unit_square_cage());
        assert!(matches!(
            evaluator.evaluate_limit_point(7, 0.5, 0.5),
            Err(EvalError::InvalidFace { face: 7 })
        ));
        assert!(matches!(
            evaluator.evaluate_limit_point(0, 1.5, 0.5),
            Err(EvalError::ParameterOutOfRange { .. })
        ));
    }

    #[test]
    fn planar_quad_center_is_planar_with_vertical_normal() {
        let evaluator = initialized(&unit_square_cage());
        let (p, n) = evaluator.evaluate_limit(0, 0.5, 0.5).unwrap();
        assert!(p.z.abs() < 1e-5);
        assert!((p.x - 0.5).abs() < 1e-5 && (p.y - 0.5).abs() < 1e-5);
        assert!(n.z.abs() > 1.0 - 1e-5);
    }

    #[test]
    fn planar_quad_interpolates_corners() {
        let evaluator = initialized(&unit_square_cage());
        let p = evaluator.evaluate_limit_point(0, 0.0, 0.0).unwrap();
        assert!(p.coords.norm() < 1e-6);
        let p = evaluator.evaluate_limit_point(0, 1.0, 1.0).unwrap();
        assert!((p.x - 1.0).abs() < 1e-6 && (p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn evaluation_is_bit_stable() {
        let evaluator = initialized(&unit_cube_cage());
        for &(f, u, v) in &[(0u32, 0.5f32, 0.5f32), (3, 0.12, 0.93), (5, 0.0, 0.0)] {
            let a = evaluator.evaluate_limit_point(f, u, v).unwrap();
            let b = evaluator.evaluate_limit_point(f, u, v).unwrap();
            assert_eq!(a, b, "repeated evaluation must be identical");
        }
    }

    #[test]
    fn cube_face_centers_pull_strictly_inside() {
        let evaluator = initialized(&unit_cube_cage());
        for face in 0..6 {
            let p = evaluator.evaluate_limit_point(face, 0.5, 0.5).unwrap();
            for c in [p.x, p.y, p.z] {
                assert!(c > -1e-6 && c < 1.0 + 1e-6);
            }
            let inside = [p.x, p.y, p.z]
                .iter()
                .filter(|&&c| c > 1e-4 && c < 1.0 - 1e-4)
                .count();
            assert!(inside >= 1, "face center rounds inward: {p:?}");
        }
    }

    #[test]
    fn cube_corner_limit_matches_mask() {
        let evaluator = initialized(&unit_cube_cage());
        // Face 0 is [0, 3, 2, 1]; corner parameter (0,0) pins vertex 0.
        let p = evaluator.evaluate_limit_point(0, 0.0, 0.0).unwrap();
        for c in [p.x, p.y, p.z] {
            assert!((c - 0.25).abs() < 1e-5, "cube corner limit is (1/4,1/4,1/4)");
        }
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let evaluator = initialized(&unit_cube_cage());
        // Positions are f32 on the public surface; the step must stay
        // well above their rounding noise.
        let h = 1e-3f32;
        let (f, u, v) = (2u32, 0.37f32, 0.61f32);
        let d = evaluator.evaluate_limit_with_derivatives(f, u, v).unwrap();
        let p0 = evaluator.evaluate_limit_point(f, u, v).unwrap();
        let pu = evaluator.evaluate_limit_point(f, u + h, v).unwrap();
        let pv = evaluator.evaluate_limit_point(f, u, v + h).unwrap();
        let fd_u = (pu - p0) / h;
        let fd_v = (pv - p0) / h;
        assert!((d.du.x as f32 - fd_u.x).abs() < 1e-2);
        assert!((d.du.y as f32 - fd_u.y).abs() < 1e-2);
        assert!((d.dv.z as f32 - fd_v.z).abs() < 1e-2);
    }

    #[test]
    fn second_derivatives_of_plane_vanish() {
        let evaluator = initialized(&unit_square_cage());
        let d = evaluator
            .evaluate_limit_with_second_derivatives(0, 0.3, 0.7)
            .unwrap();
        assert!(d.duu.norm() < 1e-9);
        assert!(d.dvv.norm() < 1e-9);
        assert!(d.duv.norm() < 1e-9);
    }

    #[test]
    fn tangent_frame_is_orthonormal() {
        let evaluator = initialized(&unit_cube_cage());
        let frame = evaluator.compute_tangent_frame(4, 0.21, 0.78).unwrap();
        assert!((frame.t_u.norm() - 1.0).abs() < 1e-4);
        assert!((frame.t_v.norm() - 1.0).abs() < 1e-4);
        assert!((frame.normal.norm() - 1.0).abs() < 1e-4);
        assert!(frame.t_u.dot(&frame.t_v).abs() < 1e-4);
        assert!(frame.t_u.dot(&frame.normal).abs() < 1e-4);
    }

    #[test]
    fn cube_tessellation_level3_is_consistent_and_dense() {
        let evaluator = initialized(&unit_cube_cage());
        let mesh = evaluator.tessellate(3, false).unwrap();
        assert!(mesh.is_consistent());
        assert!(mesh.triangle_count() > 1000);
        for n in &mesh.normals {
            assert!((n.norm() - 1.0).abs() < 1e-4);
        }
        for &f in &mesh.parent_face {
            assert!(f < 6);
        }
    }

    #[test]
    fn tessellation_welds_shared_edges() {
        let evaluator = initialized(&unit_cube_cage());
        let mesh = evaluator.tessellate(1, false).unwrap();
        // Closed surface: V - E + F = 2. Count unique undirected edges.
        let mut edges = std::collections::HashSet::new();
        for t in &mesh.triangles {
            for k in 0..3 {
                let a = t[k].min(t[(k + 1) % 3]);
                let b = t[k].max(t[(k + 1) % 3]);
                edges.insert((a, b));
            }
        }
        let v = mesh.vertex_count() as i64;
        let e = edges.len() as i64;
        let f = mesh.triangle_count() as i64;
        assert_eq!(v - e + f, 2, "welded cube tessellation is a closed sphere");
    }

    #[test]
    fn batch_matches_single_evaluations() {
        let evaluator = initialized(&unit_cube_cage());
        let faces = [0u32, 1, 2, 3];
        let us = [0.25f32, 0.5, 0.75, 0.1];
        let vs = [0.5f32, 0.5, 0.25, 0.9];
        let batch = evaluator
            .batch_evaluate_limit(&faces, &us, &vs, None)
            .unwrap();
        for i in 0..4 {
            let (p, n) = evaluator.evaluate_limit(faces[i], us[i], vs[i]).unwrap();
            assert_eq!(batch.vertices[i], p);
            assert_eq!(batch.normals[i], n);
        }
    }

    #[test]
    fn batch_cancellation_returns_cancelled() {
        let evaluator = initialized(&unit_cube_cage());
        let token = cast_types::CancelToken::new();
        token.cancel();
        let result = evaluator.batch_evaluate_limit(&[0], &[0.5], &[0.5], Some(&token));
        assert!(matches!(result, Err(EvalError::Cancelled)));
    }

    #[test]
    fn triangle_face_evaluates_everywhere() {
        // A tetrahedron: four triangle faces.
        let cage = ControlCage::new(
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(0.5, 1.0, 0.0),
                Point::new(0.5, 0.5, 1.0),
            ],
            vec![
                vec![0, 2, 1],
                vec![0, 1, 3],
                vec![1, 2, 3],
                vec![2, 0, 3],
            ],
            vec![],
        )
        .unwrap();
        let mut evaluator = SubdEvaluator::new();
        evaluator.initialize(&cage).unwrap();
        for &(u, v) in &[(0.5, 0.5), (0.1, 0.1), (0.9, 0.2), (0.0, 0.0), (0.5, 0.999)] {
            let (p, n) = evaluator.evaluate_limit(0, u, v).unwrap();
            assert!(p.coords.norm() < 10.0);
            assert!((n.norm() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn creased_cube_stays_finite_and_stable() {
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
            vec![
                (cast_types::EdgeKey::new(4, 5), 10.0),
                (cast_types::EdgeKey::new(5, 6), 10.0),
                (cast_types::EdgeKey::new(6, 7), 10.0),
                (cast_types::EdgeKey::new(7, 4), 10.0),
            ],
        )
        .unwrap();
        let mut evaluator = SubdEvaluator::new();
        evaluator.initialize(&cage).unwrap();
        // Top face boundary hugs the sharp crease ring; evaluation near
        // the crease must stay finite and deterministic.
        let a = evaluator.evaluate_limit_point(1, 0.02, 0.02).unwrap();
        let b = evaluator.evaluate_limit_point(1, 0.02, 0.02).unwrap();
        assert_eq!(a, b);
        assert!(a.z > 0.5 && a.z <= 1.0 + 1e-5);
    }
}
