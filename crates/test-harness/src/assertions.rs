//! Assertion helpers with diagnostic output: every failure names the
//! context and the offending values.

use cast_types::{ParametricRegion, Point, TessellationResult};

/// Assert two points agree within `tol`, with context on failure.
pub fn assert_point_near(actual: &Point, expected: &Point, tol: f32, ctx: &str) {
    let distance = (actual - expected).norm();
    assert!(
        distance <= tol,
        "[{ctx}] expected {expected:?}, got {actual:?} (distance {distance}, tol {tol})"
    );
}

/// Assert all normals of a tessellation are unit length within `tol`.
pub fn assert_unit_normals(mesh: &TessellationResult, tol: f32, ctx: &str) {
    for (i, n) in mesh.normals.iter().enumerate() {
        let len = n.norm();
        assert!(
            (len - 1.0).abs() <= tol,
            "[{ctx}] normal {i} has length {len}"
        );
    }
}

/// Assert structural consistency: index ranges, parallel lengths, valid
/// parent faces.
pub fn assert_tessellation_consistent(mesh: &TessellationResult, face_count: u32, ctx: &str) {
    assert!(mesh.is_consistent(), "[{ctx}] inconsistent tessellation");
    for (t, &f) in mesh.parent_face.iter().enumerate() {
        assert!(
            f < face_count,
            "[{ctx}] triangle {t} claims parent face {f} of {face_count}"
        );
    }
}

/// Assert a set of regions covers each of `0..face_count` exactly once.
pub fn assert_region_partition(regions: &[ParametricRegion], face_count: u32, ctx: &str) {
    let mut seen = vec![false; face_count as usize];
    for region in regions {
        for &f in &region.faces {
            assert!(
                (f as usize) < seen.len(),
                "[{ctx}] region {} has out-of-range face {f}",
                region.id
            );
            assert!(
                !seen[f as usize],
                "[{ctx}] face {f} appears in more than one region"
            );
            seen[f as usize] = true;
        }
    }
    for (f, &covered) in seen.iter().enumerate() {
        assert!(covered, "[{ctx}] face {f} not covered by any region");
    }
}
