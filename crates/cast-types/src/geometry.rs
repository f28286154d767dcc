//! Scalar geometry aliases shared across the kernel.
//!
//! Public surface data (cage vertices, tessellation buffers, normals) is
//! single precision; evaluation and fitting upcast to f64 internally.

use nalgebra::{Point3, Vector3};

/// A position in 3D space.
pub type Point = Point3<f32>;

/// A displacement or direction in 3D space. Semantically distinct from
/// [`Point`]; nalgebra keeps the two from mixing.
pub type Vector = Vector3<f32>;

/// Double-precision position used inside evaluators and fitters.
pub type DPoint = Point3<f64>;

/// Double-precision vector used inside evaluators and fitters.
pub type DVector = Vector3<f64>;

/// Lift a public point to evaluation precision.
pub fn to_dpoint(p: &Point) -> DPoint {
    DPoint::new(p.x as f64, p.y as f64, p.z as f64)
}

/// Drop an evaluation-precision point back to the public representation.
pub fn to_point(p: &DPoint) -> Point {
    Point::new(p.x as f32, p.y as f32, p.z as f32)
}

/// Drop an evaluation-precision vector back to the public representation.
pub fn to_vector(v: &DVector) -> Vector {
    Vector::new(v.x as f32, v.y as f32, v.z as f32)
}
