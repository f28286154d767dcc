//! Draft transformation of a fitted surface's control net.

use cast_types::{DPoint, DVector, FittedNurbs};

use crate::error::MoldError;

/// Control points closer than this to the parting plane or axis stay
/// put.
const DRAFT_EPSILON: f64 = 1e-9;

/// Apply draft to a fitted surface.
///
/// The parting plane passes through the first parting-line point with
/// normal along the demolding direction. Each control point splits into
/// a signed height `h` along the pull and an in-plane remainder `r`;
/// the point moves by `sign(h) · |h| · tan(θ)` along `r̂`: outward above
/// the parting plane, inward below it, a single conical taper that
/// releases monotonically along the pull. Degrees, knots, and weights
/// are untouched; draft is a control-net deformation.
pub fn apply_draft(
    surface: &FittedNurbs,
    direction: &DVector,
    angle_deg: f64,
    parting_line: &[DPoint],
) -> Result<FittedNurbs, MoldError> {
    if !(0.0..=45.0).contains(&angle_deg) || angle_deg == 0.0 {
        return Err(MoldError::InvalidDraftAngle { angle_deg });
    }
    if surface.control_points.is_empty() {
        return Err(MoldError::NullSurface);
    }
    let origin = parting_line.first().ok_or(MoldError::NullSurface)?;
    let norm = direction.norm();
    if norm < 1e-12 {
        return Err(MoldError::NullSurface);
    }
    let d = direction / norm;
    let tan = angle_deg.to_radians().tan();

    let mut drafted = surface.clone();
    for p in drafted.control_points.iter_mut() {
        let offset = DVector::new(p[0] - origin.x, p[1] - origin.y, p[2] - origin.z);
        let h = offset.dot(&d);
        let radial = offset - d * h;
        let r = radial.norm();
        if h.abs() <= DRAFT_EPSILON || r <= DRAFT_EPSILON {
            continue;
        }
        let shift = radial / r * (h * tan);
        p[0] += shift.x;
        p[1] += shift.y;
        p[2] += shift.z;
    }
    Ok(drafted)
}
