//! Registration keys: cylindrical bosses fused onto a mold half so the
//! mating half indexes against it.

use std::f64::consts::PI;

use cast_types::{CancelToken, DPoint, DVector};
use truck_modeling::topology::Solid;
use truck_modeling::{builder, EuclideanSpace, InnerSpace, Point3, Rad, Vector3};

use crate::error::MoldError;
use crate::solid::{validate_solid, MoldSolid};

/// Key dimensions; defaults are 5 mm radius, 10 mm height.
#[derive(Debug, Clone, Copy)]
pub struct KeyConfig {
    pub radius: f64,
    pub height: f64,
    /// Tolerance handed to the boolean kernel.
    pub fuse_tolerance: f64,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            height: 10.0,
            fuse_tolerance: 0.05,
        }
    }
}

/// Cylinder along +z at the origin: circle wire, planar cap, sweep.
fn make_cylinder(radius: f64, height: f64) -> Result<Solid, MoldError> {
    let seed = builder::vertex(Point3::new(radius, 0.0, 0.0));
    let wire = builder::rsweep(&seed, Point3::origin(), Vector3::unit_z(), Rad(2.0 * PI));
    let cap = builder::try_attach_plane(&[wire]).map_err(|e| {
        MoldError::SolidConstructionFailed {
            reason: format!("key cap face: {e}"),
        }
    })?;
    Ok(builder::tsweep(&cap, Vector3::new(0.0, 0.0, height)))
}

/// A cylinder of `config` dimensions at `position`, axis along
/// `direction`.
fn make_key(
    position: &DPoint,
    direction: &DVector,
    config: &KeyConfig,
) -> Result<Solid, MoldError> {
    let cylinder = make_cylinder(config.radius, config.height)?;
    let d = direction.normalize();
    let z = Vector3::unit_z();
    let target = Vector3::new(d.x, d.y, d.z);

    // Rotate +z onto the demolding axis, then translate into place.
    let axis = z.cross(target);
    let dot = z.dot(target).clamp(-1.0, 1.0);
    let oriented = if axis.magnitude() < 1e-12 {
        if dot > 0.0 {
            cylinder
        } else {
            builder::rotated(&cylinder, Point3::origin(), Vector3::unit_x(), Rad(PI))
        }
    } else {
        builder::rotated(
            &cylinder,
            Point3::origin(),
            axis.normalize(),
            Rad(dot.acos()),
        )
    };
    Ok(builder::translated(
        &oriented,
        Vector3::new(position.x, position.y, position.z),
    ))
}

/// Fuse a key onto the mold at each position. Fusion failures are
/// reported with the failing position's index, never skipped.
pub fn add_registration_keys(
    mold: &MoldSolid,
    positions: &[DPoint],
    direction: &DVector,
    config: &KeyConfig,
    cancel: Option<&CancelToken>,
) -> Result<MoldSolid, MoldError> {
    if direction.norm() < 1e-12 {
        return Err(MoldError::NullSurface);
    }

    let mut solid = mold.solid.clone();
    for (index, position) in positions.iter().enumerate() {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(MoldError::Cancelled);
            }
        }
        let key = make_key(position, direction, config)?;
        solid = truck_shapeops::or(&solid, &key, config.fuse_tolerance).ok_or_else(|| {
            MoldError::BooleanOperationFailed {
                reason: format!("fusing registration key {index} at {position:?}"),
            }
        })?;
        validate_solid(&solid)?;
        tracing::debug!(index, "registration key fused");
    }

    Ok(MoldSolid {
        solid,
        region_id: mold.region_id.clone(),
        wall_thickness: mold.wall_thickness,
        draft_angle_deg: mold.draft_angle_deg,
    })
}
