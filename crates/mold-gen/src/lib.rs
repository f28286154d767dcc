//! NURBS mold synthesis: sample the exact limit surface, fit a
//! B-spline, apply draft, extrude to a solid, fuse registration keys,
//! and hand finished pieces to CAM as STEP.

pub mod basis;
pub mod draft;
pub mod error;
pub mod fit;
pub mod keys;
pub mod solid;
pub mod step;

pub use basis::{surface_point, surface_point_with_derivatives};
pub use draft::apply_draft;
pub use error::MoldError;
pub use fit::{ensure_tolerance, fit_region, measure_quality, FitConfig};
pub use keys::{add_registration_keys, KeyConfig};
pub use solid::{build_face, create_mold_solid, tessellate_mold, to_truck_surface, MoldSolid};
pub use step::export_step;
