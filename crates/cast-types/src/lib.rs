pub mod cage;
pub mod cancel;
pub mod constraint;
pub mod curvature;
pub mod geometry;
pub mod nurbs;
pub mod parametric;
pub mod spectral;
pub mod tessellation;

pub use cage::*;
pub use cancel::*;
pub use constraint::*;
pub use curvature::*;
pub use geometry::*;
pub use nurbs::*;
pub use parametric::*;
pub use spectral::*;
pub use tessellation::*;
