//! Differential and spectral analysis on the exact limit surface:
//! curvature, the Laplace-Beltrami operator and its spectrum, the
//! decomposition lenses, region algebra, and manufacturability
//! validation.

pub mod constraints;
pub mod curvature;
pub mod eigen;
pub mod error;
pub mod laplacian;
pub mod lens;
pub mod regions;

mod partition;

pub use constraints::{ConstraintThresholds, ConstraintValidator, ThicknessProbe};
pub use curvature::CurvatureAnalyzer;
pub use eigen::solve_smallest;
pub use error::AnalysisError;
pub use laplacian::{LaplaceOperator, LaplacianBuilder, LaplacianCheck};
pub use lens::{
    differential::{DifferentialConfig, DifferentialLens, FeatureLines},
    run_lens,
    spectral::{SpectralConfig, SpectralLens},
    LensKind,
};
pub use regions::{can_merge, merge, split, validate, FaceAreas};
