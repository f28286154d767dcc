//! The full kernel pipeline as one callable: ingest → evaluate → fit →
//! draft → solid → export. Integration suites drive this instead of
//! re-plumbing every stage.

use cast_types::{DPoint, DVector, FittingQuality, ParametricRegion};
use mold_gen::{FitConfig, MoldSolid};
use wire_format::{IngestOptions, MoldEntry, MoldSetFile};

use crate::helpers::HarnessError;

/// Everything the pipeline produced for one single-face region.
pub struct PipelineResult {
    pub quality: FittingQuality,
    pub mold: MoldSolid,
    pub export: MoldSetFile,
}

/// Run the whole pipeline for a single-face region of a cage payload.
///
/// Fits the region's face, drafts the fit by `draft_angle_deg` about a
/// parting point at the surface's first corner, extrudes to
/// `wall_thickness`, and packs the (undrafted and drafted) surfaces
/// into a mold-set envelope.
pub fn run_mold_pipeline(
    payload_json: &str,
    face: u32,
    direction: DVector,
    draft_angle_deg: f64,
    wall_thickness: f64,
    fit: &FitConfig,
) -> Result<PipelineResult, HarnessError> {
    let cage = wire_format::parse_control_cage(payload_json, &IngestOptions::default())?;
    let evaluator = crate::helpers::initialized_evaluator(&cage)?;
    let region = ParametricRegion::new(format!("face_{face}"), [face], "manual", 1.0);

    let surface = mold_gen::fit_region(&evaluator, &region, fit, None)?;
    let quality = mold_gen::measure_quality(&evaluator, &region, &surface, fit, None)?;
    mold_gen::ensure_tolerance(&quality)?;

    let corner = surface.control_point(0, 0);
    let drafted = mold_gen::apply_draft(
        &surface,
        &direction,
        draft_angle_deg,
        &[DPoint::new(corner[0], corner[1], corner[2])],
    )?;
    let mold = mold_gen::create_mold_solid(
        &drafted,
        &region.id,
        &direction,
        wall_thickness,
        Some(draft_angle_deg),
    )?;

    let mut metadata = serde_json::Map::new();
    metadata.insert("draft_angle".into(), serde_json::json!(draft_angle_deg));
    metadata.insert("wall_thickness".into(), serde_json::json!(wall_thickness));
    let export = wire_format::export_mold_set(
        vec![MoldEntry::from_fitted(
            &drafted,
            format!("mold_{}", region.id),
            region.id.clone(),
            draft_angle_deg,
        )],
        metadata,
    )?;

    Ok(PipelineResult {
        quality,
        mold,
        export,
    })
}
