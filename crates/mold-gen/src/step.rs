//! STEP AP203 export of mold solids.

use truck_stepio::out::{CompleteStepDisplay, StepHeaderDescriptor, StepModels};

use crate::error::MoldError;
use crate::solid::MoldSolid;

/// Serialize a mold solid to a STEP string for hand-off to CAM.
pub fn export_step(mold: &MoldSolid, file_name: &str) -> Result<String, MoldError> {
    let compressed = mold.solid.compress();
    let models: StepModels<_, _, _> = std::iter::once(&compressed).collect();
    let header = StepHeaderDescriptor {
        file_name: file_name.to_string(),
        time_stamp: chrono::Utc::now().to_rfc3339(),
        authors: vec!["slipcast kernel".to_string()],
        organization: Vec::new(),
        organization_system: "truck".to_string(),
        authorization: String::new(),
    };
    let display = CompleteStepDisplay::new(models, header);
    let text = display.to_string();
    if text.is_empty() {
        return Err(MoldError::SolidConstructionFailed {
            reason: "STEP serialization produced no output".into(),
        });
    }
    Ok(text)
}
