//! Session region round-trip.
//!
//! The kernel owns no persistent state; a session above it may
//! checkpoint its regions as JSON. The round-trip is lossless: face
//! sets, flags, strengths (bit-exact), and opaque lens metadata all
//! survive.

use cast_types::ParametricRegion;
use serde::{Deserialize, Serialize};

use crate::errors::WireError;

pub const SESSION_FORMAT: &str = "slipcast-regions";
pub const SESSION_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSetFile {
    pub format: String,
    pub version: u32,
    pub regions: Vec<ParametricRegion>,
}

pub fn regions_to_json(regions: &[ParametricRegion]) -> String {
    let file = RegionSetFile {
        format: SESSION_FORMAT.to_string(),
        version: SESSION_VERSION,
        regions: regions.to_vec(),
    };
    serde_json::to_string_pretty(&file).expect("region serialization cannot fail")
}

pub fn regions_from_json(json: &str) -> Result<Vec<ParametricRegion>, WireError> {
    let file: RegionSetFile =
        serde_json::from_str(json).map_err(|e| WireError::ParseError(e.to_string()))?;
    if file.format != SESSION_FORMAT {
        return Err(WireError::UnknownPayloadType(file.format));
    }
    if file.version > SESSION_VERSION {
        return Err(WireError::UnsupportedVersion {
            found: file.version.to_string(),
            expected: SESSION_VERSION.to_string(),
        });
    }
    Ok(file.regions)
}
