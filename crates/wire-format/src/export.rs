//! Outbound mold-set serialization.

use cast_types::FittedNurbs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::WireError;

/// Payload type tag for mold sets.
pub const MOLD_SET_TYPE: &str = "ceramic_mold_set";
/// Mold-set wire version.
pub const MOLD_SET_VERSION: &str = "1.0";

/// One fitted surface on the wire: flattened knots with multiplicities
/// expanded, row-major control points, parallel weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoldEntry {
    pub degree_u: usize,
    pub degree_v: usize,
    pub count_u: usize,
    pub count_v: usize,
    pub control_points: Vec<[f64; 3]>,
    pub weights: Vec<f64>,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
    pub name: String,
    pub region_id: String,
    pub draft_angle: f64,
}

impl MoldEntry {
    pub fn from_fitted(
        surface: &FittedNurbs,
        name: impl Into<String>,
        region_id: impl Into<String>,
        draft_angle: f64,
    ) -> Self {
        Self {
            degree_u: surface.degree_u,
            degree_v: surface.degree_v,
            count_u: surface.count_u,
            count_v: surface.count_v,
            control_points: surface.control_points.clone(),
            weights: surface.weights.clone(),
            knots_u: surface.knots_u.clone(),
            knots_v: surface.knots_v.clone(),
            name: name.into(),
            region_id: region_id.into(),
            draft_angle,
        }
    }

    pub fn to_fitted(&self) -> FittedNurbs {
        FittedNurbs {
            degree_u: self.degree_u,
            degree_v: self.degree_v,
            count_u: self.count_u,
            count_v: self.count_v,
            control_points: self.control_points.clone(),
            weights: self.weights.clone(),
            knots_u: self.knots_u.clone(),
            knots_v: self.knots_v.clone(),
        }
    }
}

/// The top-level mold-set envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoldSetFile {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub molds: Vec<MoldEntry>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Validate structural laws of NURBS wire data.
///
/// Every surface the serializer emits passes this; imported data is
/// held to the same rules.
pub fn validate_nurbs_data(entry: &MoldEntry) -> Result<(), WireError> {
    entry.to_fitted().validate()?;
    Ok(())
}

/// Assemble and validate a mold-set envelope.
pub fn export_mold_set(
    molds: Vec<MoldEntry>,
    metadata: serde_json::Map<String, serde_json::Value>,
) -> Result<MoldSetFile, WireError> {
    for entry in &molds {
        validate_nurbs_data(entry)?;
    }
    Ok(MoldSetFile {
        kind: MOLD_SET_TYPE.to_string(),
        version: MOLD_SET_VERSION.to_string(),
        molds,
        metadata,
        timestamp: Utc::now(),
    })
}

/// Serialize an envelope to the wire.
pub fn mold_set_to_json(file: &MoldSetFile) -> String {
    serde_json::to_string_pretty(file).expect("mold set serialization cannot fail")
}

/// Parse and validate an incoming mold-set envelope.
pub fn parse_mold_set(json: &str) -> Result<MoldSetFile, WireError> {
    let file: MoldSetFile =
        serde_json::from_str(json).map_err(|e| WireError::ParseError(e.to_string()))?;
    if file.kind != MOLD_SET_TYPE {
        return Err(WireError::UnknownPayloadType(file.kind));
    }
    if file.version != MOLD_SET_VERSION {
        return Err(WireError::UnsupportedVersion {
            found: file.version,
            expected: MOLD_SET_VERSION.to_string(),
        });
    }
    for entry in &file.molds {
        validate_nurbs_data(entry)?;
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_surface() -> FittedNurbs {
        FittedNurbs {
            degree_u: 3,
            degree_v: 3,
            count_u: 4,
            count_v: 4,
            control_points: (0..16).map(|k| [k as f64, (k * k) as f64, 0.5]).collect(),
            weights: vec![1.0; 16],
            knots_u: vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            knots_v: vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn export_then_parse_preserves_surfaces_exactly() {
        let surface = sample_surface();
        let entry = MoldEntry::from_fitted(&surface, "cavity", "region_3", 2.0);
        let mut metadata = serde_json::Map::new();
        metadata.insert("draft_angle".into(), serde_json::json!(2.0));
        metadata.insert("wall_thickness".into(), serde_json::json!(40.0));

        let file = export_mold_set(vec![entry], metadata).unwrap();
        let json = mold_set_to_json(&file);
        let parsed = parse_mold_set(&json).unwrap();

        assert_eq!(parsed.kind, "ceramic_mold_set");
        assert_eq!(parsed.molds.len(), 1);
        let back = parsed.molds[0].to_fitted();
        assert_eq!(back, surface);
        assert_eq!(parsed.molds[0].region_id, "region_3");
        assert_eq!(parsed.metadata["wall_thickness"], serde_json::json!(40.0));
    }

    #[test]
    fn knot_law_violations_are_refused_at_export() {
        let mut surface = sample_surface();
        surface.knots_u.push(1.0);
        let entry = MoldEntry::from_fitted(&surface, "bad", "r", 0.0);
        assert!(matches!(
            export_mold_set(vec![entry], serde_json::Map::new()),
            Err(WireError::InvalidNurbsData(_))
        ));
    }

    #[test]
    fn control_point_count_law_is_enforced_on_parse() {
        let surface = sample_surface();
        let entry = MoldEntry::from_fitted(&surface, "cavity", "r", 0.0);
        let file = export_mold_set(vec![entry], serde_json::Map::new()).unwrap();
        let mut json: serde_json::Value =
            serde_json::from_str(&mold_set_to_json(&file)).unwrap();
        json["molds"][0]["control_points"]
            .as_array_mut()
            .unwrap()
            .pop();
        assert!(matches!(
            parse_mold_set(&json.to_string()),
            Err(WireError::InvalidNurbsData(_))
        ));
    }

    #[test]
    fn timestamp_serializes_as_iso_8601() {
        let file = export_mold_set(vec![], serde_json::Map::new()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&mold_set_to_json(&file)).unwrap();
        let stamp = json["timestamp"].as_str().unwrap();
        assert!(stamp.contains('T') && (stamp.ends_with('Z') || stamp.contains('+')));
    }
}
