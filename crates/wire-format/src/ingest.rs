//! Bridge ingest: incoming control-cage payloads.

use cast_types::{ControlCage, EdgeKey, Point};
use serde::Deserialize;

use crate::errors::WireError;

/// Payload type tag the bridge accepts.
pub const CAGE_PAYLOAD_TYPE: &str = "subd_control_cage";
/// Wire format version the bridge speaks.
pub const CAGE_PAYLOAD_VERSION: &str = "1.0";

/// Raw cage payload as it arrives on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct CagePayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<Vec<u32>>,
    #[serde(default)]
    pub creases: Vec<(u32, u32, f32)>,
}

/// Ingest options.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Accept triangle-soup-shaped payloads as authoritative topology.
    pub authoritative_topology: bool,
    /// All-triangle payloads with more vertices than this look like a
    /// pre-tessellated mesh and are refused.
    pub triangle_soup_threshold: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            authoritative_topology: false,
            triangle_soup_threshold: 1000,
        }
    }
}

/// Parse and validate a cage payload into a [`ControlCage`].
///
/// The bridge refuses payloads whose shape suggests a display mesh
/// rather than a control cage: subdividing a tessellation produces
/// garbage silently, so the refusal is loud and opt-out.
pub fn parse_control_cage(json: &str, options: &IngestOptions) -> Result<ControlCage, WireError> {
    let payload: CagePayload =
        serde_json::from_str(json).map_err(|e| WireError::ParseError(e.to_string()))?;
    cage_from_payload(&payload, options)
}

/// The in-memory entry point; transport is pluggable above this.
pub fn cage_from_payload(
    payload: &CagePayload,
    options: &IngestOptions,
) -> Result<ControlCage, WireError> {
    if payload.kind != CAGE_PAYLOAD_TYPE {
        return Err(WireError::UnknownPayloadType(payload.kind.clone()));
    }
    if payload.version != CAGE_PAYLOAD_VERSION {
        return Err(WireError::UnsupportedVersion {
            found: payload.version.clone(),
            expected: CAGE_PAYLOAD_VERSION.to_string(),
        });
    }

    let all_triangles = !payload.faces.is_empty() && payload.faces.iter().all(|f| f.len() == 3);
    if all_triangles
        && payload.vertices.len() > options.triangle_soup_threshold
        && !options.authoritative_topology
    {
        return Err(WireError::LooksTessellated {
            vertices: payload.vertices.len(),
            faces: payload.faces.len(),
        });
    }

    let vertices = payload
        .vertices
        .iter()
        .map(|&[x, y, z]| Point::new(x, y, z))
        .collect();
    let creases = payload
        .creases
        .iter()
        .map(|&(a, b, sharpness)| (EdgeKey::new(a, b), sharpness))
        .collect();
    Ok(ControlCage::new(vertices, payload.faces.clone(), creases)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_payload() -> String {
        serde_json::json!({
            "type": "subd_control_cage",
            "version": "1.0",
            "vertices": [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            "faces": [[0, 1, 2, 3]],
            "creases": [[0, 1, 4.5]]
        })
        .to_string()
    }

    #[test]
    fn parses_quad_with_crease() {
        let cage = parse_control_cage(&quad_payload(), &IngestOptions::default()).unwrap();
        assert_eq!(cage.vertex_count(), 4);
        assert_eq!(cage.face_count(), 1);
        assert!((cage.sharpness(EdgeKey::new(1, 0)) - 4.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_wrong_type_and_version() {
        let mut payload: serde_json::Value = serde_json::from_str(&quad_payload()).unwrap();
        payload["type"] = "polygon_mesh".into();
        let err = parse_control_cage(&payload.to_string(), &IngestOptions::default());
        assert!(matches!(err, Err(WireError::UnknownPayloadType(_))));

        let mut payload: serde_json::Value = serde_json::from_str(&quad_payload()).unwrap();
        payload["version"] = "2.0".into();
        let err = parse_control_cage(&payload.to_string(), &IngestOptions::default());
        assert!(matches!(err, Err(WireError::UnsupportedVersion { .. })));
    }

    #[test]
    fn refuses_triangle_soup_unless_authoritative() {
        // A large all-triangle payload: shaped like a display mesh.
        let n = 1200usize;
        let vertices: Vec<[f32; 3]> = (0..n).map(|i| [i as f32, 0.0, 0.0]).collect();
        let faces: Vec<Vec<u32>> = (0..n - 2)
            .map(|i| vec![i as u32, (i + 1) as u32, (i + 2) as u32])
            .collect();
        let payload = serde_json::json!({
            "type": "subd_control_cage",
            "version": "1.0",
            "vertices": vertices,
            "faces": faces,
        })
        .to_string();

        let err = parse_control_cage(&payload, &IngestOptions::default());
        assert!(matches!(err, Err(WireError::LooksTessellated { .. })));

        // Explicitly authoritative: the same payload ingests (topology
        // validation still applies).
        let options = IngestOptions {
            authoritative_topology: true,
            ..Default::default()
        };
        assert!(parse_control_cage(&payload, &options).is_ok());
    }

    #[test]
    fn small_triangle_cages_pass_the_heuristic() {
        let payload = serde_json::json!({
            "type": "subd_control_cage",
            "version": "1.0",
            "vertices": [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0], [0.5, 0.5, 1.0]],
            "faces": [[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        })
        .to_string();
        assert!(parse_control_cage(&payload, &IngestOptions::default()).is_ok());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_control_cage("{not json", &IngestOptions::default());
        assert!(matches!(err, Err(WireError::ParseError(_))));
    }

    #[test]
    fn invalid_cage_payload_is_rejected() {
        let payload = serde_json::json!({
            "type": "subd_control_cage",
            "version": "1.0",
            "vertices": [[0.0, 0.0, 0.0]],
            "faces": [[0, 1, 2]],
        })
        .to_string();
        let err = parse_control_cage(&payload, &IngestOptions::default());
        assert!(matches!(err, Err(WireError::InvalidCage(_))));
    }
}
