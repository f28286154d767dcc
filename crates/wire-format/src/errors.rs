use cast_types::{CageError, NurbsDataError};

/// Errors crossing the wire boundary in either direction.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("failed to parse payload: {0}")]
    ParseError(String),

    #[error("unknown payload type: {0}")]
    UnknownPayloadType(String),

    #[error("payload version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },

    #[error(
        "payload looks like a tessellated mesh ({vertices} vertices, all {faces} faces triangles); \
         pass authoritative_topology to ingest it as a control cage anyway"
    )]
    LooksTessellated { vertices: usize, faces: usize },

    #[error("invalid control cage: {0}")]
    InvalidCage(#[from] CageError),

    #[error("invalid NURBS data: {0}")]
    InvalidNurbsData(#[from] NurbsDataError),
}
