//! Wire formats at the kernel boundary: control-cage ingest, mold-set
//! export, and session region round-trips. The kernel consumes and
//! produces these structures in memory; transport above them is
//! pluggable.

pub mod errors;
pub mod export;
pub mod ingest;
pub mod session;

pub use errors::WireError;
pub use export::{
    export_mold_set, mold_set_to_json, parse_mold_set, validate_nurbs_data, MoldEntry,
    MoldSetFile, MOLD_SET_TYPE, MOLD_SET_VERSION,
};
pub use ingest::{
    cage_from_payload, parse_control_cage, CagePayload, IngestOptions, CAGE_PAYLOAD_TYPE,
    CAGE_PAYLOAD_VERSION,
};
pub use session::{regions_from_json, regions_to_json, RegionSetFile};
