//! Serial-dilution measurement domain: turns the detections of one frame
//! into a most-probable-number estimate.
//!
//! The rack layout is three dilution groups of three replicate tubes. Groups
//! are read left to right in the camera frame; group 0 holds the 0.1 g
//! inoculum, group 1 the 0.01 g inoculum and group 2 the 0.001 g inoculum.

pub mod detection;
pub mod measurement;
pub mod mpn_value;
pub mod pattern_key;
pub mod pattern_resolver;
pub mod reference_table;
pub mod risk;

pub use detection::{BoundingBox, Detection};
pub use measurement::{Measurement, MeasurementAssembler};
pub use mpn_value::{CiBound, MpnValue};
pub use pattern_key::{PatternKey, GROUP_COUNT, REPLICATES, SLOT_COUNT};
pub use pattern_resolver::{PatternResolver, PositiveLabel, Resolution};
pub use reference_table::{EntrySource, ReferenceEntry, ReferenceTable, TableError};
pub use risk::RiskLevel;
