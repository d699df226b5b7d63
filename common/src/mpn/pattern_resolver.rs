use crate::mpn::detection::Detection;
use crate::mpn::pattern_key::{PatternKey, SLOT_COUNT};
use crate::mpn::reference_table::{ReferenceEntry, ReferenceTable, TableError};
use serde::{Deserialize, Serialize};

/// Detector label that marks a positive tube. Matched exactly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PositiveLabel(String);

impl PositiveLabel {
    pub fn new<T: Into<String>>(label: T) -> Self {
        Self(label.into())
    }

    pub fn matches(&self, detection: &Detection) -> bool {
        detection.label == self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PositiveLabel {
    fn default() -> Self {
        Self::new("Positive")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub ordered: Vec<Detection>,
    pub tubes: [u8; SLOT_COUNT],
    pub pattern: PatternKey,
    pub entry: ReferenceEntry,
    pub positives: usize,
}

#[derive(Debug, Clone)]
pub struct PatternResolver<'a> {
    table: &'a ReferenceTable,
    positive_label: PositiveLabel,
}

impl<'a> PatternResolver<'a> {
    pub fn new(table: &'a ReferenceTable, positive_label: PositiveLabel) -> Self {
        Self { table, positive_label }
    }

    pub fn positive_label(&self) -> &PositiveLabel {
        &self.positive_label
    }

    pub fn resolve(&self, detections: Vec<Detection>) -> Result<Resolution, TableError> {
        let ordered = order_detections(detections);
        let tubes = tube_calls(&ordered, &self.positive_label);
        let pattern = PatternKey::from_slots(&tubes);
        let entry = *self.table.resolve(pattern)?;
        Ok(Resolution {
            ordered,
            tubes,
            pattern,
            entry,
            positives: pattern.positives(),
        })
    }
}

/// Stable left-to-right order; ties keep detector order.
pub fn order_detections(mut detections: Vec<Detection>) -> Vec<Detection> {
    detections.sort_by(|a, b| a.bbox.left().total_cmp(&b.bbox.left()));
    detections
}

/// First nine ordered detections fill the slots, missing tubes read negative.
pub fn tube_calls(ordered: &[Detection], positive_label: &PositiveLabel) -> [u8; SLOT_COUNT] {
    let mut tubes = [0_u8; SLOT_COUNT];
    for (slot, detection) in tubes.iter_mut().zip(ordered) {
        *slot = positive_label.matches(detection) as u8;
    }
    tubes
}
