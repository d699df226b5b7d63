use crate::mpn::detection::Detection;
use crate::mpn::mpn_value::{CiBound, MpnValue};
use crate::mpn::pattern_key::{PatternKey, SLOT_COUNT};
use crate::mpn::pattern_resolver::PatternResolver;
use crate::mpn::reference_table::TableError;
use crate::mpn::risk::RiskLevel;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Measurement {
    pub detections: Vec<Detection>,
    pub tubes: [u8; SLOT_COUNT],
    pub pattern: PatternKey,
    pub mpn: MpnValue,
    pub ci_low: CiBound,
    pub ci_high: CiBound,
    pub risk: RiskLevel,
    pub positives: usize,
    pub total_tubes: usize,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct MeasurementAssembler<'a> {
    resolver: PatternResolver<'a>,
}

impl<'a> MeasurementAssembler<'a> {
    pub fn new(resolver: PatternResolver<'a>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PatternResolver<'a> {
        &self.resolver
    }

    pub fn assemble(&self, detections: Vec<Detection>, timestamp: DateTime<Local>) -> Result<Measurement, TableError> {
        let total_tubes = detections.len();
        let resolution = self.resolver.resolve(detections)?;
        Ok(Measurement {
            detections: resolution.ordered,
            tubes: resolution.tubes,
            pattern: resolution.pattern,
            mpn: resolution.entry.mpn,
            ci_low: resolution.entry.ci_low,
            ci_high: resolution.entry.ci_high,
            risk: RiskLevel::classify(&resolution.entry.mpn),
            positives: resolution.positives,
            total_tubes,
            timestamp,
        })
    }
}
