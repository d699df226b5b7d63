use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeasurementEntry {
    #[error("Rejected input: {0}")]
    InvalidInput(String),
    #[error("Detector failure: {0}")]
    UpstreamFailure(String),
    #[error("Internal consistency failure: {0}")]
    InternalFailure(String),
    #[error("Measurement {pattern} resolved from {tubes} tubes")]
    Resolved { pattern: String, tubes: usize },
}

impl From<MeasurementEntry> for String {
    #[inline(always)]
    fn from(value: MeasurementEntry) -> Self {
        value.to_string()
    }
}
