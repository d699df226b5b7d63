use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryEntry {
    #[error("History database ready at {0}")]
    DatabaseReady(String),
    #[error("Saved record {id} with pattern {pattern}")]
    RecordSaved { id: i64, pattern: String },
    #[error("Deleted record {0}")]
    RecordDeleted(i64),
    #[error("Record {0} not found")]
    RecordNotFound(i64),
    #[error("Pruned {0} old record(s) to stay within {1}")]
    Pruned(usize, usize),
    #[error("Failed to persist measurement: {0}")]
    SaveFailed(String),
    #[error("History worker failure: {0}")]
    WorkerFailure(String),
}

impl From<HistoryEntry> for String {
    #[inline(always)]
    fn from(value: HistoryEntry) -> Self {
        value.to_string()
    }
}
