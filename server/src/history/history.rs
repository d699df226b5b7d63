use chrono::{DateTime, Local};
use common::mpn::detection::Detection;
use common::mpn::measurement::Measurement;
use common::mpn::mpn_value::{CiBound, MpnValue};
use common::mpn::pattern_key::{PatternKey, SLOT_COUNT};
use common::mpn::risk::RiskLevel;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Record {0} not found")]
    NotFound(i64),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("{0}")]
    File(String),
    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
    #[error("Schema migration failed: {0}")]
    Migration(String),
    #[error("History worker stopped")]
    WorkerGone,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: i64,
    pub created_at: DateTime<Local>,
    pub filename: String,
    pub total_tubes: usize,
    pub pattern: PatternKey,
    pub mpn: MpnValue,
    pub ci_low: CiBound,
    pub ci_high: CiBound,
    pub risk: RiskLevel,
    pub tubes: [u8; SLOT_COUNT],
    pub detections: Vec<Detection>,
    #[serde(skip)]
    pub image_path: Option<PathBuf>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub records: Vec<HistoryRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Persistence collaborator for finished measurements.
pub trait History: Send + Sync {
    fn save(&self, filename: String, measurement: Measurement, image: Vec<u8>) -> BoxFuture<'_, Result<i64, HistoryError>>;

    /// Newest first, with the total record count.
    fn list(&self, limit: usize, offset: usize) -> BoxFuture<'_, Result<(Vec<HistoryRecord>, usize), HistoryError>>;

    fn get(&self, id: i64) -> BoxFuture<'_, Result<HistoryRecord, HistoryError>>;

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<(), HistoryError>>;

    fn export_all(&self) -> BoxFuture<'_, Result<Vec<u8>, HistoryError>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Mutex;

    /// Keeps records in memory, or fails every call when `broken`.
    #[derive(Default)]
    pub(crate) struct MemoryHistory {
        pub(crate) broken: bool,
        pub(crate) saved: Mutex<Vec<(String, Measurement, Vec<u8>)>>,
    }

    impl MemoryHistory {
        pub(crate) fn broken() -> Self {
            Self {
                broken: true,
                saved: Mutex::new(Vec::new()),
            }
        }
    }

    impl History for MemoryHistory {
        fn save(&self, filename: String, measurement: Measurement, image: Vec<u8>) -> BoxFuture<'_, Result<i64, HistoryError>> {
            let result = if self.broken {
                Err(HistoryError::WorkerGone)
            } else {
                let mut saved = self.saved.lock().unwrap();
                saved.push((filename, measurement, image));
                Ok(saved.len() as i64)
            };
            async move { result }.boxed()
        }

        fn list(&self, _limit: usize, _offset: usize) -> BoxFuture<'_, Result<(Vec<HistoryRecord>, usize), HistoryError>> {
            let result = if self.broken { Err(HistoryError::WorkerGone) } else { Ok((Vec::new(), 0)) };
            async move { result }.boxed()
        }

        fn get(&self, id: i64) -> BoxFuture<'_, Result<HistoryRecord, HistoryError>> {
            let err = if self.broken { HistoryError::WorkerGone } else { HistoryError::NotFound(id) };
            async move { Err(err) }.boxed()
        }

        fn delete(&self, id: i64) -> BoxFuture<'_, Result<(), HistoryError>> {
            let err = if self.broken { HistoryError::WorkerGone } else { HistoryError::NotFound(id) };
            async move { Err(err) }.boxed()
        }

        fn export_all(&self) -> BoxFuture<'_, Result<Vec<u8>, HistoryError>> {
            let result = if self.broken { Err(HistoryError::WorkerGone) } else { Ok(b"id\r\n".to_vec()) };
            async move { result }.boxed()
        }
    }
}
