use crate::history::export::export_csv;
use crate::history::history::{History, HistoryError, HistoryRecord};
use crate::history::migrations::run_migrations;
use crate::utils::config::Config;
use crate::utils::logging::*;
use chrono::{DateTime, Local};
use common::mpn::measurement::Measurement;
use futures::future::BoxFuture;
use futures::FutureExt;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::fs;
use tokio::sync::oneshot;
use uuid::Uuid;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct WorkerHandle {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.take() {
            let _ = self.sender.send(DbCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

const SELECT_COLUMNS: &str = "id, created_at, filename, total_tubes, pattern, mpn, ci_low, ci_high, risk, tubes, detections, image_path";

/// Column values exactly as stored.
struct StoredRow {
    id: i64,
    created_at: String,
    filename: String,
    total_tubes: i64,
    pattern: String,
    mpn: String,
    ci_low: String,
    ci_high: String,
    risk: String,
    tubes: String,
    detections: String,
    image_path: Option<String>,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            filename: row.get(2)?,
            total_tubes: row.get(3)?,
            pattern: row.get(4)?,
            mpn: row.get(5)?,
            ci_low: row.get(6)?,
            ci_high: row.get(7)?,
            risk: row.get(8)?,
            tubes: row.get(9)?,
            detections: row.get(10)?,
            image_path: row.get(11)?,
        })
    }
}

impl TryFrom<StoredRow> for HistoryRecord {
    type Error = HistoryError;

    fn try_from(row: StoredRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, reason: String| HistoryError::Corrupt(format!("record {} field {field}: {reason}", row.id));
        Ok(HistoryRecord {
            id: row.id,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|datetime| datetime.with_timezone(&Local))
                .map_err(|err| corrupt("created_at", err.to_string()))?,
            filename: row.filename.clone(),
            total_tubes: usize::try_from(row.total_tubes).map_err(|err| corrupt("total_tubes", err.to_string()))?,
            pattern: row.pattern.parse().map_err(|err: common::mpn::reference_table::TableError| corrupt("pattern", err.to_string()))?,
            mpn: row.mpn.parse().map_err(|err: common::mpn::reference_table::TableError| corrupt("mpn", err.to_string()))?,
            ci_low: row.ci_low.parse().map_err(|err: common::mpn::reference_table::TableError| corrupt("ci_low", err.to_string()))?,
            ci_high: row.ci_high.parse().map_err(|err: common::mpn::reference_table::TableError| corrupt("ci_high", err.to_string()))?,
            risk: row.risk.parse().map_err(|err: String| corrupt("risk", err))?,
            tubes: serde_json::from_str(&row.tubes).map_err(|err| corrupt("tubes", err.to_string()))?,
            detections: serde_json::from_str(&row.detections).map_err(|err| corrupt("detections", err.to_string()))?,
            image_path: row.image_path.as_ref().map(PathBuf::from),
        })
    }
}

/// SQLite-backed history. One worker thread owns the connection and runs
/// the closures submitted by async callers in order.
#[derive(Clone)]
pub struct SqliteHistory {
    worker: Arc<WorkerHandle>,
    results_folder: PathBuf,
    max_history: usize,
}

impl SqliteHistory {
    pub fn open(database_path: &Path, results_folder: &Path, max_history: usize) -> Result<Self, HistoryError> {
        for folder in [database_path.parent(), Some(results_folder)].into_iter().flatten() {
            if folder.as_os_str().is_empty() {
                continue;
            }
            std::fs::create_dir_all(folder).map_err(|err| HistoryError::File(IOEntry::CreateDirectoryError(folder.display(), err).to_string()))?;
        }
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), HistoryError>>();
        let path_for_thread = database_path.to_path_buf();
        let worker = thread::Builder::new()
            .name("history-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(HistoryError::Database(err)));
                        return;
                    }
                };
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    logging_console!(warning_entry!(HistoryEntry::WorkerFailure(format!("WAL unavailable: {err}"))));
                }
                if ready_tx.send(run_migrations(&mut conn)).is_err() {
                    return;
                }
                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }
            })
            .map_err(|err| HistoryError::File(err.to_string()))?;
        ready_rx.recv().map_err(|_| HistoryError::WorkerGone)??;
        Ok(Self {
            worker: Arc::new(WorkerHandle {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            results_folder: results_folder.to_path_buf(),
            max_history,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, HistoryError> {
        Self::open(Path::new(&config.database_path), Path::new(&config.results_folder), config.max_history)
    }

    async fn execute<F, T>(&self, task: F) -> Result<T, HistoryError>
    where
        F: FnOnce(&mut Connection) -> Result<T, HistoryError> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = DbCommand::Execute(Box::new(move |conn| {
            let _ = reply_tx.send(task(conn));
        }));
        self.worker.sender.send(command).map_err(|_| HistoryError::WorkerGone)?;
        reply_rx.await.map_err(|_| HistoryError::WorkerGone)?
    }

    /// Drops the oldest records beyond the retention limit, images included.
    pub async fn prune(&self) -> Result<usize, HistoryError> {
        let max_history = self.max_history;
        let stale = self.execute(move |conn| prune_rows(conn, max_history)).await?;
        let count = stale.len();
        Self::remove_images(stale).await;
        if count > 0 {
            logging_information!(HistoryEntry::Pruned(count, max_history));
        }
        Ok(count)
    }

    async fn remove_images(paths: Vec<String>) {
        for path in paths {
            let path = PathBuf::from(path);
            if let Err(err) = fs::remove_file(&path).await {
                logging_warning!(IOEntry::DeleteFileError(path.display(), err));
            }
        }
    }

    async fn save_record(&self, filename: String, measurement: Measurement, image: Vec<u8>) -> Result<i64, HistoryError> {
        let suffix = Uuid::new_v4().simple().to_string();
        let image_name = format!("{}_{}.jpg", measurement.timestamp.format("%Y%m%d_%H%M%S"), &suffix[..8]);
        let image_path = self.results_folder.join(image_name);
        fs::write(&image_path, &image)
            .await
            .map_err(|err| HistoryError::File(IOEntry::WriteFileError(image_path.display(), err).to_string()))?;

        let stored_path = image_path.to_string_lossy().to_string();
        let pattern = measurement.pattern.to_string();
        let tubes = serde_json::to_string(&measurement.tubes).map_err(|err| HistoryError::Corrupt(IOEntry::SerdeSerializeError(err).to_string()))?;
        let detections = serde_json::to_string(&measurement.detections).map_err(|err| HistoryError::Corrupt(IOEntry::SerdeSerializeError(err).to_string()))?;
        let row_pattern = pattern.clone();
        let max_history = self.max_history;
        let inserted = self
            .execute(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO predictions (created_at, filename, total_tubes, pattern, mpn, ci_low, ci_high, risk, tubes, detections, image_path)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        measurement.timestamp.to_rfc3339(),
                        filename,
                        measurement.total_tubes as i64,
                        row_pattern,
                        measurement.mpn.to_string(),
                        measurement.ci_low.to_string(),
                        measurement.ci_high.to_string(),
                        measurement.risk.to_string(),
                        tubes,
                        detections,
                        stored_path,
                    ],
                )?;
                let id = tx.last_insert_rowid();
                let stale = prune_rows(&tx, max_history)?;
                tx.commit()?;
                Ok((id, stale))
            })
            .await;
        let (id, stale) = match inserted {
            Ok(inserted) => inserted,
            Err(err) => {
                let _ = fs::remove_file(&image_path).await;
                return Err(err);
            }
        };
        logging_information!(HistoryEntry::RecordSaved { id, pattern });
        let pruned = stale.len();
        Self::remove_images(stale).await;
        if pruned > 0 {
            logging_information!(HistoryEntry::Pruned(pruned, max_history));
        }
        Ok(id)
    }

    async fn list_records(&self, limit: usize, offset: usize) -> Result<(Vec<HistoryRecord>, usize), HistoryError> {
        let rows = self
            .execute(move |conn| {
                let total: i64 = conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
                let mut statement = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM predictions ORDER BY id DESC LIMIT ?1 OFFSET ?2"))?;
                let rows = statement
                    .query_map(params![limit as i64, offset as i64], StoredRow::from_row)?
                    .collect::<rusqlite::Result<Vec<StoredRow>>>()?;
                Ok((rows, total))
            })
            .await?;
        let (rows, total) = rows;
        let records = rows.into_iter().map(HistoryRecord::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok((records, total.max(0) as usize))
    }

    async fn get_record(&self, id: i64) -> Result<HistoryRecord, HistoryError> {
        let row = self
            .execute(move |conn| {
                let row = conn
                    .query_row(&format!("SELECT {SELECT_COLUMNS} FROM predictions WHERE id = ?1"), params![id], StoredRow::from_row)
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.ok_or(HistoryError::NotFound(id)).and_then(HistoryRecord::try_from)
    }

    async fn delete_record(&self, id: i64) -> Result<(), HistoryError> {
        let image_path = self
            .execute(move |conn| {
                let image_path: Option<Option<String>> = conn
                    .query_row("SELECT image_path FROM predictions WHERE id = ?1", params![id], |row| row.get(0))
                    .optional()?;
                let image_path = image_path.ok_or(HistoryError::NotFound(id))?;
                conn.execute("DELETE FROM predictions WHERE id = ?1", params![id])?;
                Ok(image_path)
            })
            .await?;
        if let Some(image_path) = image_path {
            Self::remove_images(vec![image_path]).await;
        }
        logging_information!(HistoryEntry::RecordDeleted(id));
        Ok(())
    }

    async fn export_records(&self) -> Result<Vec<u8>, HistoryError> {
        let rows = self
            .execute(|conn| {
                let mut statement = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM predictions ORDER BY id DESC"))?;
                let rows = statement.query_map([], StoredRow::from_row)?.collect::<rusqlite::Result<Vec<StoredRow>>>()?;
                Ok(rows)
            })
            .await?;
        let records = rows.into_iter().map(HistoryRecord::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(export_csv(&records))
    }
}

/// Deletes rows beyond `max_history`, newest kept. Returns their image paths.
fn prune_rows(conn: &Connection, max_history: usize) -> Result<Vec<String>, HistoryError> {
    let mut statement = conn.prepare("SELECT id, image_path FROM predictions ORDER BY id DESC LIMIT -1 OFFSET ?1")?;
    let stale = statement
        .query_map(params![max_history as i64], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)))?
        .collect::<rusqlite::Result<Vec<(i64, Option<String>)>>>()?;
    for (id, _) in &stale {
        conn.execute("DELETE FROM predictions WHERE id = ?1", params![id])?;
    }
    Ok(stale.into_iter().filter_map(|(_, image_path)| image_path).collect())
}

impl History for SqliteHistory {
    fn save(&self, filename: String, measurement: Measurement, image: Vec<u8>) -> BoxFuture<'_, Result<i64, HistoryError>> {
        self.save_record(filename, measurement, image).boxed()
    }

    fn list(&self, limit: usize, offset: usize) -> BoxFuture<'_, Result<(Vec<HistoryRecord>, usize), HistoryError>> {
        self.list_records(limit, offset).boxed()
    }

    fn get(&self, id: i64) -> BoxFuture<'_, Result<HistoryRecord, HistoryError>> {
        self.get_record(id).boxed()
    }

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<(), HistoryError>> {
        self.delete_record(id).boxed()
    }

    fn export_all(&self) -> BoxFuture<'_, Result<Vec<u8>, HistoryError>> {
        self.export_records().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::mpn::detection::{BoundingBox, Detection};
    use common::mpn::measurement::MeasurementAssembler;
    use common::mpn::pattern_resolver::{PatternResolver, PositiveLabel};
    use common::mpn::reference_table::ReferenceTable;
    use tempfile::TempDir;

    fn store(dir: &TempDir, max_history: usize) -> SqliteHistory {
        SqliteHistory::open(&dir.path().join("db").join("history.db"), &dir.path().join("results"), max_history).unwrap()
    }

    fn measurement(positives: usize) -> Measurement {
        let detections = (0..9)
            .map(|index| {
                let label = if index < positives { "Positive" } else { "Negative" };
                Detection::new(label, 0.7, BoundingBox::new(index as f32 * 10.0, 0.0, 8.0, 20.0))
            })
            .collect();
        let assembler = MeasurementAssembler::new(PatternResolver::new(ReferenceTable::instance(), PositiveLabel::default()));
        assembler.assemble(detections, Local::now()).unwrap()
    }

    #[tokio::test]
    async fn saved_record_reads_back() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 10);
        let measured = measurement(4);
        let id = history.save("rack.jpg".to_string(), measured.clone(), vec![1, 2, 3]).await.unwrap();

        let record = history.get(id).await.unwrap();
        assert_eq!(record.filename, "rack.jpg");
        assert_eq!(record.pattern, measured.pattern);
        assert_eq!(record.mpn, measured.mpn);
        assert_eq!(record.ci_high, measured.ci_high);
        assert_eq!(record.risk, measured.risk);
        assert_eq!(record.tubes, measured.tubes);
        assert_eq!(record.detections, measured.detections);
        let image_path = record.image_path.unwrap();
        assert_eq!(std::fs::read(&image_path).unwrap(), vec![1, 2, 3]);
        assert!(image_path.file_name().unwrap().to_string_lossy().ends_with(".jpg"));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 10);
        let mut ids = Vec::new();
        for positives in 0..3 {
            ids.push(history.save(format!("{positives}.jpg"), measurement(positives), vec![0]).await.unwrap());
        }
        let (records, total) = history.list(2, 0).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(records.iter().map(|record| record.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);
        let (records, _) = history.list(2, 2).await.unwrap();
        assert_eq!(records[0].id, ids[0]);
    }

    #[tokio::test]
    async fn delete_removes_row_and_image() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 10);
        let id = history.save("a.jpg".to_string(), measurement(1), vec![9]).await.unwrap();
        let image_path = history.get(id).await.unwrap().image_path.unwrap();
        history.delete(id).await.unwrap();
        assert!(matches!(history.get(id).await, Err(HistoryError::NotFound(_))));
        assert!(!image_path.exists());
        assert!(matches!(history.delete(id).await, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn oldest_records_beyond_the_limit_are_pruned() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 2);
        let first = history.save("first.jpg".to_string(), measurement(0), vec![0]).await.unwrap();
        let first_image = history.get(first).await.unwrap().image_path.unwrap();
        for _ in 0..2 {
            history.save("later.jpg".to_string(), measurement(5), vec![0]).await.unwrap();
        }
        let (records, total) = history.list(10, 0).await.unwrap();
        assert_eq!(total, 2);
        assert!(records.iter().all(|record| record.id != first));
        assert!(!first_image.exists());
    }

    #[tokio::test]
    async fn startup_prune_trims_a_larger_history() {
        let dir = TempDir::new().unwrap();
        {
            let history = store(&dir, 10);
            for _ in 0..4 {
                history.save("x.jpg".to_string(), measurement(2), vec![0]).await.unwrap();
            }
        }
        let history = store(&dir, 1);
        assert_eq!(history.prune().await.unwrap(), 3);
        assert_eq!(history.list(10, 0).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn export_has_header_and_quoted_tubes() {
        let dir = TempDir::new().unwrap();
        let history = store(&dir, 10);
        let id = history.save("rack, left.jpg".to_string(), measurement(9), vec![0]).await.unwrap();
        let csv = String::from_utf8(history.export_all().await.unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "id,created_at,filename,total_tubes,pattern,mpn_per_g,ci_low,ci_high,risk,tubes");
        let row = lines.next().unwrap();
        assert!(row.starts_with(&format!("{id},")));
        assert!(row.contains("\"rack, left.jpg\""));
        assert!(row.contains(",P333,>1100,420,-,High,\"[1,1,1,1,1,1,1,1,1]\""));
    }
}
