//! Historical alert log
//!
//! An append-only store of alert occurrences. With [`HistoryMode::EverySweep`]
//! an alert that stays active is appended again on every sweep, so the log
//! doubles as a heartbeat of the alert itself. Consumers that want one row
//! per outage must deduplicate, or run with [`HistoryMode::Transitions`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::state::{AlertCache, AlertRecord};
use crate::NetwatchError;

/// Which records of a recomputed alert cache get persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Every record of every sweep
    #[default]
    EverySweep,
    /// Only records whose label was absent from the previous cache
    Transitions,
}

/// Select the records of `current` to append under `mode`
pub fn records_to_persist(
    mode: HistoryMode,
    previous: &AlertCache,
    current: &AlertCache,
) -> Vec<AlertRecord> {
    match mode {
        HistoryMode::EverySweep => current.records.clone(),
        HistoryMode::Transitions => current
            .records
            .iter()
            .filter(|r| !previous.records.iter().any(|p| p.label == r.label))
            .cloned()
            .collect(),
    }
}

/// Durable store for alert occurrences
#[async_trait]
pub trait AlertLog: Send + Sync {
    /// Append records in order. A failed append is not retried.
    async fn append(&self, records: &[AlertRecord]) -> crate::Result<()>;

    /// The `limit` most recent records, newest first
    async fn list_recent(&self, limit: usize) -> crate::Result<Vec<AlertRecord>>;
}

/// Log that discards everything
#[derive(Debug, Default, Clone)]
pub struct NoopAlertLog;

#[async_trait]
impl AlertLog for NoopAlertLog {
    async fn append(&self, _records: &[AlertRecord]) -> crate::Result<()> {
        Ok(())
    }

    async fn list_recent(&self, _limit: usize) -> crate::Result<Vec<AlertRecord>> {
        Ok(Vec::new())
    }
}

/// In-process log, for embedding and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryAlertLog {
    records: Arc<Mutex<Vec<AlertRecord>>>,
}

impl MemoryAlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything appended so far, oldest first
    pub fn records(&self) -> Vec<AlertRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AlertLog for MemoryAlertLog {
    async fn append(&self, records: &[AlertRecord]) -> crate::Result<()> {
        self.records
            .lock()
            .map_err(|_| NetwatchError::History("memory log poisoned".to_string()))?
            .extend_from_slice(records);
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> crate::Result<Vec<AlertRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| NetwatchError::History("memory log poisoned".to_string()))?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

/// SQLite-backed log
pub struct SqliteAlertLog {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteAlertLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAlertLog")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteAlertLog {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> crate::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS historical (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                occurred_at_ms INTEGER NOT NULL
            )",
            [],
        )?;

        tracing::debug!("Opened alert history at {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_poisoned<T>(_: T) -> NetwatchError {
    NetwatchError::History("history connection poisoned".to_string())
}

fn join_failed(e: tokio::task::JoinError) -> NetwatchError {
    NetwatchError::History(format!("history task failed: {}", e))
}

#[async_trait]
impl AlertLog for SqliteAlertLog {
    async fn append(&self, records: &[AlertRecord]) -> crate::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let conn = Arc::clone(&self.conn);
        let records = records.to_vec();

        tokio::task::spawn_blocking(move || -> crate::Result<()> {
            let mut conn = conn.lock().map_err(lock_poisoned)?;
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO historical (label, occurred_at_ms) VALUES (?1, ?2)")?;
                for record in &records {
                    stmt.execute(params![record.label, record.occurred_at.timestamp_millis()])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(join_failed)?
    }

    async fn list_recent(&self, limit: usize) -> crate::Result<Vec<AlertRecord>> {
        let conn = Arc::clone(&self.conn);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        tokio::task::spawn_blocking(move || -> crate::Result<Vec<AlertRecord>> {
            let conn = conn.lock().map_err(lock_poisoned)?;
            let mut stmt = conn.prepare(
                "SELECT label, occurred_at_ms FROM historical ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (label, ms) = row?;
                let occurred_at = DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
                    NetwatchError::History(format!("invalid timestamp {} for '{}'", ms, label))
                })?;
                records.push(AlertRecord { label, occurred_at });
            }
            Ok(records)
        })
        .await
        .map_err(join_failed)?
    }
}
