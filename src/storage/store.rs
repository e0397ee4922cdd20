//! Log Store - SQLite-backed append-only record table
//!
//! Records are inserted one at a time and read back newest first.
//! Timestamps are stored as microseconds since the epoch so that
//! ordering is numeric rather than textual.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::error::{StorageError, StorageResult};
use super::types::{LogRecord, NewLogRecord};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        level TEXT,
        message TEXT,
        metadata TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs (timestamp);
    CREATE INDEX IF NOT EXISTS idx_logs_level ON logs (level);
";

/// Durable store of log records
///
/// Shared between handlers behind an `Arc`; the connection itself is
/// serialized by an async mutex.
pub struct LogStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl LogStore {
    /// Create or open the store at `path`, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = Self::init(conn, Some(path))?;
        tracing::info!(path = ?store.path, "Log store opened");
        Ok(store)
    }

    /// Open a throwaway store that lives only in memory
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a record and return it with its assigned id
    pub async fn insert(&self, record: NewLogRecord) -> StorageResult<LogRecord> {
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT INTO logs (timestamp, level, message, metadata) VALUES (?, ?, ?, ?)",
            params![
                record.timestamp.timestamp_micros(),
                record.level,
                record.message,
                record.metadata,
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(record.into_record(id))
    }

    /// Most recent records, newest first
    pub async fn recent(&self, limit: u32) -> StorageResult<Vec<LogRecord>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare_cached(
            "SELECT id, timestamp, level, message, metadata FROM logs
             ORDER BY timestamp DESC, id DESC
             LIMIT ?",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                timestamp_us: row.get(1)?,
                level: row.get(2)?,
                message: row.get(3)?,
                metadata: row.get(4)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Total number of stored records
    pub async fn count(&self) -> StorageResult<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Erase every stored record, returning how many were removed
    ///
    /// Ids keep increasing afterwards (AUTOINCREMENT sequence is untouched).
    pub async fn clear(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().await;
        let removed = conn.execute("DELETE FROM logs", [])?;
        Ok(removed)
    }

    /// Cheap round trip used by readiness checks
    pub async fn ping(&self) -> StorageResult<()> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

struct StoredRow {
    id: i64,
    timestamp_us: i64,
    level: Option<String>,
    message: Option<String>,
    metadata: Option<String>,
}

impl StoredRow {
    fn into_record(self) -> StorageResult<LogRecord> {
        let timestamp: DateTime<Utc> = DateTime::from_timestamp_micros(self.timestamp_us)
            .ok_or_else(|| StorageError::Corruption {
                id: self.id,
                reason: format!("timestamp {} out of range", self.timestamp_us),
            })?;

        Ok(LogRecord {
            id: self.id,
            timestamp,
            level: self.level,
            message: self.message,
            metadata: self.metadata,
        })
    }
}
