//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::classifier::Quality;
use crate::download::{Download, DownloadStatus};
use crate::indexer::Protocol;

use super::{JobStore, JobStoreError};

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                protocol TEXT NOT NULL,
                quality TEXT NOT NULL,
                hash TEXT NOT NULL,
                status TEXT NOT NULL,
                imported INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_downloads_hash ON downloads(hash);
            CREATE INDEX IF NOT EXISTS idx_downloads_status ON downloads(status, imported);
            "#,
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_download(row: &rusqlite::Row) -> rusqlite::Result<Download> {
        let id_str: String = row.get(0)?;
        let title: String = row.get(1)?;
        let protocol_json: String = row.get(2)?;
        let quality_json: String = row.get(3)?;
        let hash: String = row.get(4)?;
        let status_json: String = row.get(5)?;
        let imported: bool = row.get(6)?;
        let created_at_str: String = row.get(7)?;

        let id = Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil());

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let protocol: Protocol =
            serde_json::from_str(&protocol_json).unwrap_or(Protocol::Torrent);
        let quality: Quality = serde_json::from_str(&quality_json).unwrap_or(Quality::Unknown);
        let status: DownloadStatus =
            serde_json::from_str(&status_json).unwrap_or(DownloadStatus::Unknown);

        Ok(Download {
            id,
            title,
            protocol,
            quality,
            hash,
            status,
            imported,
            created_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, title, protocol, quality, hash, status, imported, created_at";

impl JobStore for SqliteJobStore {
    fn save(&self, download: &Download) -> Result<(), JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let protocol_json = serde_json::to_string(&download.protocol)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;
        let quality_json = serde_json::to_string(&download.quality)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;
        let status_json = serde_json::to_string(&download.status)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO downloads (id, title, protocol, quality, hash, status, imported, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 status = excluded.status,
                 imported = excluded.imported",
            params![
                download.id.to_string(),
                download.title,
                protocol_json,
                quality_json,
                download.hash,
                status_json,
                download.imported,
                download.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get(&self, id: &Uuid) -> Result<Option<Download>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM downloads WHERE id = ?"),
            params![id.to_string()],
            Self::row_to_download,
        );

        match result {
            Ok(download) => Ok(Some(download)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(JobStoreError::Database(e.to_string())),
        }
    }

    fn find_by_hash(&self, hash: &str) -> Result<Option<Download>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM downloads WHERE hash = ?"),
            params![hash.to_lowercase()],
            Self::row_to_download,
        );

        match result {
            Ok(download) => Ok(Some(download)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(JobStoreError::Database(e.to_string())),
        }
    }

    fn list_by_status(
        &self,
        status: DownloadStatus,
        imported: bool,
    ) -> Result<Vec<Download>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let status_json = serde_json::to_string(&status)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM downloads
                 WHERE status = ? AND imported = ?
                 ORDER BY created_at ASC"
            ))
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![status_json, imported], Self::row_to_download)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobStoreError::Database(e.to_string()))
    }

    fn set_status(&self, id: &Uuid, status: DownloadStatus) -> Result<(), JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let status_json = serde_json::to_string(&status)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        conn.execute(
            "UPDATE downloads SET status = ? WHERE id = ?",
            params![status_json, id.to_string()],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn set_imported(&self, id: &Uuid, imported: bool) -> Result<(), JobStoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE downloads SET imported = ? WHERE id = ?",
            params![imported, id.to_string()],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), JobStoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM downloads WHERE id = ?",
            params![id.to_string()],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }
}
