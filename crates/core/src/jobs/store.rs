//! Acquisition job persistence.

use thiserror::Error;
use uuid::Uuid;

use crate::download::{Download, DownloadStatus};

/// Errors from the job store.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence for acquisition jobs.
///
/// `save` upserts by job id, which together with deterministic job ids
/// makes resubmission idempotent.
pub trait JobStore: Send + Sync {
    /// Insert or update a job.
    fn save(&self, download: &Download) -> Result<(), JobStoreError>;

    /// Fetch a job by id.
    fn get(&self, id: &Uuid) -> Result<Option<Download>, JobStoreError>;

    /// Fetch a job by content hash.
    fn find_by_hash(&self, hash: &str) -> Result<Option<Download>, JobStoreError>;

    /// List jobs with the given status and import flag.
    fn list_by_status(
        &self,
        status: DownloadStatus,
        imported: bool,
    ) -> Result<Vec<Download>, JobStoreError>;

    /// Update a job's status.
    fn set_status(&self, id: &Uuid, status: DownloadStatus) -> Result<(), JobStoreError>;

    /// Mark a job imported (or not).
    fn set_imported(&self, id: &Uuid, imported: bool) -> Result<(), JobStoreError>;

    /// Remove a job.
    fn delete(&self, id: &Uuid) -> Result<(), JobStoreError>;
}
