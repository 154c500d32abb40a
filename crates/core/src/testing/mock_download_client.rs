//! Mock download client for testing.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::download::{Download, DownloadClient, DownloadError, DownloadStatus};
use crate::indexer::Candidate;

/// Mock implementation of the DownloadClient trait.
///
/// Provides controllable behavior for testing:
/// - Configurable per-hash statuses
/// - One-shot submission failure injection
/// - Records submissions for assertions
pub struct MockDownloadClient {
    name: String,
    /// Statuses keyed by lowercase hash.
    statuses: Arc<RwLock<HashMap<String, DownloadStatus>>>,
    /// If set, the next submit fails with this error (consumed once).
    next_error: Arc<RwLock<Option<DownloadError>>>,
    /// Submitted candidate titles.
    submissions: Arc<RwLock<Vec<String>>>,
}

impl MockDownloadClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            submissions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the status reported for a hash.
    pub async fn set_status(&self, hash: &str, status: DownloadStatus) {
        self.statuses
            .write()
            .await
            .insert(hash.to_lowercase(), status);
    }

    /// Make the next submit fail with the given error.
    pub async fn set_next_error(&self, error: DownloadError) {
        *self.next_error.write().await = Some(error);
    }

    /// Titles submitted so far.
    pub async fn submitted_titles(&self) -> Vec<String> {
        self.submissions.read().await.clone()
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, candidate: &Candidate) -> Result<Download, DownloadError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        self.submissions.write().await.push(candidate.title.clone());

        // Derive a stable fake hash from the download URL so resubmissions
        // of the same candidate yield the same job id.
        let digest = Sha256::digest(candidate.download_url.as_bytes());
        let hash = format!("{digest:x}")[..40].to_string();
        self.statuses
            .write()
            .await
            .entry(hash.clone())
            .or_insert(DownloadStatus::Downloading);

        Ok(Download::new(&self.name, candidate, hash))
    }

    async fn status(&self, download: &Download) -> DownloadStatus {
        self.statuses
            .read()
            .await
            .get(&download.hash)
            .copied()
            .unwrap_or(DownloadStatus::Unknown)
    }

    async fn pause(&self, _download: &Download) -> Result<(), DownloadError> {
        Ok(())
    }

    async fn resume(&self, _download: &Download) -> Result<(), DownloadError> {
        Ok(())
    }

    async fn remove(&self, download: &Download, _delete_files: bool) -> Result<(), DownloadError> {
        self.statuses.write().await.remove(&download.hash);
        Ok(())
    }
}
