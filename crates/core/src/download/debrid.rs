//! Debrid download backend, a facade over the cache gate.
//!
//! Unlike daemon backends there is nothing local to pause or resume; those
//! operations are accepted and logged as no-ops so callers can treat every
//! backend uniformly. Removal never touches the remote copy, which is an
//! account-level artifact shared with other consumers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::debrid::{magnet_from_hash, DebridCacheGate, GateStatus};
use crate::indexer::{Candidate, Protocol};
use crate::metrics;

use super::{hash, Download, DownloadClient, DownloadError, DownloadStatus};

const HASH_FETCH_TIMEOUT_SECS: u64 = 30;

/// Debrid backend client.
pub struct DebridDownloadClient {
    gate: Arc<DebridCacheGate>,
    client: Client,
}

impl DebridDownloadClient {
    /// Create a backend over the given gate.
    pub fn new(gate: Arc<DebridCacheGate>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HASH_FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self { gate, client }
    }
}

#[async_trait]
impl DownloadClient for DebridDownloadClient {
    fn name(&self) -> &str {
        "debrid"
    }

    async fn submit(&self, candidate: &Candidate) -> Result<Download, DownloadError> {
        if candidate.protocol != Protocol::Torrent {
            return Err(DownloadError::UnsupportedProtocol {
                backend: self.name().to_string(),
                protocol: candidate.protocol,
            });
        }

        let content_hash = hash::content_hash(&self.client, &candidate.download_url).await?;

        let magnet = if candidate.download_url.starts_with("magnet:") {
            candidate.download_url.clone()
        } else {
            magnet_from_hash(&content_hash)
        };

        self.gate
            .submit(&content_hash, &magnet)
            .await
            .map_err(|e| DownloadError::Api(e.to_string()))?;

        metrics::SUBMISSIONS.with_label_values(&[self.name()]).inc();
        Ok(Download::new(self.name(), candidate, content_hash))
    }

    async fn status(&self, download: &Download) -> DownloadStatus {
        match self.gate.status(&download.hash).await {
            GateStatus::LocalReady => DownloadStatus::Finished,
            GateStatus::Fetching | GateStatus::RemoteFetching => DownloadStatus::Downloading,
            GateStatus::Failed => DownloadStatus::Error,
            GateStatus::Unknown => DownloadStatus::Unknown,
        }
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadError> {
        debug!(hash = download.hash, "Pause is a no-op for debrid downloads");
        Ok(())
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadError> {
        debug!(hash = download.hash, "Resume is a no-op for debrid downloads");
        Ok(())
    }

    async fn remove(&self, download: &Download, _delete_files: bool) -> Result<(), DownloadError> {
        debug!(
            hash = download.hash,
            "Remove is a no-op for debrid downloads; remote copy is left alone"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debrid::DebridProvider;
    use crate::testing::MockDebridProvider;
    use tempfile::TempDir;

    fn backend() -> (DebridDownloadClient, TempDir) {
        let staging = TempDir::new().unwrap();
        let provider = Arc::new(MockDebridProvider::new("mock"));
        let gate = Arc::new(DebridCacheGate::new(
            vec![provider as Arc<dyn DebridProvider>],
            staging.path().to_path_buf(),
        ));
        (DebridDownloadClient::new(gate), staging)
    }

    fn usenet_candidate() -> Candidate {
        Candidate {
            title: "Show.S01E01.1080p".to_string(),
            download_url: "https://indexer/dl/1.nzb".to_string(),
            protocol: Protocol::Usenet,
            size_bytes: 1,
            seeders: 0,
            age_secs: 100,
            flags: vec![],
            indexer: "test".to_string(),
            score: 0,
        }
    }

    #[tokio::test]
    async fn test_usenet_candidate_rejected() {
        let (backend, _staging) = backend();
        let result = backend.submit(&usenet_candidate()).await;
        assert!(matches!(
            result,
            Err(DownloadError::UnsupportedProtocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_pause_resume_remove_are_noops() {
        let (backend, _staging) = backend();
        let download = Download::new(
            "debrid",
            &Candidate {
                protocol: Protocol::Torrent,
                download_url: "magnet:?xt=urn:btih:aabb".to_string(),
                ..usenet_candidate()
            },
            "aabb".to_string(),
        );

        backend.pause(&download).await.unwrap();
        backend.resume(&download).await.unwrap();
        backend.remove(&download, true).await.unwrap();
    }
}
