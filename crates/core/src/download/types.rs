//! Types for the download backend abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::classifier::Quality;
use crate::indexer::{Candidate, Protocol};

/// Unified status every backend maps its native states onto.
///
/// `Unknown` doubles as "the backend cannot locate this job"; lookup
/// failures never surface as errors from status polling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Unknown,
    Downloading,
    Finished,
    Error,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Unknown => "unknown",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Finished => "finished",
            DownloadStatus::Error => "error",
        }
    }
}

/// An acquisition job tracked across its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    /// Deterministic job id; resubmitting the same content to the same
    /// backend produces the same id.
    pub id: Uuid,
    /// Release title at submission time.
    pub title: String,
    pub protocol: Protocol,
    /// Quality parsed from the title at submission time.
    pub quality: Quality,
    /// Info hash for torrents, backend-assigned id for usenet jobs.
    pub hash: String,
    pub status: DownloadStatus,
    /// Set once the import reconciler has placed every expected file.
    #[serde(default)]
    pub imported: bool,
    pub created_at: DateTime<Utc>,
}

impl Download {
    /// Deterministic job id from backend name and content hash.
    pub fn job_id(backend: &str, hash: &str) -> Uuid {
        let seed = format!("{backend}:{}", hash.to_lowercase());
        Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
    }

    /// Build a new job for a candidate accepted by a backend.
    pub fn new(backend: &str, candidate: &Candidate, hash: String) -> Self {
        Self {
            id: Self::job_id(backend, &hash),
            title: candidate.title.clone(),
            protocol: candidate.protocol,
            quality: candidate.quality(),
            hash: hash.to_lowercase(),
            status: DownloadStatus::Downloading,
            imported: false,
            created_at: Utc::now(),
        }
    }
}

/// Errors from download backend operations.
///
/// Submission failures propagate so no phantom job is recorded; status
/// polling is infallible by design and reports [`DownloadStatus::Unknown`]
/// instead.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Backend rejected submission: {0}")]
    Rejected(String),

    #[error("Backend connection failed: {0}")]
    Connection(String),

    #[error("Backend authentication failed: {0}")]
    Auth(String),

    #[error("Backend API error: {0}")]
    Api(String),

    #[error("Candidate protocol {protocol:?} not supported by backend {backend}")]
    UnsupportedProtocol {
        backend: String,
        protocol: Protocol,
    },

    #[error("Request timeout")]
    Timeout,
}

impl DownloadError {
    /// Map a reqwest failure onto the backend error taxonomy.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DownloadError::Timeout
        } else if e.is_connect() {
            DownloadError::Connection(e.to_string())
        } else {
            DownloadError::Api(e.to_string())
        }
    }
}

/// Uniform interface over all download backends.
///
/// Backends differ wildly in what they can do (a debrid service cannot
/// pause, usenet has no seeding) but expose exactly this surface; anything
/// a backend cannot honor is a logged no-op rather than an error.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Backend name for logging and job-id derivation.
    fn name(&self) -> &str;

    /// Hand a candidate to the backend, returning the tracked job.
    ///
    /// Submitting content the backend already has returns the existing job
    /// rather than creating a duplicate.
    async fn submit(&self, candidate: &Candidate) -> Result<Download, DownloadError>;

    /// Current status of a job. Never fails; an unlocatable job is
    /// [`DownloadStatus::Unknown`].
    async fn status(&self, download: &Download) -> DownloadStatus;

    /// Pause a job.
    async fn pause(&self, download: &Download) -> Result<(), DownloadError>;

    /// Resume a paused job.
    async fn resume(&self, download: &Download) -> Result<(), DownloadError>;

    /// Remove a job, optionally deleting downloaded files.
    async fn remove(&self, download: &Download, delete_files: bool) -> Result<(), DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate {
            title: "Show.S01E01.1080p.WEB".to_string(),
            download_url: "magnet:?xt=urn:btih:aabb".to_string(),
            protocol: Protocol::Torrent,
            size_bytes: 1000,
            seeders: 5,
            age_secs: 0,
            flags: vec![],
            indexer: "test".to_string(),
            score: 0,
        }
    }

    #[test]
    fn test_job_id_is_deterministic() {
        let a = Download::job_id("qbittorrent", "AABBCC");
        let b = Download::job_id("qbittorrent", "aabbcc");
        assert_eq!(a, b);
    }

    #[test]
    fn test_job_id_differs_per_backend() {
        let a = Download::job_id("qbittorrent", "aabbcc");
        let b = Download::job_id("transmission", "aabbcc");
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_download_derives_quality() {
        let download = Download::new("qbittorrent", &candidate(), "AABB".to_string());
        assert_eq!(download.quality, Quality::FullHd);
        assert_eq!(download.hash, "aabb");
        assert_eq!(download.status, DownloadStatus::Downloading);
        assert!(!download.imported);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&DownloadStatus::Downloading).unwrap(),
            "\"downloading\""
        );
        assert_eq!(
            serde_json::to_string(&DownloadStatus::Unknown).unwrap(),
            "\"unknown\""
        );
    }
}
