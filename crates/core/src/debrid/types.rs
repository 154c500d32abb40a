//! Types for the debrid provider layer.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a debrid provider call.
#[derive(Debug, Error)]
pub enum DebridError {
    /// The API key was rejected. Further calls to this provider are
    /// pointless until the key is fixed.
    #[error("Debrid API key rejected")]
    InvalidApiKey,

    /// The provider throttled us. The gate fails over to the next provider.
    #[error("Debrid provider rate limited")]
    RateLimited,

    #[error("Debrid provider not configured: {0}")]
    NotConfigured(String),

    /// The remote copy exists but is not ready to download yet.
    #[error("Debrid content not ready: {0}")]
    NotReady(String),

    #[error("Debrid API error: {0}")]
    Api(String),

    #[error("Debrid network error: {0}")]
    Network(String),
}

impl DebridError {
    /// Map a reqwest failure onto the debrid error taxonomy.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        DebridError::Network(e.to_string())
    }
}

/// Remote state of a torrent on a debrid provider, reduced to what the gate
/// needs to decide.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    /// Content is present in the provider's cache and downloadable.
    Ready,
    /// The provider is still fetching the content itself.
    Fetching,
    /// The provider gave up on this torrent.
    Failed,
}

/// A file within a remote debrid torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-assigned file id, used to request download links.
    pub id: String,
    /// Path within the torrent.
    pub path: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// A torrent registered with a debrid provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTorrent {
    /// Provider-assigned torrent id.
    pub id: String,
    /// Info hash (lowercase hex).
    pub hash: String,
    pub state: RemoteState,
    pub files: Vec<RemoteFile>,
}

impl RemoteTorrent {
    /// Largest file in the torrent matching the given predicate.
    pub fn largest_file_where<F>(&self, predicate: F) -> Option<&RemoteFile>
    where
        F: Fn(&RemoteFile) -> bool,
    {
        self.files
            .iter()
            .filter(|f| predicate(f))
            .max_by_key(|f| f.size_bytes)
    }
}

/// Trait for debrid provider clients.
///
/// Every implementation routes its outbound calls through an injected
/// [`IntervalLimiter`](super::IntervalLimiter) shared across call sites.
#[async_trait]
pub trait DebridProvider: Send + Sync {
    /// Provider name for logging and metrics.
    fn name(&self) -> &str;

    /// Whether the given info hash is already in the provider's cache.
    async fn check_cache(&self, hash: &str) -> Result<bool, DebridError>;

    /// Register a magnet with the provider.
    async fn add_magnet(&self, magnet: &str) -> Result<RemoteTorrent, DebridError>;

    /// Current state of a registered torrent.
    async fn torrent_info(&self, id: &str) -> Result<RemoteTorrent, DebridError>;

    /// Look up an already-registered torrent by info hash.
    async fn find_by_hash(&self, hash: &str) -> Result<Option<RemoteTorrent>, DebridError>;

    /// Resolve a direct download URL for one file of a torrent.
    async fn download_link(
        &self,
        torrent: &RemoteTorrent,
        file: &RemoteFile,
    ) -> Result<String, DebridError>;

    /// Stream a resolved URL to a local file.
    async fn download_file(&self, url: &str, dest: &Path) -> Result<(), DebridError>;

    /// Remove a torrent from the provider.
    async fn delete(&self, id: &str) -> Result<(), DebridError>;
}

/// Build a minimal magnet URI from a bare info hash, for providers whose
/// cache probe only accepts magnets.
pub fn magnet_from_hash(hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{}", hash.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnet_from_hash() {
        assert_eq!(
            magnet_from_hash("ABC123"),
            "magnet:?xt=urn:btih:abc123"
        );
    }

    #[test]
    fn test_largest_file_where() {
        let torrent = RemoteTorrent {
            id: "1".to_string(),
            hash: "abc".to_string(),
            state: RemoteState::Ready,
            files: vec![
                RemoteFile {
                    id: "1".to_string(),
                    path: "sample.mkv".to_string(),
                    size_bytes: 100,
                },
                RemoteFile {
                    id: "2".to_string(),
                    path: "movie.mkv".to_string(),
                    size_bytes: 5000,
                },
                RemoteFile {
                    id: "3".to_string(),
                    path: "notes.txt".to_string(),
                    size_bytes: 9000,
                },
            ],
        };

        let largest = torrent
            .largest_file_where(|f| f.path.ends_with(".mkv"))
            .unwrap();
        assert_eq!(largest.path, "movie.mkv");

        assert!(torrent
            .largest_file_where(|f| f.path.ends_with(".iso"))
            .is_none());
    }
}
