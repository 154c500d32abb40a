//! Mock debrid provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::debrid::{DebridError, DebridProvider, RemoteFile, RemoteState, RemoteTorrent};

/// Mock implementation of the DebridProvider trait.
///
/// Provides controllable behavior for testing:
/// - Configurable cache answers and remote torrent states
/// - One-shot error injection on the cache check
/// - Records added magnets and deleted torrent ids for assertions
pub struct MockDebridProvider {
    name: String,
    /// Answer to every cache check.
    cached: Arc<RwLock<bool>>,
    /// If set, the next cache check fails with this error (consumed once).
    next_error: Arc<RwLock<Option<DebridError>>>,
    /// Remote torrents keyed by info hash, also found by id.
    remote: Arc<RwLock<HashMap<String, RemoteTorrent>>>,
    /// Magnets registered via add_magnet.
    added: Arc<RwLock<Vec<String>>>,
    /// Torrent ids removed via delete.
    deleted: Arc<RwLock<Vec<String>>>,
}

impl MockDebridProvider {
    /// Create a new mock provider answering "not cached" to everything.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cached: Arc::new(RwLock::new(false)),
            next_error: Arc::new(RwLock::new(None)),
            remote: Arc::new(RwLock::new(HashMap::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the answer every cache check returns.
    pub async fn set_cached(&self, cached: bool) {
        *self.cached.write().await = cached;
    }

    /// Make the next cache check fail with the given error.
    pub async fn set_next_error(&self, error: DebridError) {
        *self.next_error.write().await = Some(error);
    }

    /// Register a remote torrent served by find_by_hash / torrent_info.
    pub async fn set_remote(&self, hash: &str, state: RemoteState, files: Vec<RemoteFile>) {
        let hash = hash.to_lowercase();
        let torrent = RemoteTorrent {
            id: format!("{}-{}", self.name, hash),
            hash: hash.clone(),
            state,
            files,
        };
        self.remote.write().await.insert(hash, torrent);
    }

    /// Magnets registered so far.
    pub async fn added_magnets(&self) -> Vec<String> {
        self.added.read().await.clone()
    }

    /// Torrent ids deleted so far.
    pub async fn deleted_ids(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }
}

fn hash_from_magnet(magnet: &str) -> String {
    magnet
        .split("btih:")
        .nth(1)
        .map(|rest| {
            rest.split('&')
                .next()
                .unwrap_or(rest)
                .to_lowercase()
        })
        .unwrap_or_else(|| magnet.to_lowercase())
}

#[async_trait]
impl DebridProvider for MockDebridProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_cache(&self, _hash: &str) -> Result<bool, DebridError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(*self.cached.read().await)
    }

    async fn add_magnet(&self, magnet: &str) -> Result<RemoteTorrent, DebridError> {
        self.added.write().await.push(magnet.to_string());

        let hash = hash_from_magnet(magnet);
        let mut remote = self.remote.write().await;
        let torrent = remote.entry(hash.clone()).or_insert_with(|| RemoteTorrent {
            id: format!("{}-{}", self.name, hash),
            hash: hash.clone(),
            state: RemoteState::Ready,
            files: Vec::new(),
        });
        Ok(torrent.clone())
    }

    async fn torrent_info(&self, id: &str) -> Result<RemoteTorrent, DebridError> {
        self.remote
            .read()
            .await
            .values()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| DebridError::Api(format!("unknown torrent {id}")))
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<RemoteTorrent>, DebridError> {
        Ok(self.remote.read().await.get(&hash.to_lowercase()).cloned())
    }

    async fn download_link(
        &self,
        torrent: &RemoteTorrent,
        file: &RemoteFile,
    ) -> Result<String, DebridError> {
        Ok(format!("https://mock.debrid/{}/{}", torrent.id, file.id))
    }

    async fn download_file(&self, _url: &str, dest: &Path) -> Result<(), DebridError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DebridError::Api(e.to_string()))?;
        }
        tokio::fs::write(dest, b"mock content")
            .await
            .map_err(|e| DebridError::Api(e.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), DebridError> {
        self.deleted.write().await.push(id.to_string());
        self.remote.write().await.retain(|_, t| t.id != id);
        Ok(())
    }
}
