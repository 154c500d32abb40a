//! Priority-ordered debrid cache gate.
//!
//! The gate owns the provider list and decides, per submission, which
//! provider serves the content: the first cache hit wins, a rate-limited
//! provider is skipped in favor of the next one, and a provider with a
//! rejected API key is not consulted further during the call. On a cache hit
//! the local fetch starts immediately in the background; on a miss the
//! content is registered with the first responsive provider and picked up
//! later by status polling.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::importer::files::is_video_path;
use crate::metrics;

use super::{DebridError, DebridProvider, RemoteState, RemoteTorrent};

/// Local view of a gated item's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// Files are staged locally and ready for import.
    LocalReady,
    /// A background fetch to the staging directory is running.
    Fetching,
    /// The provider is still fetching the content remotely.
    RemoteFetching,
    /// The provider gave up on the content.
    Failed,
    /// No provider knows this hash.
    Unknown,
}

/// Debrid cache gate over one or more providers in priority order.
pub struct DebridCacheGate {
    providers: Vec<Arc<dyn DebridProvider>>,
    staging_dir: PathBuf,
    /// Hashes with a background fetch in flight.
    pending: Arc<RwLock<HashSet<String>>>,
}

impl DebridCacheGate {
    /// Create a gate. Provider order is the failover priority order.
    pub fn new(providers: Vec<Arc<dyn DebridProvider>>, staging_dir: PathBuf) -> Self {
        Self {
            providers,
            staging_dir,
            pending: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Local staging directory for a given hash.
    pub fn staging_path(&self, hash: &str) -> PathBuf {
        self.staging_dir.join(hash.to_lowercase())
    }

    /// Submit a magnet to the gate.
    ///
    /// Returns once the content is registered with a provider; the actual
    /// file transfer (if the content was cached) continues in the
    /// background.
    pub async fn submit(self: &Arc<Self>, hash: &str, magnet: &str) -> Result<(), DebridError> {
        let hash = hash.to_lowercase();
        let mut fallback: Option<&Arc<dyn DebridProvider>> = None;
        let mut last_error: Option<DebridError> = None;

        for provider in &self.providers {
            match provider.check_cache(&hash).await {
                Ok(true) => {
                    info!(provider = provider.name(), hash, "Debrid cache hit");
                    metrics::DEBRID_CACHE_CHECKS
                        .with_label_values(&[provider.name(), "hit"])
                        .inc();

                    let torrent = provider.add_magnet(magnet).await?;
                    self.spawn_fetch(Arc::clone(provider), torrent, hash);
                    return Ok(());
                }
                Ok(false) => {
                    metrics::DEBRID_CACHE_CHECKS
                        .with_label_values(&[provider.name(), "miss"])
                        .inc();
                    if fallback.is_none() {
                        fallback = Some(provider);
                    }
                }
                Err(DebridError::RateLimited) => {
                    warn!(provider = provider.name(), "Provider rate limited, failing over");
                    metrics::DEBRID_FAILOVERS.inc();
                    last_error = Some(DebridError::RateLimited);
                }
                Err(DebridError::InvalidApiKey) => {
                    warn!(provider = provider.name(), "Provider API key rejected");
                    metrics::DEBRID_CACHE_CHECKS
                        .with_label_values(&[provider.name(), "auth_error"])
                        .inc();
                    last_error = Some(DebridError::InvalidApiKey);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Cache check failed");
                    last_error = Some(e);
                }
            }
        }

        // Cache miss everywhere: register with the highest-priority
        // responsive provider and let it fetch remotely.
        match fallback {
            Some(provider) => {
                info!(provider = provider.name(), hash, "Cache miss, remote fetch started");
                provider.add_magnet(magnet).await?;
                Ok(())
            }
            None => Err(last_error
                .unwrap_or_else(|| DebridError::NotConfigured("No providers".to_string()))),
        }
    }

    /// Current status of a previously submitted hash.
    pub async fn status(self: &Arc<Self>, hash: &str) -> GateStatus {
        let hash = hash.to_lowercase();

        if self.pending.read().await.contains(&hash) {
            return GateStatus::Fetching;
        }

        if dir_has_files(&self.staging_path(&hash)) {
            return GateStatus::LocalReady;
        }

        for provider in &self.providers {
            match provider.find_by_hash(&hash).await {
                Ok(Some(torrent)) => match torrent.state {
                    RemoteState::Ready => {
                        // Remote finished while we were not looking; start
                        // the local fetch now.
                        self.spawn_fetch(Arc::clone(provider), torrent, hash);
                        return GateStatus::Fetching;
                    }
                    RemoteState::Fetching => return GateStatus::RemoteFetching,
                    RemoteState::Failed => return GateStatus::Failed,
                },
                Ok(None) => {}
                Err(e) => {
                    debug!(provider = provider.name(), error = %e, "Status lookup failed");
                }
            }
        }

        GateStatus::Unknown
    }

    /// Start a background fetch of the torrent's main video file into the
    /// staging directory.
    fn spawn_fetch(self: &Arc<Self>, provider: Arc<dyn DebridProvider>, torrent: RemoteTorrent, hash: String) {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            {
                let mut pending = gate.pending.write().await;
                if !pending.insert(hash.clone()) {
                    // A fetch for this hash is already running.
                    return;
                }
            }

            if let Err(e) = gate.fetch_to_staging(provider.as_ref(), &torrent, &hash).await {
                warn!(hash, error = %e, "Debrid fetch failed");
            }

            gate.pending.write().await.remove(&hash);
        });
    }

    async fn fetch_to_staging(
        &self,
        provider: &dyn DebridProvider,
        torrent: &RemoteTorrent,
        hash: &str,
    ) -> Result<(), DebridError> {
        let file = torrent
            .largest_file_where(|f| is_video_path(Path::new(&f.path)))
            .or_else(|| torrent.largest_file_where(|_| true))
            .ok_or_else(|| DebridError::NotReady(format!("No files in torrent {}", torrent.id)))?;

        let url = provider.download_link(torrent, file).await?;

        let file_name = Path::new(&file.path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "content".to_string());
        let dest = self.staging_path(hash).join(file_name);

        info!(hash, dest = %dest.display(), "Fetching debrid content");
        provider.download_file(&url, &dest).await?;
        info!(hash, "Debrid fetch complete");
        Ok(())
    }
}

fn dir_has_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
