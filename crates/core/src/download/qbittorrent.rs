//! qBittorrent download backend (Web API v2).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;
use crate::indexer::{Candidate, Protocol};
use crate::metrics;

use super::{hash, Download, DownloadClient, DownloadError, DownloadStatus};

/// qBittorrent backend client.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Session marker (cookie lives in the jar, refreshed on auth failure).
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QBittorrentConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), DownloadError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(DownloadError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(DownloadError::Auth("Invalid credentials".to_string()))
        } else {
            Err(DownloadError::Auth(format!(
                "Unexpected login response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), DownloadError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    /// Make an authenticated GET request, re-authenticating once on 403.
    async fn get(&self, endpoint: &str) -> Result<String, DownloadError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(DownloadError::from_reqwest)?;

        if response.status().as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| DownloadError::Api(e.to_string()))?;

            if !response.status().is_success() {
                return Err(DownloadError::Api(format!("HTTP {}", response.status())));
            }
            return response
                .text()
                .await
                .map_err(|e| DownloadError::Api(e.to_string()));
        }

        if !response.status().is_success() {
            return Err(DownloadError::Api(format!("HTTP {}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| DownloadError::Api(e.to_string()))
    }

    /// Make an authenticated POST request with form data, re-authenticating
    /// once on 403.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, DownloadError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(DownloadError::from_reqwest)?;

        if response.status().as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            let response = self
                .client
                .post(&url)
                .form(params)
                .send()
                .await
                .map_err(|e| DownloadError::Api(e.to_string()))?;

            if !response.status().is_success() {
                return Err(DownloadError::Api(format!("HTTP {}", response.status())));
            }
            return response
                .text()
                .await
                .map_err(|e| DownloadError::Api(e.to_string()));
        }

        if !response.status().is_success() {
            return Err(DownloadError::Api(format!("HTTP {}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| DownloadError::Api(e.to_string()))
    }

    async fn lookup(&self, hash: &str) -> Result<Option<QBTorrentEntry>, DownloadError> {
        let endpoint = format!("/api/v2/torrents/info?hashes={}", hash.to_lowercase());
        let body = self.get(&endpoint).await?;
        let entries: Vec<QBTorrentEntry> = serde_json::from_str(&body)
            .map_err(|e| DownloadError::Api(format!("Failed to parse response: {e}")))?;
        Ok(entries.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct QBTorrentEntry {
    state: String,
}

/// Map qBittorrent's state string onto the unified status.
fn parse_qb_state(state: &str) -> DownloadStatus {
    match state {
        "allocating" | "downloading" | "metaDL" | "pausedDL" | "stoppedDL" | "queuedDL"
        | "stalledDL" | "checkingDL" | "forcedDL" | "moving" => DownloadStatus::Downloading,
        "uploading" | "pausedUP" | "stoppedUP" | "queuedUP" | "stalledUP" | "checkingUP"
        | "forcedUP" => DownloadStatus::Finished,
        "unknown" | "checkingResumeData" => DownloadStatus::Unknown,
        // missingFiles, error, and anything a future version adds.
        _ => DownloadStatus::Error,
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn submit(&self, candidate: &Candidate) -> Result<Download, DownloadError> {
        if candidate.protocol != Protocol::Torrent {
            return Err(DownloadError::UnsupportedProtocol {
                backend: self.name().to_string(),
                protocol: candidate.protocol,
            });
        }

        let content_hash = hash::content_hash(&self.client, &candidate.download_url).await?;

        // Already known to the daemon: return the existing job.
        if let Some(entry) = self.lookup(&content_hash).await? {
            debug!(hash = content_hash, "Torrent already present, reusing job");
            let mut download = Download::new(self.name(), candidate, content_hash);
            download.status = parse_qb_state(&entry.state);
            return Ok(download);
        }

        let mut params = vec![("urls", candidate.download_url.as_str())];
        if let Some(path) = self.config.download_path.as_deref() {
            params.push(("savepath", path));
        }
        self.post_form("/api/v2/torrents/add", &params).await?;

        metrics::SUBMISSIONS.with_label_values(&[self.name()]).inc();
        Ok(Download::new(self.name(), candidate, content_hash))
    }

    async fn status(&self, download: &Download) -> DownloadStatus {
        match self.lookup(&download.hash).await {
            Ok(Some(entry)) => parse_qb_state(&entry.state),
            Ok(None) => DownloadStatus::Unknown,
            Err(e) => {
                warn!(hash = download.hash, error = %e, "qBittorrent status lookup failed");
                DownloadStatus::Unknown
            }
        }
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadError> {
        self.post_form(
            "/api/v2/torrents/pause",
            &[("hashes", download.hash.as_str())],
        )
        .await?;
        Ok(())
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadError> {
        self.post_form(
            "/api/v2/torrents/resume",
            &[("hashes", download.hash.as_str())],
        )
        .await?;
        Ok(())
    }

    async fn remove(&self, download: &Download, delete_files: bool) -> Result<(), DownloadError> {
        let delete_str = if delete_files { "true" } else { "false" };
        self.post_form(
            "/api/v2/torrents/delete",
            &[
                ("hashes", download.hash.as_str()),
                ("deleteFiles", delete_str),
            ],
        )
        .await?;
        Ok(())
    }
}
