//! Real-Debrid provider client.
//!
//! Real-Debrid has no direct cache-check endpoint. The cache probe works by
//! registering the hash as a magnet, selecting all files, and seeing whether
//! the torrent comes back `downloaded` immediately; probe torrents are
//! deleted afterwards. A hash that is already in the account is never
//! re-added or deleted by the probe.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::RealDebridConfig;

use super::{magnet_from_hash, DebridError, DebridProvider, IntervalLimiter, RemoteFile, RemoteState, RemoteTorrent};

const BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Real-Debrid API client.
pub struct RealDebridClient {
    client: Client,
    config: RealDebridConfig,
    base_url: String,
    limiter: Arc<IntervalLimiter>,
}

impl RealDebridClient {
    /// Create a client sharing the given call limiter.
    pub fn new(config: RealDebridConfig, limiter: Arc<IntervalLimiter>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            base_url: BASE_URL.to_string(),
            limiter,
        }
    }

    async fn get(&self, endpoint: &str) -> Result<reqwest::Response, DebridError> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        check_status(response)
    }

    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, DebridError> {
        self.limiter.acquire().await;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(&self.config.api_key)
            .form(params)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        check_status(response)
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DebridError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DebridError::InvalidApiKey),
        StatusCode::TOO_MANY_REQUESTS => Err(DebridError::RateLimited),
        status if status.is_success() => Ok(response),
        status => Err(DebridError::Api(format!("HTTP {status}"))),
    }
}

#[derive(Debug, Deserialize)]
struct RdAddResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RdTorrentInfo {
    id: String,
    hash: String,
    status: String,
    #[serde(default)]
    files: Vec<RdFile>,
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RdFile {
    id: i64,
    path: String,
    bytes: u64,
    #[serde(default)]
    selected: u8,
}

#[derive(Debug, Deserialize)]
struct RdListEntry {
    id: String,
    hash: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct RdUnrestrict {
    download: String,
}

fn parse_rd_state(status: &str) -> RemoteState {
    match status {
        "downloaded" => RemoteState::Ready,
        "error" | "magnet_error" | "virus" | "dead" => RemoteState::Failed,
        // queued, downloading, magnet_conversion, waiting_files_selection,
        // compressing, uploading
        _ => RemoteState::Fetching,
    }
}

impl RdTorrentInfo {
    fn into_remote(self) -> RemoteTorrent {
        RemoteTorrent {
            id: self.id,
            hash: self.hash.to_lowercase(),
            state: parse_rd_state(&self.status),
            files: self
                .files
                .into_iter()
                .filter(|f| f.selected == 1)
                .map(|f| RemoteFile {
                    id: f.id.to_string(),
                    path: f.path,
                    size_bytes: f.bytes,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl DebridProvider for RealDebridClient {
    fn name(&self) -> &str {
        "realdebrid"
    }

    async fn check_cache(&self, hash: &str) -> Result<bool, DebridError> {
        // A torrent already in the account answers the probe directly and
        // must not be deleted.
        if let Some(existing) = self.find_by_hash(hash).await? {
            return Ok(existing.state == RemoteState::Ready);
        }

        let probe = self.add_magnet(&magnet_from_hash(hash)).await?;
        let cached = probe.state == RemoteState::Ready;

        if let Err(e) = self.delete(&probe.id).await {
            debug!(hash, error = %e, "Failed to delete cache probe torrent");
        }

        Ok(cached)
    }

    async fn add_magnet(&self, magnet: &str) -> Result<RemoteTorrent, DebridError> {
        let added: RdAddResponse = self
            .post_form("/torrents/addMagnet", &[("magnet", magnet)])
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Api(e.to_string()))?;

        self.post_form(
            &format!("/torrents/selectFiles/{}", added.id),
            &[("files", "all")],
        )
        .await?;

        self.torrent_info(&added.id).await
    }

    async fn torrent_info(&self, id: &str) -> Result<RemoteTorrent, DebridError> {
        let info: RdTorrentInfo = self
            .get(&format!("/torrents/info/{id}"))
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Api(e.to_string()))?;
        Ok(info.into_remote())
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<RemoteTorrent>, DebridError> {
        let entries: Vec<RdListEntry> = self
            .get("/torrents")
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Api(e.to_string()))?;

        let hash_lower = hash.to_lowercase();
        let entry = entries
            .into_iter()
            .find(|e| e.hash.to_lowercase() == hash_lower);

        match entry {
            // The list endpoint omits files, so refetch the full info.
            Some(e) if parse_rd_state(&e.status) == RemoteState::Ready => {
                Ok(Some(self.torrent_info(&e.id).await?))
            }
            Some(e) => Ok(Some(RemoteTorrent {
                id: e.id,
                hash: hash_lower,
                state: parse_rd_state(&e.status),
                files: vec![],
            })),
            None => Ok(None),
        }
    }

    async fn download_link(
        &self,
        torrent: &RemoteTorrent,
        file: &RemoteFile,
    ) -> Result<String, DebridError> {
        // Links line up with the selected files in order.
        let info: RdTorrentInfo = self
            .get(&format!("/torrents/info/{}", torrent.id))
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Api(e.to_string()))?;

        let position = info
            .files
            .iter()
            .filter(|f| f.selected == 1)
            .position(|f| f.id.to_string() == file.id);

        let link = position
            .and_then(|p| info.links.get(p))
            .or_else(|| info.links.first())
            .ok_or_else(|| DebridError::NotReady(format!("No links for torrent {}", torrent.id)))?;

        let unrestricted: RdUnrestrict = self
            .post_form("/unrestrict/link", &[("link", link)])
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Api(e.to_string()))?;

        Ok(unrestricted.download)
    }

    async fn download_file(&self, url: &str, dest: &Path) -> Result<(), DebridError> {
        // Direct download URLs are pre-authenticated; no bearer token and no
        // request timeout, since large files can take a long while.
        self.limiter.acquire().await;
        let response = Client::new()
            .get(url)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(DebridError::Api(format!(
                "HTTP {} fetching {url}",
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DebridError::Api(e.to_string()))?;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| DebridError::Api(e.to_string()))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DebridError::from_reqwest)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DebridError::Api(e.to_string()))?;
        }

        file.flush()
            .await
            .map_err(|e| DebridError::Api(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), DebridError> {
        self.limiter.acquire().await;
        let response = self
            .client
            .delete(format!("{}/torrents/delete/{id}", self.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        check_status(response)?;
        Ok(())
    }
}
