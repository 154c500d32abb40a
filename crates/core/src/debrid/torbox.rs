//! TorBox provider client.
//!
//! TorBox wraps everything in a `{ success, data }` envelope and, unlike
//! Real-Debrid, has a real cache-check endpoint.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::config::TorBoxConfig;

use super::{DebridError, DebridProvider, IntervalLimiter, RemoteFile, RemoteState, RemoteTorrent};

const BASE_URL: &str = "https://api.torbox.app/v1/api";

/// TorBox API client.
pub struct TorBoxClient {
    client: Client,
    config: TorBoxConfig,
    base_url: String,
    limiter: Arc<IntervalLimiter>,
}

impl TorBoxClient {
    /// Create a client sharing the given call limiter.
    pub fn new(config: TorBoxConfig, limiter: Arc<IntervalLimiter>) -> Self {
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

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, DebridError> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        unwrap_envelope(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T, DebridError> {
        self.limiter.acquire().await;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        unwrap_envelope(response).await
    }
}

#[derive(Debug, Deserialize)]
struct TbEnvelope<T> {
    success: bool,
    #[serde(default)]
    detail: Option<String>,
    data: Option<T>,
}

async fn unwrap_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DebridError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(DebridError::InvalidApiKey),
        StatusCode::TOO_MANY_REQUESTS => return Err(DebridError::RateLimited),
        status if !status.is_success() => {
            return Err(DebridError::Api(format!("HTTP {status}")));
        }
        _ => {}
    }

    let envelope: TbEnvelope<T> = response
        .json()
        .await
        .map_err(|e| DebridError::Api(e.to_string()))?;

    if !envelope.success {
        return Err(DebridError::Api(
            envelope.detail.unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }

    envelope
        .data
        .ok_or_else(|| DebridError::Api("Missing data in response".to_string()))
}

#[derive(Debug, Deserialize)]
struct TbCreated {
    torrent_id: i64,
}

#[derive(Debug, Deserialize)]
struct TbTorrent {
    id: i64,
    hash: String,
    download_state: String,
    #[serde(default)]
    download_finished: bool,
    #[serde(default)]
    files: Vec<TbFile>,
}

#[derive(Debug, Deserialize)]
struct TbFile {
    id: i64,
    #[serde(alias = "short_name")]
    name: String,
    size: u64,
}

fn parse_tb_state(torrent: &TbTorrent) -> RemoteState {
    if torrent.download_finished {
        return RemoteState::Ready;
    }
    match torrent.download_state.as_str() {
        "completed" | "cached" | "uploading" => RemoteState::Ready,
        "error" | "failed" | "stalled (no seeds)" => RemoteState::Failed,
        _ => RemoteState::Fetching,
    }
}

impl TbTorrent {
    fn into_remote(self) -> RemoteTorrent {
        let state = parse_tb_state(&self);
        RemoteTorrent {
            id: self.id.to_string(),
            hash: self.hash.to_lowercase(),
            state,
            files: self
                .files
                .into_iter()
                .map(|f| RemoteFile {
                    id: f.id.to_string(),
                    path: f.name,
                    size_bytes: f.size,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl DebridProvider for TorBoxClient {
    fn name(&self) -> &str {
        "torbox"
    }

    async fn check_cache(&self, hash: &str) -> Result<bool, DebridError> {
        let data: serde_json::Value = self
            .get_json(&format!(
                "/torrents/checkcached?hash={}&format=object",
                hash.to_lowercase()
            ))
            .await?;

        // Cached hashes appear as keys in the object; uncached hashes are
        // absent or mapped to false.
        let entry = data.get(hash.to_lowercase());
        Ok(matches!(entry, Some(v) if !v.is_null() && v.as_bool() != Some(false)))
    }

    async fn add_magnet(&self, magnet: &str) -> Result<RemoteTorrent, DebridError> {
        let created: TbCreated = self
            .post_json(
                "/torrents/createtorrent",
                serde_json::json!({ "magnet": magnet }),
            )
            .await?;

        self.torrent_info(&created.torrent_id.to_string()).await
    }

    async fn torrent_info(&self, id: &str) -> Result<RemoteTorrent, DebridError> {
        let torrent: TbTorrent = self
            .get_json(&format!("/torrents/mylist?id={id}"))
            .await?;
        Ok(torrent.into_remote())
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<RemoteTorrent>, DebridError> {
        let torrents: Vec<TbTorrent> = self.get_json("/torrents/mylist").await?;

        let hash_lower = hash.to_lowercase();
        Ok(torrents
            .into_iter()
            .find(|t| t.hash.to_lowercase() == hash_lower)
            .map(TbTorrent::into_remote))
    }

    async fn download_link(
        &self,
        torrent: &RemoteTorrent,
        file: &RemoteFile,
    ) -> Result<String, DebridError> {
        let link: String = self
            .get_json(&format!(
                "/torrents/requestdl?token={}&torrent_id={}&file_id={}",
                urlencoding::encode(&self.config.api_key),
                torrent.id,
                file.id
            ))
            .await?;
        Ok(link)
    }

    async fn download_file(&self, url: &str, dest: &Path) -> Result<(), DebridError> {
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
        let _: serde_json::Value = self
            .post_json(
                "/torrents/controltorrent",
                serde_json::json!({ "torrent_id": id, "operation": "delete" }),
            )
            .await?;
        Ok(())
    }
}
