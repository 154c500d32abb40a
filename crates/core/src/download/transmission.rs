//! Transmission download backend (RPC over HTTP).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::TransmissionConfig;
use crate::indexer::{Candidate, Protocol};
use crate::metrics;

use super::{Download, DownloadClient, DownloadError, DownloadStatus};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Transmission backend client.
pub struct TransmissionClient {
    client: Client,
    config: TransmissionConfig,
    /// CSRF session id, refreshed on 409 responses.
    session_id: Arc<RwLock<Option<String>>>,
}

impl TransmissionClient {
    /// Create a new Transmission client.
    pub fn new(config: TransmissionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            session_id: Arc::new(RwLock::new(None)),
        }
    }

    fn rpc_url(&self) -> String {
        format!("{}/transmission/rpc", self.config.url.trim_end_matches('/'))
    }

    async fn send_once(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, DownloadError> {
        let mut request = self.client.post(self.rpc_url()).json(body);

        if let (Some(user), Some(pass)) = (
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        ) {
            request = request.basic_auth(user, Some(pass));
        }

        if let Some(session) = self.session_id.read().await.clone() {
            request = request.header(SESSION_HEADER, session);
        }

        request.send().await.map_err(DownloadError::from_reqwest)
    }

    /// Issue an RPC call, handling the 409 session-id handshake.
    async fn rpc(
        &self,
        method: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, DownloadError> {
        let body = json!({ "method": method, "arguments": arguments });

        let mut response = self.send_once(&body).await?;

        if response.status() == StatusCode::CONFLICT {
            let new_session = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
                .ok_or_else(|| {
                    DownloadError::Api("409 without session id header".to_string())
                })?;

            debug!("Transmission session id refreshed");
            {
                let mut session = self.session_id.write().await;
                *session = Some(new_session);
            }
            response = self.send_once(&body).await?;
        }

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DownloadError::Auth("Invalid credentials".to_string()));
            }
            status if !status.is_success() => {
                return Err(DownloadError::Api(format!("HTTP {status}")));
            }
            _ => {}
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| DownloadError::Api(e.to_string()))?;

        if envelope.result != "success" {
            return Err(DownloadError::Api(envelope.result));
        }

        Ok(envelope.arguments)
    }

    async fn lookup(&self, hash: &str) -> Result<Option<TransmissionTorrent>, DownloadError> {
        let arguments = self
            .rpc(
                "torrent-get",
                json!({
                    "ids": [hash],
                    "fields": ["hashString", "status", "error"]
                }),
            )
            .await?;

        let torrents: Vec<TransmissionTorrent> =
            serde_json::from_value(arguments.get("torrents").cloned().unwrap_or(json!([])))
                .map_err(|e| DownloadError::Api(e.to_string()))?;

        Ok(torrents.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TransmissionTorrent {
    status: i64,
    #[serde(default)]
    error: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddedTorrent {
    hash_string: String,
}

/// Map Transmission's numeric status (plus error field) onto the unified
/// status. Status ids: 0 stopped, 1-2 checking, 3-4 downloading,
/// 5-6 seeding.
fn parse_transmission_status(torrent: &TransmissionTorrent) -> DownloadStatus {
    if torrent.error != 0 {
        return DownloadStatus::Error;
    }
    match torrent.status {
        0 => DownloadStatus::Unknown,
        1 | 2 | 3 | 4 => DownloadStatus::Downloading,
        5 | 6 => DownloadStatus::Finished,
        _ => DownloadStatus::Error,
    }
}

#[async_trait]
impl DownloadClient for TransmissionClient {
    fn name(&self) -> &str {
        "transmission"
    }

    async fn submit(&self, candidate: &Candidate) -> Result<Download, DownloadError> {
        if candidate.protocol != Protocol::Torrent {
            return Err(DownloadError::UnsupportedProtocol {
                backend: self.name().to_string(),
                protocol: candidate.protocol,
            });
        }

        let mut args = json!({ "filename": candidate.download_url });
        if let Some(path) = self.config.download_path.as_deref() {
            args["download-dir"] = json!(path);
        }

        let arguments = self.rpc("torrent-add", args).await?;

        // The daemon reports an already-known torrent under a separate key;
        // either way the hash comes back and the job is the same.
        let added: AddedTorrent = arguments
            .get("torrent-added")
            .or_else(|| arguments.get("torrent-duplicate"))
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| {
                DownloadError::Rejected("torrent-add returned no torrent".to_string())
            })?;

        if arguments.get("torrent-duplicate").is_some() {
            debug!(hash = added.hash_string, "Torrent already present, reusing job");
        } else {
            metrics::SUBMISSIONS.with_label_values(&[self.name()]).inc();
        }

        Ok(Download::new(
            self.name(),
            candidate,
            added.hash_string,
        ))
    }

    async fn status(&self, download: &Download) -> DownloadStatus {
        match self.lookup(&download.hash).await {
            Ok(Some(torrent)) => parse_transmission_status(&torrent),
            Ok(None) => DownloadStatus::Unknown,
            Err(e) => {
                warn!(hash = download.hash, error = %e, "Transmission status lookup failed");
                DownloadStatus::Unknown
            }
        }
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadError> {
        self.rpc("torrent-stop", json!({ "ids": [download.hash] }))
            .await?;
        Ok(())
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadError> {
        self.rpc("torrent-start", json!({ "ids": [download.hash] }))
            .await?;
        Ok(())
    }

    async fn remove(&self, download: &Download, delete_files: bool) -> Result<(), DownloadError> {
        self.rpc(
            "torrent-remove",
            json!({ "ids": [download.hash], "delete-local-data": delete_files }),
        )
        .await?;
        Ok(())
    }
}
