//! NZBGet download backend (JSON-RPC).
//!
//! NZBGet assigns a numeric NZBID on append; stringified, it is the job's
//! stable hash. Active jobs show up in `listgroups`, finished ones in
//! `history` with a `STATUS/DETAIL` status string.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::NzbgetConfig;
use crate::indexer::{Candidate, Protocol};
use crate::metrics;

use super::{Download, DownloadClient, DownloadError, DownloadStatus};

/// NZBGet backend client.
pub struct NzbgetClient {
    client: Client,
    config: NzbgetConfig,
}

impl NzbgetClient {
    /// Create a new NZBGet client.
    pub fn new(config: NzbgetConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    async fn rpc(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, DownloadError> {
        let url = format!("{}/jsonrpc", self.config.url.trim_end_matches('/'));

        let mut request = self
            .client
            .post(&url)
            .json(&json!({ "method": method, "params": params }));

        if let (Some(user), Some(pass)) = (
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        ) {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await.map_err(DownloadError::from_reqwest)?;

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

        if let Some(error) = envelope.error {
            return Err(DownloadError::Api(error.message));
        }

        Ok(envelope.result)
    }

    async fn group_status(&self, nzb_id: i64) -> Result<Option<String>, DownloadError> {
        let result = self.rpc("listgroups", json!([])).await?;
        let groups: Vec<NzbEntry> =
            serde_json::from_value(result).map_err(|e| DownloadError::Api(e.to_string()))?;
        Ok(groups
            .into_iter()
            .find(|g| g.nzb_id == nzb_id)
            .map(|g| g.status))
    }

    async fn history_status(&self, nzb_id: i64) -> Result<Option<String>, DownloadError> {
        let result = self.rpc("history", json!([])).await?;
        let entries: Vec<NzbEntry> =
            serde_json::from_value(result).map_err(|e| DownloadError::Api(e.to_string()))?;
        Ok(entries
            .into_iter()
            .find(|e| e.nzb_id == nzb_id)
            .map(|e| e.status))
    }

    async fn edit_queue(&self, command: &str, nzb_id: i64) -> Result<(), DownloadError> {
        let result = self
            .rpc("editqueue", json!([command, "", [nzb_id]]))
            .await?;
        if result.as_bool() == Some(false) {
            return Err(DownloadError::Api(format!(
                "editqueue {command} rejected for NZBID {nzb_id}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct NzbEntry {
    #[serde(rename = "NZBID")]
    nzb_id: i64,
    #[serde(rename = "Status", default)]
    status: String,
}

/// Map an active group's status string onto the unified status. Everything
/// in the queue counts as downloading, including post-processing.
fn parse_group_status(_status: &str) -> DownloadStatus {
    DownloadStatus::Downloading
}

/// Map a history status string (`SUCCESS/ALL`, `FAILURE/PAR`, ...) onto the
/// unified status by its prefix.
fn parse_history_status(status: &str) -> DownloadStatus {
    let prefix = status.split('/').next().unwrap_or(status);
    match prefix {
        "SUCCESS" => DownloadStatus::Finished,
        "FAILURE" => DownloadStatus::Error,
        "DELETED" => DownloadStatus::Unknown,
        _ => DownloadStatus::Unknown,
    }
}

#[async_trait]
impl DownloadClient for NzbgetClient {
    fn name(&self) -> &str {
        "nzbget"
    }

    async fn submit(&self, candidate: &Candidate) -> Result<Download, DownloadError> {
        if candidate.protocol != Protocol::Usenet {
            return Err(DownloadError::UnsupportedProtocol {
                backend: self.name().to_string(),
                protocol: candidate.protocol,
            });
        }

        // append with a URL as content; NZBGet fetches the NZB itself.
        let params = json!([
            format!("{}.nzb", candidate.title),
            candidate.download_url,
            "",    // category
            0,     // priority
            false, // add to top
            false, // add paused
            "",    // dupe key
            0,     // dupe score
            "SCORE"
        ]);

        let result = self.rpc("append", params).await?;
        let nzb_id = result.as_i64().unwrap_or(0);

        if nzb_id <= 0 {
            return Err(DownloadError::Rejected(
                "NZBGet refused the NZB URL".to_string(),
            ));
        }

        metrics::SUBMISSIONS.with_label_values(&[self.name()]).inc();
        Ok(Download::new(self.name(), candidate, nzb_id.to_string()))
    }

    async fn status(&self, download: &Download) -> DownloadStatus {
        let nzb_id: i64 = match download.hash.parse() {
            Ok(id) => id,
            Err(_) => return DownloadStatus::Unknown,
        };

        match self.group_status(nzb_id).await {
            Ok(Some(status)) => return parse_group_status(&status),
            Ok(None) => {}
            Err(e) => {
                warn!(nzb_id, error = %e, "NZBGet queue lookup failed");
                return DownloadStatus::Unknown;
            }
        }

        match self.history_status(nzb_id).await {
            Ok(Some(status)) => parse_history_status(&status),
            Ok(None) => DownloadStatus::Unknown,
            Err(e) => {
                warn!(nzb_id, error = %e, "NZBGet history lookup failed");
                DownloadStatus::Unknown
            }
        }
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadError> {
        let nzb_id: i64 = download
            .hash
            .parse()
            .map_err(|_| DownloadError::Api(format!("Invalid NZBID {}", download.hash)))?;
        self.edit_queue("GroupPause", nzb_id).await
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadError> {
        let nzb_id: i64 = download
            .hash
            .parse()
            .map_err(|_| DownloadError::Api(format!("Invalid NZBID {}", download.hash)))?;
        self.edit_queue("GroupResume", nzb_id).await
    }

    async fn remove(&self, download: &Download, delete_files: bool) -> Result<(), DownloadError> {
        let nzb_id: i64 = download
            .hash
            .parse()
            .map_err(|_| DownloadError::Api(format!("Invalid NZBID {}", download.hash)))?;

        let command = if delete_files {
            "GroupFinalDelete"
        } else {
            "GroupDelete"
        };
        self.edit_queue(command, nzb_id).await
    }
}
