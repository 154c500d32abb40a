//! SABnzbd download backend.
//!
//! SABnzbd assigns an `nzo_id` on submission; that id is the job's stable
//! hash. A job lives in the queue while downloading and moves to the history
//! once post-processing starts, so status resolution checks the queue first
//! and falls back to the history.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::config::SabnzbdConfig;
use crate::indexer::{Candidate, Protocol};
use crate::metrics;

use super::{Download, DownloadClient, DownloadError, DownloadStatus};

/// SABnzbd backend client.
pub struct SabnzbdClient {
    client: Client,
    config: SabnzbdConfig,
}

impl SabnzbdClient {
    /// Create a new SABnzbd client.
    pub fn new(config: SabnzbdConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    async fn api_call<T: DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, DownloadError> {
        let mut query = vec![
            ("apikey", self.config.api_key.as_str()),
            ("output", "json"),
        ];
        query.extend_from_slice(params);

        let url = format!("{}/api", self.config.url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(DownloadError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(DownloadError::Api(format!("HTTP {}", response.status())));
        }

        response
            .json()
            .await
            .map_err(|e| DownloadError::Api(e.to_string()))
    }

    async fn queue_status(&self, nzo_id: &str) -> Result<Option<String>, DownloadError> {
        let response: QueueResponse = self.api_call(&[("mode", "queue")]).await?;
        Ok(response
            .queue
            .slots
            .into_iter()
            .find(|s| s.nzo_id == nzo_id)
            .map(|s| s.status))
    }

    async fn history_status(&self, nzo_id: &str) -> Result<Option<String>, DownloadError> {
        let response: HistoryResponse = self.api_call(&[("mode", "history")]).await?;
        Ok(response
            .history
            .slots
            .into_iter()
            .find(|s| s.nzo_id == nzo_id)
            .map(|s| s.status))
    }
}

#[derive(Debug, Deserialize)]
struct AddUrlResponse {
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    queue: SlotList,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: SlotList,
}

#[derive(Debug, Default, Deserialize)]
struct SlotList {
    #[serde(default)]
    slots: Vec<Slot>,
}

#[derive(Debug, Deserialize)]
struct Slot {
    nzo_id: String,
    status: String,
}

/// Map a SABnzbd status string onto the unified status. Post-processing
/// states fold into `Downloading`; the unified enum has no separate
/// processing state.
fn parse_sab_status(status: &str) -> DownloadStatus {
    match status {
        "Downloading" | "Queued" | "Paused" | "Grabbing" | "Propagating" | "Fetching"
        | "Verifying" | "Repairing" | "Extracting" | "Moving" | "Running" | "QuickCheck" => {
            DownloadStatus::Downloading
        }
        "Completed" => DownloadStatus::Finished,
        "Failed" => DownloadStatus::Error,
        _ => DownloadStatus::Unknown,
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn name(&self) -> &str {
        "sabnzbd"
    }

    async fn submit(&self, candidate: &Candidate) -> Result<Download, DownloadError> {
        if candidate.protocol != Protocol::Usenet {
            return Err(DownloadError::UnsupportedProtocol {
                backend: self.name().to_string(),
                protocol: candidate.protocol,
            });
        }

        let response: AddUrlResponse = self
            .api_call(&[("mode", "addurl"), ("name", candidate.download_url.as_str())])
            .await?;

        if !response.status {
            return Err(DownloadError::Rejected(
                "SABnzbd refused the NZB URL".to_string(),
            ));
        }

        let nzo_id = response
            .nzo_ids
            .into_iter()
            .next()
            .ok_or_else(|| DownloadError::Rejected("No nzo_id returned".to_string()))?;

        metrics::SUBMISSIONS.with_label_values(&[self.name()]).inc();
        Ok(Download::new(self.name(), candidate, nzo_id))
    }

    async fn status(&self, download: &Download) -> DownloadStatus {
        match self.queue_status(&download.hash).await {
            Ok(Some(status)) => return parse_sab_status(&status),
            Ok(None) => {}
            Err(e) => {
                warn!(nzo_id = download.hash, error = %e, "SABnzbd queue lookup failed");
                return DownloadStatus::Unknown;
            }
        }

        match self.history_status(&download.hash).await {
            Ok(Some(status)) => parse_sab_status(&status),
            Ok(None) => DownloadStatus::Unknown,
            Err(e) => {
                warn!(nzo_id = download.hash, error = %e, "SABnzbd history lookup failed");
                DownloadStatus::Unknown
            }
        }
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadError> {
        let _: serde_json::Value = self
            .api_call(&[
                ("mode", "queue"),
                ("name", "pause"),
                ("value", download.hash.as_str()),
            ])
            .await?;
        Ok(())
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadError> {
        let _: serde_json::Value = self
            .api_call(&[
                ("mode", "queue"),
                ("name", "resume"),
                ("value", download.hash.as_str()),
            ])
            .await?;
        Ok(())
    }

    async fn remove(&self, download: &Download, delete_files: bool) -> Result<(), DownloadError> {
        let del_files = if delete_files { "1" } else { "0" };

        // The job may be in either the queue or the history.
        let _: serde_json::Value = self
            .api_call(&[
                ("mode", "queue"),
                ("name", "delete"),
                ("value", download.hash.as_str()),
                ("del_files", del_files),
            ])
            .await?;
        let _: serde_json::Value = self
            .api_call(&[
                ("mode", "history"),
                ("name", "delete"),
                ("value", download.hash.as_str()),
                ("del_files", del_files),
            ])
            .await?;
        Ok(())
    }
}
