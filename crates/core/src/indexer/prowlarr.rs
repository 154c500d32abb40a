//! Prowlarr indexer adapter.
//!
//! Prowlarr aggregates indexers itself and exposes a JSON search API, so
//! unlike Jackett there is no per-indexer capability negotiation here. Some
//! indexers return an indirection URL instead of the actual torrent; the
//! adapter can optionally chase redirects to the final magnet or .torrent
//! URL before handing the candidate on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ProwlarrConfig;

use super::{Candidate, Indexer, IndexerError, Protocol, SearchQuery};

const TV_CATEGORY: u32 = 5000;
const MOVIE_CATEGORY: u32 = 2000;
const MAX_REDIRECT_HOPS: usize = 10;

/// Prowlarr search adapter.
pub struct ProwlarrAdapter {
    client: Client,
    /// Separate client with redirects disabled, for manual URL resolution.
    no_redirect_client: Client,
    config: ProwlarrConfig,
}

impl ProwlarrAdapter {
    /// Create a new Prowlarr adapter.
    pub fn new(config: ProwlarrConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs as u64);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        let no_redirect_client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            no_redirect_client,
            config,
        }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Chase an indirection URL to its final destination.
    ///
    /// Stops early when a hop redirects to a magnet URI. Gives up after
    /// [`MAX_REDIRECT_HOPS`] hops.
    async fn resolve_final_url(&self, url: &str) -> Result<String, IndexerError> {
        let mut current = url.to_string();

        for _ in 0..MAX_REDIRECT_HOPS {
            if current.starts_with("magnet:") {
                return Ok(current);
            }

            let response = self
                .no_redirect_client
                .get(&current)
                .send()
                .await
                .map_err(IndexerError::from_reqwest)?;

            if !response.status().is_redirection() {
                return Ok(current);
            }

            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    IndexerError::Api(format!("Redirect without Location from {current}"))
                })?;

            current = location.to_string();
        }

        Err(IndexerError::Api(format!(
            "Too many redirects resolving {url}"
        )))
    }

    async fn finalize_torrent_url(&self, raw: String) -> Option<String> {
        if !self.config.follow_redirects || raw.starts_with("magnet:") {
            return Some(raw);
        }

        match self.resolve_final_url(&raw).await {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                if self.config.reject_on_url_error {
                    warn!(url = raw, error = %e, "Dropping result with unresolvable URL");
                    None
                } else {
                    debug!(url = raw, error = %e, "Keeping unresolved indirection URL");
                    Some(raw)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct ProwlarrResult {
    title: Option<String>,
    size: Option<u64>,
    seeders: Option<u32>,
    protocol: Option<String>,
    ageMinutes: Option<f64>,
    downloadUrl: Option<String>,
    magnetUrl: Option<String>,
    guid: Option<String>,
    indexerFlags: Option<Vec<String>>,
}

impl ProwlarrResult {
    fn protocol(&self) -> Protocol {
        match self.protocol.as_deref() {
            Some("usenet") => Protocol::Usenet,
            _ => Protocol::Torrent,
        }
    }

    /// Best available download URL for this result. An empty field falls
    /// through to the next candidate instead of suppressing it.
    fn url(&self) -> Option<String> {
        [&self.downloadUrl, &self.magnetUrl, &self.guid]
            .into_iter()
            .flatten()
            .find(|u| !u.is_empty())
            .cloned()
    }
}

#[async_trait]
impl Indexer for ProwlarrAdapter {
    fn name(&self) -> &str {
        "prowlarr"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, IndexerError> {
        let category = if query.is_tv {
            TV_CATEGORY
        } else {
            MOVIE_CATEGORY
        };

        let url = format!(
            "{}/api/v1/search?query={}&categories={}",
            self.base_url(),
            urlencoding::encode(&query.text),
            category
        );

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await
            .map_err(IndexerError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IndexerError::Api("Invalid Prowlarr API key".to_string()));
        }
        if !status.is_success() {
            return Err(IndexerError::Api(format!("HTTP {status}")));
        }

        let results: Vec<ProwlarrResult> = response
            .json()
            .await
            .map_err(|e| IndexerError::Parse(e.to_string()))?;

        let mut candidates = Vec::with_capacity(results.len());
        for result in results {
            let title = match result.title.clone().filter(|t| !t.is_empty()) {
                Some(t) => t,
                None => continue,
            };
            let raw_url = match result.url() {
                Some(u) => u,
                None => continue,
            };

            let protocol = result.protocol();
            let download_url = match protocol {
                Protocol::Torrent => match self.finalize_torrent_url(raw_url).await {
                    Some(u) => u,
                    None => continue,
                },
                Protocol::Usenet => raw_url,
            };

            let (seeders, age_secs) = match protocol {
                Protocol::Torrent => (result.seeders.unwrap_or(0), 0),
                Protocol::Usenet => (0, (result.ageMinutes.unwrap_or(0.0) * 60.0) as u64),
            };

            candidates.push(Candidate {
                title,
                download_url,
                protocol,
                size_bytes: result.size.unwrap_or(0),
                seeders,
                age_secs,
                flags: result
                    .indexerFlags
                    .clone()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|f| f.to_lowercase())
                    .collect(),
                indexer: "prowlarr".to_string(),
                score: 0,
            });
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_json(json: &str) -> ProwlarrResult {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_result_url_preference() {
        let r = result_json(
            r#"{"downloadUrl": "https://d", "magnetUrl": "magnet:?xt=a", "guid": "g"}"#,
        );
        assert_eq!(r.url().as_deref(), Some("https://d"));

        let r = result_json(r#"{"magnetUrl": "magnet:?xt=a", "guid": "g"}"#);
        assert_eq!(r.url().as_deref(), Some("magnet:?xt=a"));

        let r = result_json(r#"{"guid": "g"}"#);
        assert_eq!(r.url().as_deref(), Some("g"));

        let r = result_json(r#"{"downloadUrl": ""}"#);
        assert_eq!(r.url(), None);
    }

    #[test]
    fn test_result_url_empty_field_falls_through() {
        let r = result_json(r#"{"downloadUrl": "", "magnetUrl": "magnet:?xt=a", "guid": "g"}"#);
        assert_eq!(r.url().as_deref(), Some("magnet:?xt=a"));

        let r = result_json(r#"{"downloadUrl": "", "magnetUrl": "", "guid": "g"}"#);
        assert_eq!(r.url().as_deref(), Some("g"));
    }

    #[test]
    fn test_result_protocol_default_torrent() {
        assert_eq!(result_json(r#"{}"#).protocol(), Protocol::Torrent);
        assert_eq!(
            result_json(r#"{"protocol": "usenet"}"#).protocol(),
            Protocol::Usenet
        );
        assert_eq!(
            result_json(r#"{"protocol": "torrent"}"#).protocol(),
            Protocol::Torrent
        );
    }

    #[test]
    fn test_usenet_age_from_minutes() {
        let r = result_json(r#"{"protocol": "usenet", "ageMinutes": 90.0}"#);
        let age_secs = (r.ageMinutes.unwrap() * 60.0) as u64;
        assert_eq!(age_secs, 5400);
    }
}
