//! Jackett indexer adapter.
//!
//! Jackett multiplexes many trackers behind per-indexer Torznab endpoints.
//! Each configured sub-indexer advertises its own capabilities, so the
//! adapter negotiates `t=caps` once per sub-indexer and only sends the
//! parameters that indexer understands.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::JackettConfig;

use super::torznab::{self, TorznabCaps};
use super::{Candidate, Indexer, IndexerError, SearchQuery};

/// Jackett search adapter.
pub struct JackettAdapter {
    client: Client,
    config: JackettConfig,
    /// Per-sub-indexer capability cache, filled on first use.
    caps: RwLock<HashMap<String, TorznabCaps>>,
}

impl JackettAdapter {
    /// Create a new Jackett adapter.
    pub fn new(config: JackettConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            caps: RwLock::new(HashMap::new()),
        }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn api_url(&self, indexer: &str) -> String {
        format!(
            "{}/api/v2.0/indexers/{}/results/torznab/api",
            self.base_url(),
            indexer
        )
    }

    /// Fetch capabilities for a sub-indexer, using the cache when possible.
    async fn capabilities(&self, indexer: &str) -> Result<TorznabCaps, IndexerError> {
        {
            let cache = self.caps.read().await;
            if let Some(caps) = cache.get(indexer) {
                return Ok(caps.clone());
            }
        }

        let url = format!(
            "{}?apikey={}&t=caps",
            self.api_url(indexer),
            urlencoding::encode(&self.config.api_key)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(IndexerError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(IndexerError::Capabilities(format!(
                "HTTP {} from {}",
                response.status(),
                indexer
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IndexerError::Capabilities(e.to_string()))?;

        let caps = torznab::parse_caps(&body)?;
        debug!(
            indexer,
            tv = caps.tv_search.available,
            movie = caps.movie_search.available,
            "Negotiated indexer capabilities"
        );

        let mut cache = self.caps.write().await;
        cache.insert(indexer.to_string(), caps.clone());
        Ok(caps)
    }

    /// Query a single sub-indexer.
    async fn search_one(
        &self,
        indexer: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Candidate>, IndexerError> {
        let caps = self.capabilities(indexer).await?;
        let url = format!(
            "{}?apikey={}&{}",
            self.api_url(indexer),
            urlencoding::encode(&self.config.api_key),
            build_search_params(query, &caps)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(IndexerError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(IndexerError::Api(format!(
                "HTTP {} from {}",
                response.status(),
                indexer
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IndexerError::Api(e.to_string()))?;

        let name = format!("jackett/{indexer}");
        torznab::parse_feed(&body, &name)
    }
}

/// Build the Torznab query string for one sub-indexer based on its
/// negotiated capabilities.
///
/// Id attributes are preferred over free text: `imdbid`, then `tvdbid`, then
/// `tmdbid`, falling back to `q`. The `season` parameter is only attached
/// when the indexer advertises it.
fn build_search_params(query: &SearchQuery, caps: &TorznabCaps) -> String {
    let mode = if query.is_tv {
        &caps.tv_search
    } else {
        &caps.movie_search
    };

    let mut params: Vec<(String, String)> = Vec::new();

    if !mode.available {
        // No structured search mode; plain keyword search.
        params.push(("t".to_string(), "search".to_string()));
        params.push(("q".to_string(), query.text.clone()));
        return encode_params(&params);
    }

    let t = if query.is_tv { "tvsearch" } else { "movie" };
    params.push(("t".to_string(), t.to_string()));

    let hints = &query.hints;
    let id_param = if mode.supports("imdbid") && hints.imdb_id.is_some() {
        hints
            .imdb_id
            .as_ref()
            .map(|id| ("imdbid".to_string(), id.clone()))
    } else if mode.supports("tvdbid") && hints.external_provider.as_deref() == Some("tvdb") {
        hints
            .external_id
            .as_ref()
            .map(|id| ("tvdbid".to_string(), id.clone()))
    } else if mode.supports("tmdbid") && hints.external_provider.as_deref() == Some("tmdb") {
        hints
            .external_id
            .as_ref()
            .map(|id| ("tmdbid".to_string(), id.clone()))
    } else {
        None
    };

    match id_param {
        Some(param) => params.push(param),
        None => params.push(("q".to_string(), query.text.clone())),
    }

    if let Some(season) = hints.season {
        if mode.supports("season") {
            params.push(("season".to_string(), season.to_string()));
        }
    }

    encode_params(&params)
}

fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait]
impl Indexer for JackettAdapter {
    fn name(&self) -> &str {
        "jackett"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, IndexerError> {
        let futures: Vec<_> = self
            .config
            .indexers
            .iter()
            .map(|indexer| async move { (indexer.as_str(), self.search_one(indexer, query).await) })
            .collect();

        let results = join_all(futures).await;

        let total = results.len();
        let mut candidates = Vec::new();
        let mut failures = Vec::new();

        for (indexer, result) in results {
            match result {
                Ok(found) => {
                    debug!(indexer, count = found.len(), "Sub-indexer results");
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!(indexer, error = %e, "Sub-indexer query failed");
                    failures.push(format!("{indexer}: {e}"));
                }
            }
        }

        // Partial failure is tolerated; total failure is not.
        if !failures.is_empty() && failures.len() == total {
            return Err(IndexerError::Api(format!(
                "All sub-indexers failed: {}",
                failures.join("; ")
            )));
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::torznab::SearchCaps;
    use crate::indexer::SearchHints;

    fn caps(tv_params: &[&str], movie_params: &[&str]) -> TorznabCaps {
        TorznabCaps {
            tv_search: SearchCaps {
                available: !tv_params.is_empty(),
                supported_params: tv_params.iter().map(|s| s.to_string()).collect(),
            },
            movie_search: SearchCaps {
                available: !movie_params.is_empty(),
                supported_params: movie_params.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn tv_query() -> SearchQuery {
        SearchQuery {
            text: "some show".to_string(),
            is_tv: true,
            hints: SearchHints {
                imdb_id: Some("tt0903747".to_string()),
                external_provider: Some("tvdb".to_string()),
                external_id: Some("81189".to_string()),
                season: Some(2),
            },
        }
    }

    #[test]
    fn test_params_prefer_imdbid() {
        let params = build_search_params(&tv_query(), &caps(&["q", "imdbid", "tvdbid"], &[]));
        assert!(params.contains("t=tvsearch"));
        assert!(params.contains("imdbid=tt0903747"));
        assert!(!params.contains("tvdbid"));
        assert!(!params.contains("q=some"));
    }

    #[test]
    fn test_params_fall_back_to_tvdbid() {
        let params = build_search_params(&tv_query(), &caps(&["q", "tvdbid"], &[]));
        assert!(params.contains("tvdbid=81189"));
        assert!(!params.contains("imdbid"));
    }

    #[test]
    fn test_params_fall_back_to_free_text() {
        let params = build_search_params(&tv_query(), &caps(&["q"], &[]));
        assert!(params.contains("q=some%20show"));
    }

    #[test]
    fn test_params_season_only_when_supported() {
        let with = build_search_params(&tv_query(), &caps(&["q", "season"], &[]));
        assert!(with.contains("season=2"));

        let without = build_search_params(&tv_query(), &caps(&["q"], &[]));
        assert!(!without.contains("season"));
    }

    #[test]
    fn test_params_movie_mode() {
        let query = SearchQuery {
            text: "a movie".to_string(),
            is_tv: false,
            hints: SearchHints {
                imdb_id: Some("tt0111161".to_string()),
                ..Default::default()
            },
        };
        let params = build_search_params(&query, &caps(&[], &["q", "imdbid"]));
        assert!(params.contains("t=movie"));
        assert!(params.contains("imdbid=tt0111161"));
    }

    #[test]
    fn test_params_unavailable_mode_uses_plain_search() {
        let params = build_search_params(&tv_query(), &caps(&[], &["q"]));
        assert!(params.contains("t=search"));
        assert!(params.contains("q=some%20show"));
        assert!(!params.contains("imdbid"));
    }
}
