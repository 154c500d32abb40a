//! Types for the indexer search system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::classifier::{self, Quality};

/// Transport protocol of a search result. Immutable for a candidate's
/// lifetime and determines which backend family can accept it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Torrent,
    Usenet,
}

/// Structured hints passed alongside the free-text query. Adapters use
/// whichever hints the remote indexer advertises support for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHints {
    /// IMDb id including the "tt" prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// External metadata provider ("tvdb", "tmdb").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_provider: Option<String>,
    /// Id within the external provider's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Season number, for season-scoped TV searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
}

/// Query parameters for an indexer search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text search query.
    pub text: String,
    /// TV search when true, movie search otherwise.
    pub is_tv: bool,
    /// Structured hints (ids, season).
    #[serde(default)]
    pub hints: SearchHints,
}

impl SearchQuery {
    /// Plain text query with no hints.
    pub fn text_only(text: impl Into<String>, is_tv: bool) -> Self {
        Self {
            text: text.into(),
            is_tv,
            hints: SearchHints::default(),
        }
    }
}

/// A single release offered by an indexer.
///
/// Quality, seasons and episodes are derived from the title on demand rather
/// than stored, so they can never drift from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Release title as published by the indexer.
    pub title: String,
    /// Magnet URI, .torrent URL, or NZB URL depending on protocol.
    pub download_url: String,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Size in bytes (0 if unreported).
    pub size_bytes: u64,
    /// Seeders; always 0 for usenet results.
    pub seeders: u32,
    /// Seconds since the post date; always 0 for torrent results.
    pub age_secs: u64,
    /// Indexer-reported flags ("freeleech", "doubleupload", ...).
    #[serde(default)]
    pub flags: Vec<String>,
    /// Which indexer returned this result.
    pub indexer: String,
    /// Accumulated rule score. 0 until scoring runs.
    #[serde(default)]
    pub score: i64,
}

impl Candidate {
    /// Quality tier parsed from the title.
    pub fn quality(&self) -> Quality {
        classifier::quality(&self.title)
    }

    /// Season numbers parsed from the title.
    pub fn seasons(&self) -> Vec<u32> {
        classifier::seasons(&self.title)
    }

    /// Episode numbers parsed from the title (empty for season packs).
    pub fn episodes(&self) -> Vec<u32> {
        classifier::episodes(&self.title)
    }
}

/// Aggregated search result with per-indexer error reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Candidates in adapter-declaration order.
    pub candidates: Vec<Candidate>,
    /// Adapters that failed (name -> error message). Partial results are
    /// normal; an entry here never aborts the search.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub indexer_errors: HashMap<String, String>,
    /// How long the fan-out took in milliseconds.
    pub duration_ms: u64,
}

/// Errors from a single indexer adapter.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Indexer connection failed: {0}")]
    Connection(String),

    #[error("Indexer API error: {0}")]
    Api(String),

    #[error("Capability negotiation failed: {0}")]
    Capabilities(String),

    #[error("Malformed indexer response: {0}")]
    Parse(String),

    #[error("Request timeout")]
    Timeout,
}

impl IndexerError {
    /// Map a reqwest failure onto the adapter error taxonomy.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IndexerError::Timeout
        } else if e.is_connect() {
            IndexerError::Connection(e.to_string())
        } else {
            IndexerError::Api(e.to_string())
        }
    }
}

/// Trait for indexer search adapters.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Adapter name for logging and error maps.
    fn name(&self) -> &str;

    /// Execute a search against the remote indexer.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, IndexerError>;
}
