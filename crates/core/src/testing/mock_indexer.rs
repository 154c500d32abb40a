//! Mock indexer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::indexer::{Candidate, Indexer, IndexerError, SearchQuery};

/// Mock implementation of the Indexer trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable candidates
/// - Track issued queries for assertions
/// - Simulate failures and slow responses
pub struct MockIndexer {
    name: String,
    /// Candidates returned by every search.
    results: Arc<RwLock<Vec<Candidate>>>,
    /// Queries recorded for assertions.
    queries: Arc<RwLock<Vec<SearchQuery>>>,
    /// If set, the next search fails with this error (consumed once).
    next_error: Arc<RwLock<Option<IndexerError>>>,
    /// Artificial latency applied to every search.
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MockIndexer {
    /// Create a new mock indexer with empty results.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Arc::new(RwLock::new(Vec::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Builder: set the candidates every search returns.
    pub fn with_results(mut self, results: Vec<Candidate>) -> Self {
        self.results = Arc::new(RwLock::new(results));
        self
    }

    /// Replace the configured candidates.
    pub async fn set_results(&self, results: Vec<Candidate>) {
        *self.results.write().await = results;
    }

    /// Make the next search fail with the given error.
    pub async fn set_next_error(&self, error: IndexerError) {
        *self.next_error.write().await = Some(error);
    }

    /// Add latency to every search.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Queries issued so far.
    pub async fn recorded_queries(&self) -> Vec<SearchQuery> {
        self.queries.read().await.clone()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, IndexerError> {
        self.queries.write().await.push(query.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self.results.read().await.clone())
    }
}
