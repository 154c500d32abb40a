//! Fan-out search across all configured indexer adapters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, warn};

use crate::metrics;

use super::{Candidate, Indexer, IndexerError, SearchOutcome, SearchQuery};

/// Runs a query against every adapter concurrently, with a per-adapter
/// timeout. Adapter failures never abort the search; they are reported in
/// the outcome's error map instead.
pub struct SearchAggregator {
    adapters: Vec<Arc<dyn Indexer>>,
    adapter_timeout: Duration,
}

impl SearchAggregator {
    /// Create an aggregator over the given adapters.
    ///
    /// Adapter order is significant: results are concatenated in this order
    /// regardless of which adapter answers first, so the output is
    /// deterministic for a given set of adapter responses.
    pub fn new(adapters: Vec<Arc<dyn Indexer>>, adapter_timeout: Duration) -> Self {
        Self {
            adapters,
            adapter_timeout,
        }
    }

    /// Execute the query on all adapters.
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        let start = Instant::now();

        let futures: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                async move {
                    let name = adapter.name().to_string();
                    let result =
                        match tokio::time::timeout(self.adapter_timeout, adapter.search(query))
                            .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(IndexerError::Timeout),
                        };
                    (name, result)
                }
            })
            .collect();

        let results = join_all(futures).await;

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut indexer_errors = HashMap::new();

        for (name, result) in results {
            match result {
                Ok(found) => {
                    debug!(adapter = %name, count = found.len(), "Adapter search complete");
                    metrics::SEARCHES
                        .with_label_values(&[name.as_str(), "ok"])
                        .inc();
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!(adapter = %name, error = %e, "Adapter search failed");
                    metrics::SEARCHES
                        .with_label_values(&[name.as_str(), "error"])
                        .inc();
                    indexer_errors.insert(name, e.to_string());
                }
            }
        }

        metrics::SEARCH_RESULTS
            .with_label_values(&[])
            .observe(candidates.len() as f64);

        SearchOutcome {
            candidates,
            indexer_errors,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::Protocol;
    use crate::testing::MockIndexer;

    fn candidate(title: &str, indexer: &str) -> Candidate {
        Candidate {
            title: title.to_string(),
            download_url: "magnet:?xt=urn:btih:abc".to_string(),
            protocol: Protocol::Torrent,
            size_bytes: 1,
            seeders: 1,
            age_secs: 0,
            flags: vec![],
            indexer: indexer.to_string(),
            score: 0,
        }
    }

    #[tokio::test]
    async fn test_results_in_adapter_order() {
        let first = MockIndexer::new("first").with_results(vec![candidate("a", "first")]);
        let second = MockIndexer::new("second").with_results(vec![candidate("b", "second")]);
        // Delay the first adapter so the second completes before it.
        first.set_delay(Duration::from_millis(50)).await;

        let aggregator = SearchAggregator::new(
            vec![Arc::new(first), Arc::new(second)],
            Duration::from_secs(5),
        );
        let outcome = aggregator
            .search(&SearchQuery::text_only("x", true))
            .await;

        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[0].indexer, "first");
        assert_eq!(outcome.candidates[1].indexer, "second");
        assert!(outcome.indexer_errors.is_empty());
    }

    #[tokio::test]
    async fn test_failed_adapter_is_isolated() {
        let ok = MockIndexer::new("ok").with_results(vec![candidate("a", "ok")]);
        let broken = MockIndexer::new("broken");
        broken
            .set_next_error(IndexerError::Connection("refused".to_string()))
            .await;

        let aggregator = SearchAggregator::new(
            vec![Arc::new(broken), Arc::new(ok)],
            Duration::from_secs(5),
        );
        let outcome = aggregator
            .search(&SearchQuery::text_only("x", true))
            .await;

        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].indexer, "ok");
        assert!(outcome.indexer_errors.contains_key("broken"));
    }

    #[tokio::test]
    async fn test_slow_adapter_times_out() {
        let slow = MockIndexer::new("slow").with_results(vec![candidate("a", "slow")]);
        slow.set_delay(Duration::from_secs(60)).await;
        let fast = MockIndexer::new("fast").with_results(vec![candidate("b", "fast")]);

        let aggregator = SearchAggregator::new(
            vec![Arc::new(slow), Arc::new(fast)],
            Duration::from_millis(50),
        );
        let outcome = aggregator
            .search(&SearchQuery::text_only("x", true))
            .await;

        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].indexer, "fast");
        assert_eq!(
            outcome.indexer_errors.get("slow").map(String::as_str),
            Some("Request timeout")
        );
    }

    #[tokio::test]
    async fn test_all_adapters_failing_yields_empty_outcome() {
        let broken = MockIndexer::new("broken");
        broken
            .set_next_error(IndexerError::Api("boom".to_string()))
            .await;

        let aggregator =
            SearchAggregator::new(vec![Arc::new(broken)], Duration::from_secs(5));
        let outcome = aggregator
            .search(&SearchQuery::text_only("x", true))
            .await;

        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.indexer_errors.len(), 1);
    }
}
