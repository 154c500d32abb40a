//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Indexer searches (per indexer, per result)
//! - Download backends (submissions)
//! - Debrid cache gate (cache checks, failovers)
//! - Import reconciler (import outcomes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Indexer Metrics
// =============================================================================

/// Searches issued per indexer adapter by result.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarr_searches_total", "Total indexer searches"),
        &["indexer", "result"], // result: "ok", "error"
    )
    .unwrap()
});

/// Candidates returned per aggregated search.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediarr_search_results",
            "Number of candidates returned per aggregated search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Download Backend Metrics
// =============================================================================

/// Submissions accepted by download backends.
pub static SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarr_submissions_total",
            "Total candidate submissions accepted by download backends",
        ),
        &["backend"],
    )
    .unwrap()
});

// =============================================================================
// Debrid Metrics
// =============================================================================

/// Debrid cache checks per provider by outcome.
pub static DEBRID_CACHE_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarr_debrid_cache_checks_total",
            "Total debrid cache checks",
        ),
        &["provider", "outcome"], // outcome: "hit", "miss", "auth_error"
    )
    .unwrap()
});

/// Provider failovers after a rate-limited cache check.
pub static DEBRID_FAILOVERS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediarr_debrid_failovers_total",
        "Total debrid provider failovers",
    )
    .unwrap()
});

// =============================================================================
// Import Metrics
// =============================================================================

/// Import attempts by result.
pub static IMPORTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarr_imports_total", "Total import attempts"),
        &["result"], // "complete", "partial", "failed"
    )
    .unwrap()
});

/// Files placed into libraries.
pub static FILES_PLACED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediarr_files_placed_total",
        "Total files placed into libraries",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SEARCHES.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(SUBMISSIONS.clone()),
        Box::new(DEBRID_CACHE_CHECKS.clone()),
        Box::new(DEBRID_FAILOVERS.clone()),
        Box::new(IMPORTS.clone()),
        Box::new(FILES_PLACED.clone()),
    ]
}
