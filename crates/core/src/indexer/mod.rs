//! Indexer search: adapters, Torznab parsing, and the fan-out aggregator.

mod aggregator;
mod jackett;
mod prowlarr;
pub mod torznab;
mod types;

pub use aggregator::SearchAggregator;
pub use jackett::JackettAdapter;
pub use prowlarr::ProwlarrAdapter;
pub use types::{
    Candidate, Indexer, IndexerError, Protocol, SearchHints, SearchOutcome, SearchQuery,
};
