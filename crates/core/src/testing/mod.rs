//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the external service traits,
//! allowing comprehensive E2E testing without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediarr_core::testing::{fixtures, MockDebridProvider, MockIndexer};
//!
//! let indexer = MockIndexer::new("mock")
//!     .with_results(vec![fixtures::tv_candidate("Show", 1, 1, "abc123")]);
//! let provider = MockDebridProvider::new("mock");
//! provider.set_cached(true).await;
//! ```

mod mock_debrid;
mod mock_download_client;
mod mock_indexer;

pub use mock_debrid::MockDebridProvider;
pub use mock_download_client::MockDownloadClient;
pub use mock_indexer::MockIndexer;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::indexer::{Candidate, Protocol};

    /// Create a test torrent candidate with reasonable defaults.
    pub fn torrent_candidate(title: &str, info_hash: &str) -> Candidate {
        Candidate {
            title: title.to_string(),
            download_url: format!("magnet:?xt=urn:btih:{}", info_hash),
            protocol: Protocol::Torrent,
            size_bytes: 1024 * 1024 * 100, // 100 MB
            seeders: 50,
            age_secs: 0,
            flags: vec![],
            indexer: "mock-indexer".to_string(),
            score: 0,
        }
    }

    /// Create a test candidate for a TV episode.
    pub fn tv_candidate(show: &str, season: u32, episode: u32, info_hash: &str) -> Candidate {
        torrent_candidate(
            &format!("{show}.S{season:02}E{episode:02}.1080p.WEB-DL"),
            info_hash,
        )
    }

    /// Create a test candidate for a movie.
    pub fn movie_candidate(title: &str, year: u32, info_hash: &str) -> Candidate {
        let mut candidate =
            torrent_candidate(&format!("{title}.{year}.1080p.BluRay"), info_hash);
        candidate.size_bytes = 1024 * 1024 * 1024 * 4; // 4 GB
        candidate
    }

    /// Create a test usenet candidate.
    pub fn usenet_candidate(title: &str, age_secs: u64) -> Candidate {
        Candidate {
            title: title.to_string(),
            download_url: format!("https://indexer.example/dl/{title}.nzb"),
            protocol: Protocol::Usenet,
            size_bytes: 1024 * 1024 * 800,
            seeders: 0,
            age_secs,
            flags: vec![],
            indexer: "mock-indexer".to_string(),
            score: 0,
        }
    }
}
