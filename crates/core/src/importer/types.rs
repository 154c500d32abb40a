//! Types for the import reconciler.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::download::Download;

/// Errors from an import attempt. Contained per job; a failed import leaves
/// the job unimported for the next tick.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Some expected episodes were placed, others had no matching file yet.
    #[error("Import incomplete, missing episodes: {missing:?}")]
    Partial { missing: Vec<u32> },

    /// The job cannot be imported yet (payload not deposited, no library
    /// match). Retried silently on the next tick.
    #[error("Not ready to import: {0}")]
    Pending(String),

    #[error("No importable files found: {0}")]
    NoFilesMatched(String),

    #[error("Import target resolution failed: {0}")]
    Resolver(String),

    #[error("IO error during import: {0}")]
    Io(#[from] std::io::Error),
}

/// Expected library layout for a finished download, resolved by the library
/// layer.
#[derive(Debug, Clone)]
pub enum ImportTarget {
    /// A TV season: every listed episode is expected somewhere in the
    /// download.
    Season {
        /// Show directory in the library.
        root: PathBuf,
        season: u32,
        /// Episode numbers the library expects from this download.
        episodes: Vec<u32>,
    },
    /// A single movie file, renamed to the given stem.
    Movie { root: PathBuf, file_stem: String },
    /// Audio content; files keep their names.
    Audio { root: PathBuf },
    /// Book content; files keep their names.
    Book { root: PathBuf },
}

/// Boundary to the library layer: maps a finished download onto the layout
/// the library expects.
#[async_trait]
pub trait ImportTargetResolver: Send + Sync {
    /// Resolve the target for a download, or `None` when the download does
    /// not belong to any library item.
    async fn resolve(&self, download: &Download) -> Result<Option<ImportTarget>, ImportError>;
}
