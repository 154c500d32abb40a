//! Import reconciliation: matching finished download payloads to library
//! layouts and placing files.

pub mod files;
mod place;
mod reconciler;
mod types;

pub use place::place_file;
pub use reconciler::ImportReconciler;
pub use types::{ImportError, ImportTarget, ImportTargetResolver};
