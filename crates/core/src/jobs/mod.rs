//! Persistent tracking of acquisition jobs.

mod sqlite_store;
mod store;

pub use sqlite_store::SqliteJobStore;
pub use store::{JobStore, JobStoreError};
