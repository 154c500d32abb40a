//! Debrid providers and the cache gate in front of them.

mod gate;
mod rate_limit;
mod realdebrid;
mod torbox;
mod types;

pub use gate::{DebridCacheGate, GateStatus};
pub use rate_limit::IntervalLimiter;
pub use realdebrid::RealDebridClient;
pub use torbox::TorBoxClient;
pub use types::{
    magnet_from_hash, DebridError, DebridProvider, RemoteFile, RemoteState, RemoteTorrent,
};
