//! Download backends behind a uniform client interface.

mod debrid;
pub mod hash;
mod nzbget;
mod qbittorrent;
mod sabnzbd;
mod transmission;
mod types;

pub use debrid::DebridDownloadClient;
pub use nzbget::NzbgetClient;
pub use qbittorrent::QBittorrentClient;
pub use sabnzbd::SabnzbdClient;
pub use transmission::TransmissionClient;
pub use types::{Download, DownloadClient, DownloadError, DownloadStatus};
