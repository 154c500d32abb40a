use super::{types::Config, ConfigError};
use super::types::DownloadBackend;

/// Validate configuration
/// Currently validates:
/// - The selected download backend has its settings table
/// - The debrid backend has at least one provider
/// - Jackett has at least one indexer slug
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let backend_configured = match config.download.backend {
        DownloadBackend::Qbittorrent => config.download.qbittorrent.is_some(),
        DownloadBackend::Transmission => config.download.transmission.is_some(),
        DownloadBackend::Sabnzbd => config.download.sabnzbd.is_some(),
        DownloadBackend::Nzbget => config.download.nzbget.is_some(),
        DownloadBackend::Debrid => {
            config.debrid.realdebrid.is_some() || config.debrid.torbox.is_some()
        }
    };
    if !backend_configured {
        return Err(ConfigError::ValidationError(format!(
            "download backend {:?} selected but not configured",
            config.download.backend
        )));
    }

    if let Some(jackett) = &config.indexers.jackett {
        if jackett.indexers.is_empty() {
            return Err(ConfigError::ValidationError(
                "indexers.jackett.indexers cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
