//! Configuration-driven construction of pipeline components.
//!
//! The caller owns scheduling and wiring; these builders only turn a
//! validated [`Config`] into ready components. Backend selection happens
//! here and nowhere else.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{Config, ConfigError, DownloadBackend};
use crate::debrid::{
    DebridCacheGate, DebridProvider, IntervalLimiter, RealDebridClient, TorBoxClient,
};
use crate::download::{
    DebridDownloadClient, DownloadClient, NzbgetClient, QBittorrentClient, SabnzbdClient,
    TransmissionClient,
};
use crate::indexer::{Indexer, JackettAdapter, ProwlarrAdapter, SearchAggregator};

/// Build the search aggregator over every configured indexer adapter.
///
/// An empty indexer section yields an aggregator that answers every query
/// with an empty result set.
pub fn build_aggregator(config: &Config) -> SearchAggregator {
    let mut adapters: Vec<Arc<dyn Indexer>> = Vec::new();

    if let Some(jackett) = &config.indexers.jackett {
        info!(url = %jackett.url, "Initializing Jackett adapter");
        adapters.push(Arc::new(JackettAdapter::new(jackett.clone())));
    }

    if let Some(prowlarr) = &config.indexers.prowlarr {
        info!(url = %prowlarr.url, "Initializing Prowlarr adapter");
        adapters.push(Arc::new(ProwlarrAdapter::new(prowlarr.clone())));
    }

    SearchAggregator::new(
        adapters,
        Duration::from_secs(config.indexers.search_timeout_secs as u64),
    )
}

/// Build the debrid cache gate with providers in priority order.
///
/// Real-Debrid ranks before TorBox when both are configured. Each provider
/// gets its own call limiter, shared by every call site through the client.
pub fn build_debrid_gate(config: &Config) -> Result<Arc<DebridCacheGate>, ConfigError> {
    let mut providers: Vec<Arc<dyn DebridProvider>> = Vec::new();

    if let Some(realdebrid) = &config.debrid.realdebrid {
        info!("Initializing Real-Debrid provider");
        let limiter = Arc::new(IntervalLimiter::new(Duration::from_secs(
            realdebrid.rate_limit_secs as u64,
        )));
        providers.push(Arc::new(RealDebridClient::new(realdebrid.clone(), limiter)));
    }

    if let Some(torbox) = &config.debrid.torbox {
        info!("Initializing TorBox provider");
        let limiter = Arc::new(IntervalLimiter::new(Duration::from_secs(
            torbox.rate_limit_secs as u64,
        )));
        providers.push(Arc::new(TorBoxClient::new(torbox.clone(), limiter)));
    }

    if providers.is_empty() {
        return Err(ConfigError::ValidationError(
            "Debrid gate requires at least one configured provider".to_string(),
        ));
    }

    Ok(Arc::new(DebridCacheGate::new(
        providers,
        config.directories.staging.clone(),
    )))
}

/// Build the download client selected by `[download] backend`.
pub fn build_download_client(config: &Config) -> Result<Arc<dyn DownloadClient>, ConfigError> {
    let client: Arc<dyn DownloadClient> = match config.download.backend {
        DownloadBackend::Qbittorrent => {
            let settings = config.download.qbittorrent.as_ref().ok_or_else(|| {
                missing_backend_settings("qbittorrent", "[download.qbittorrent]")
            })?;
            info!(url = %settings.url, "Initializing qBittorrent client");
            Arc::new(QBittorrentClient::new(settings.clone()))
        }
        DownloadBackend::Transmission => {
            let settings = config.download.transmission.as_ref().ok_or_else(|| {
                missing_backend_settings("transmission", "[download.transmission]")
            })?;
            info!(url = %settings.url, "Initializing Transmission client");
            Arc::new(TransmissionClient::new(settings.clone()))
        }
        DownloadBackend::Sabnzbd => {
            let settings = config
                .download
                .sabnzbd
                .as_ref()
                .ok_or_else(|| missing_backend_settings("sabnzbd", "[download.sabnzbd]"))?;
            info!(url = %settings.url, "Initializing SABnzbd client");
            Arc::new(SabnzbdClient::new(settings.clone()))
        }
        DownloadBackend::Nzbget => {
            let settings = config
                .download
                .nzbget
                .as_ref()
                .ok_or_else(|| missing_backend_settings("nzbget", "[download.nzbget]"))?;
            info!(url = %settings.url, "Initializing NZBGet client");
            Arc::new(NzbgetClient::new(settings.clone()))
        }
        DownloadBackend::Debrid => {
            let gate = build_debrid_gate(config)?;
            info!("Initializing debrid download client");
            Arc::new(DebridDownloadClient::new(gate))
        }
    };

    Ok(client)
}

fn missing_backend_settings(backend: &str, table: &str) -> ConfigError {
    ConfigError::ValidationError(format!(
        "Download backend '{backend}' selected but {table} is missing"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::indexer::SearchQuery;

    #[test]
    fn test_build_qbittorrent_client() {
        let config = load_config_from_str(
            r#"
            [download]
            backend = "qbittorrent"

            [download.qbittorrent]
            url = "http://localhost:8080"
            username = "admin"
            password = "secret"
            "#,
        )
        .unwrap();

        let client = build_download_client(&config).unwrap();
        assert_eq!(client.name(), "qbittorrent");
    }

    #[test]
    fn test_build_debrid_client_with_provider() {
        let config = load_config_from_str(
            r#"
            [download]
            backend = "debrid"

            [debrid.realdebrid]
            api_key = "rd-key"
            "#,
        )
        .unwrap();

        let client = build_download_client(&config).unwrap();
        assert_eq!(client.name(), "debrid");
    }

    #[test]
    fn test_missing_backend_settings_rejected() {
        let config = load_config_from_str(
            r#"
            [download]
            backend = "sabnzbd"
            "#,
        )
        .unwrap();

        match build_download_client(&config) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("sabnzbd")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected missing settings to be rejected"),
        }
    }

    #[test]
    fn test_debrid_without_providers_rejected() {
        let config = load_config_from_str(
            r#"
            [download]
            backend = "debrid"
            "#,
        )
        .unwrap();

        assert!(build_debrid_gate(&config).is_err());
    }

    #[tokio::test]
    async fn test_empty_aggregator_returns_no_results() {
        let config = load_config_from_str(
            r#"
            [download]
            backend = "qbittorrent"
            "#,
        )
        .unwrap();
        let aggregator = build_aggregator(&config);

        let outcome = aggregator
            .search(&SearchQuery {
                text: "anything".to_string(),
                is_tv: false,
                hints: Default::default(),
            })
            .await;

        assert!(outcome.candidates.is_empty());
        assert!(outcome.indexer_errors.is_empty());
    }
}
