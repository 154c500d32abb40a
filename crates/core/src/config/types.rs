use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::classifier::ScoringRuleSet;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub directories: DirectoriesConfig,
    #[serde(default)]
    pub indexers: IndexersConfig,
    pub download: DownloadConfig,
    #[serde(default)]
    pub debrid: DebridConfig,
    #[serde(default)]
    pub import: ImportConfig,
    /// Scoring rulesets applied during candidate ranking.
    #[serde(default)]
    pub scoring: Vec<ScoringRuleSet>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mediarr.db")
}

/// Filesystem layout shared by backends and the importer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoriesConfig {
    /// Where download backends deposit finished payloads.
    #[serde(default = "default_download_dir")]
    pub downloads: PathBuf,
    /// Where the debrid gate stages fetched files.
    #[serde(default = "default_staging_dir")]
    pub staging: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            downloads: default_download_dir(),
            staging: default_staging_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/downloads")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("/downloads/staging")
}

/// Indexer layer configuration. Both adapters may be active at once; the
/// aggregator fans out to every configured one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndexersConfig {
    #[serde(default)]
    pub jackett: Option<JackettConfig>,
    #[serde(default)]
    pub prowlarr: Option<ProwlarrConfig>,
    /// Per-adapter budget for one aggregated search (default: 60)
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u32,
}

fn default_search_timeout() -> u32 {
    60
}

/// Jackett indexer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    /// Configured indexer slugs to query (e.g., "1337x")
    pub indexers: Vec<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Prowlarr indexer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProwlarrConfig {
    /// Prowlarr server URL (e.g., "http://localhost:9696")
    pub url: String,
    /// Prowlarr API key
    pub api_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Resolve indirect download URLs to their final location (default: true)
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    /// Drop candidates whose download URL cannot be resolved (default: false)
    #[serde(default)]
    pub reject_on_url_error: bool,
}

/// Download backend selection plus per-backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Active backend
    pub backend: DownloadBackend,
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
    #[serde(default)]
    pub transmission: Option<TransmissionConfig>,
    #[serde(default)]
    pub sabnzbd: Option<SabnzbdConfig>,
    #[serde(default)]
    pub nzbget: Option<NzbgetConfig>,
}

/// Available download backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloadBackend {
    Qbittorrent,
    Transmission,
    Sabnzbd,
    Nzbget,
    Debrid,
}

/// qBittorrent backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// WebUI URL (e.g., "http://localhost:8080")
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Override save path per submission
    #[serde(default)]
    pub download_path: Option<String>,
}

/// Transmission backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmissionConfig {
    /// RPC URL base (e.g., "http://localhost:9091")
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Override download-dir per submission
    #[serde(default)]
    pub download_path: Option<String>,
}

/// SABnzbd backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SabnzbdConfig {
    /// API URL base (e.g., "http://localhost:8080")
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// NZBGet backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NzbgetConfig {
    /// JSON-RPC URL base (e.g., "http://localhost:6789")
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Debrid provider configuration. Provider order here is failover order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DebridConfig {
    #[serde(default)]
    pub realdebrid: Option<RealDebridConfig>,
    #[serde(default)]
    pub torbox: Option<TorBoxConfig>,
}

/// Real-Debrid provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealDebridConfig {
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Minimum seconds between API calls (default: 2)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: u32,
}

/// TorBox provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorBoxConfig {
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Minimum seconds between API calls (default: 2)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: u32,
}

/// Import reconciler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Seconds between reconciliation passes (default: 60)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u32,
    /// Compare checksums after a copy fallback (default: false)
    #[serde(default)]
    pub verify_copies: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            verify_copies: false,
        }
    }
}

fn default_tick_interval() -> u32 {
    60
}

fn default_timeout() -> u32 {
    30
}

fn default_rate_limit() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub database: DatabaseConfig,
    pub directories: DirectoriesConfig,
    pub download_backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jackett: Option<SanitizedServiceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prowlarr: Option<SanitizedServiceConfig>,
    pub debrid_providers: Vec<String>,
}

/// Sanitized upstream service config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServiceConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let mut debrid_providers = Vec::new();
        if config.debrid.realdebrid.is_some() {
            debrid_providers.push("realdebrid".to_string());
        }
        if config.debrid.torbox.is_some() {
            debrid_providers.push("torbox".to_string());
        }

        Self {
            database: config.database.clone(),
            directories: config.directories.clone(),
            download_backend: match config.download.backend {
                DownloadBackend::Qbittorrent => "qbittorrent".to_string(),
                DownloadBackend::Transmission => "transmission".to_string(),
                DownloadBackend::Sabnzbd => "sabnzbd".to_string(),
                DownloadBackend::Nzbget => "nzbget".to_string(),
                DownloadBackend::Debrid => "debrid".to_string(),
            },
            jackett: config
                .indexers
                .jackett
                .as_ref()
                .map(|j| SanitizedServiceConfig {
                    url: j.url.clone(),
                    api_key_configured: !j.api_key.is_empty(),
                    timeout_secs: j.timeout_secs,
                }),
            prowlarr: config
                .indexers
                .prowlarr
                .as_ref()
                .map(|p| SanitizedServiceConfig {
                    url: p.url.clone(),
                    api_key_configured: !p.api_key.is_empty(),
                    timeout_secs: p.timeout_secs,
                }),
            debrid_providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[download]
backend = "qbittorrent"

[download.qbittorrent]
url = "http://localhost:8080"
username = "admin"
password = "adminadmin"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.download.backend, DownloadBackend::Qbittorrent);
        assert_eq!(config.database.path.to_str().unwrap(), "mediarr.db");
        assert_eq!(config.directories.downloads.to_str().unwrap(), "/downloads");
        assert!(config.indexers.jackett.is_none());

        let qb = config.download.qbittorrent.unwrap();
        assert_eq!(qb.timeout_secs, 30); // default
        assert!(qb.download_path.is_none());
    }

    #[test]
    fn test_deserialize_missing_download_fails() {
        let toml = r#"
[database]
path = "/data/mediarr.db"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_indexers() {
        let toml = r#"
[download]
backend = "debrid"

[indexers.jackett]
url = "http://localhost:9117"
api_key = "jackett-key"
indexers = ["1337x", "nyaa"]

[indexers.prowlarr]
url = "http://localhost:9696"
api_key = "prowlarr-key"
follow_redirects = false
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let jackett = config.indexers.jackett.unwrap();
        assert_eq!(jackett.indexers, vec!["1337x", "nyaa"]);
        assert_eq!(jackett.timeout_secs, 30);

        let prowlarr = config.indexers.prowlarr.unwrap();
        assert!(!prowlarr.follow_redirects);
        assert!(!prowlarr.reject_on_url_error);
    }

    #[test]
    fn test_deserialize_debrid_providers() {
        let toml = r#"
[download]
backend = "debrid"

[debrid.realdebrid]
api_key = "rd-key"

[debrid.torbox]
api_key = "tb-key"
rate_limit_secs = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let rd = config.debrid.realdebrid.unwrap();
        assert_eq!(rd.rate_limit_secs, 2); // default
        let tb = config.debrid.torbox.unwrap();
        assert_eq!(tb.rate_limit_secs, 5);
    }

    #[test]
    fn test_deserialize_scoring_rulesets() {
        let toml = r#"
[download]
backend = "transmission"

[download.transmission]
url = "http://localhost:9091"

[[scoring]]
name = "prefer-web"
libraries = ["ALL_TV"]

[[scoring.rules]]
name = "web-dl"
keywords = ["WEB-DL", "WEBRip"]
score_modifier = 10

[[scoring.rules]]
name = "freeleech"
flags = ["freeleech"]
score_modifier = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scoring.len(), 1);
        assert_eq!(config.scoring[0].rules.len(), 2);
        assert_eq!(config.scoring[0].rules[0].keywords.len(), 2);
        assert!(config.scoring[0].rules[1].keywords.is_empty());
    }

    #[test]
    fn test_sanitized_config() {
        let toml = r#"
[download]
backend = "debrid"

[indexers.jackett]
url = "http://localhost:9117"
api_key = "secret"
indexers = ["1337x"]

[debrid.realdebrid]
api_key = "rd-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        assert_eq!(sanitized.download_backend, "debrid");
        let jackett = sanitized.jackett.unwrap();
        assert_eq!(jackett.url, "http://localhost:9117");
        assert!(jackett.api_key_configured); // key is hidden, just shows if configured
        assert!(sanitized.prowlarr.is_none());
        assert_eq!(sanitized.debrid_providers, vec!["realdebrid"]);
    }
}
