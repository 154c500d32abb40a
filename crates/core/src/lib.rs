pub mod classifier;
pub mod config;
pub mod debrid;
pub mod download;
pub mod factory;
pub mod importer;
pub mod indexer;
pub mod jobs;
pub mod metrics;
pub mod notify;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
