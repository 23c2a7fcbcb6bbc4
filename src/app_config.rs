//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with FEATUREGATE_)
//! 2. Config file (featuregate.toml)
//! 3. Default values
//!
//! Database credentials should be kept in environment variables, not in the
//! config file.

use crate::constants::DEFAULT_UNSAFE_FEATURES;
use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (should be in env var FEATUREGATE_DATABASE__URL)
    pub url: String,
    /// Pool size; in-memory SQLite is always limited to one connection
    pub max_connections: u32,
    /// Log every statement sqlx executes
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            sqlx_logging: false,
        }
    }
}

/// Feature type configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Feature type names that must never be toggled by rollouts or operators
    pub unsafe_names: Vec<String>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            unsafe_names: DEFAULT_UNSAFE_FEATURES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

/// Batch job configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobsConfig {
    /// Fixed seed for batch selection; entropy when unset
    pub seed: Option<u64>,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub features: FeaturesConfig,
    pub jobs: JobsConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("featuregate.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g., FEATUREGATE_DATABASE__URL, FEATUREGATE_JOBS__SEED
            .add_source(
                Environment::with_prefix("FEATUREGATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Initialize application configuration
///
/// This triggers the lazy loading of the config file and logs the result.
/// Should be called early in application startup.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: {} unsafe feature(s), selection seed {:?}",
        config.features.unsafe_names.len(),
        config.jobs.seed
    );
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

/// Get database configuration
pub fn database() -> DatabaseConfig {
    get_config().database
}

/// Get feature type configuration
pub fn features() -> FeaturesConfig {
    get_config().features
}

/// Get batch job configuration
pub fn jobs() -> JobsConfig {
    get_config().jobs
}
