//! # Configuration Management for cachehaus
//!
//! This crate provides the configuration structures consumed by the cache
//! system: store-level settings and the raw connection map that is resolved
//! into a [`ConnectionConfig`].
//!
//! ## TOML File Configuration
//! ```toml
//! [cache]
//! prefix = "myapp:"
//! connection = "default"
//!
//! [redis]
//! cluster = false
//!
//! [redis.default]
//! host = "127.0.0.1"
//! port = 6379
//! timeout = 1.5
//! persistent = true
//! prefix = ""
//! database = 0
//!
//! [redis.cluster_config]
//! failover = "distribute"
//!
//! [redis.cluster_config.node1]
//! host = "10.0.0.1"
//! port = 7000
//!
//! [redis.cluster_config.options]
//! read_timeout = 2.0
//! timeout = 1.0
//! persistent = true
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from cachehaus.toml
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

pub mod connection;

pub use connection::{
    ClusterConfig, ClusterOptions, ConnectionConfig, FailoverPolicy, NamedNode, NodeConfig,
    SeedNode, DEFAULT_HOST, DEFAULT_PORT,
};

use serde::{Deserialize, Serialize};
use std::{env, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./cachehaus.toml";
const CONFIG_PATH_VAR: &str = "CACHEHAUS_CONFIG";

/// Name of the connection used when none is configured
pub const DEFAULT_CONNECTION: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheSettings,
    /// Raw connection map, resolved by [`AppConfig::connection_config`]
    pub redis: toml::Table,
}

/// Store-level cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Prefix prepended to every cache key by the store
    pub prefix: String,
    /// Connection the store resolves when no name is given
    pub connection: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            connection: DEFAULT_CONNECTION.to_string(),
        }
    }
}

impl CacheSettings {
    pub fn new(prefix: &str, connection: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            connection: connection.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the TOML file named in `.env` or the default path
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(e.into());
            }
        }

        // Path from CACHEHAUS_CONFIG
        if let Ok(config_path) = env::var(CONFIG_PATH_VAR) {
            Self::from_file(&config_path)
        }
        // Config at DEFAULT_CONFIG_PATH
        else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Err(ConfigError::Invalid(format!(
                "Config path must be specified in .env file as {} or in {} file",
                CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH
            )))
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from already-resolved parts
    pub fn new(cache: CacheSettings, redis: toml::Table) -> Self {
        Self { cache, redis }
    }

    /// Resolve the raw `[redis]` map into a typed connection config
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConfigError> {
        ConnectionConfig::from_table(&self.redis)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.connection.is_empty() {
            return Err(ConfigError::Invalid(
                "Cache connection name cannot be empty".to_string(),
            ));
        }

        self.connection_config()?;
        Ok(())
    }
}
