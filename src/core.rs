//! Core cachehaus functionality
//!
//! This module contains the main CacheHaus struct, which turns an
//! [`AppConfig`] into a connection topology and hands out cache stores.

use cache_system::{CacheStore, ConnectionTopology, Connector, RedisConnector};
use config::{AppConfig, CacheSettings};
use std::sync::Arc;

use crate::errors::CacheHausError;

/// Main cachehaus coordinator that owns the topology and store settings
#[derive(Debug, Clone)]
pub struct CacheHaus {
    topology: Arc<ConnectionTopology>,
    settings: CacheSettings,
}

impl CacheHaus {
    /// Build from configuration, connecting to Redis
    pub async fn new(config: AppConfig) -> Result<Self, CacheHausError> {
        Self::with_connector(config, &RedisConnector).await
    }

    /// Build from configuration with a custom connector
    pub async fn with_connector(
        config: AppConfig,
        connector: &dyn Connector,
    ) -> Result<Self, CacheHausError> {
        let connections = config.connection_config()?;
        let topology = ConnectionTopology::build_with(&connections, connector).await?;

        crate::debug_log!(
            "CacheHaus ready: connections={:?} cluster={}",
            topology.names(),
            topology.is_cluster()
        );

        Ok(Self {
            topology: Arc::new(topology),
            settings: config.cache,
        })
    }

    /// Load configuration from `.env`/`cachehaus.toml` and connect to Redis
    pub async fn load() -> Result<Self, CacheHausError> {
        Self::new(AppConfig::load()?).await
    }

    /// Store on the configured default connection
    ///
    /// The connection is resolved on every call, so an unknown default name
    /// surfaces on first use; [`CacheHaus::store_for`] checks eagerly.
    pub fn store(&self) -> CacheStore {
        CacheStore::new(Arc::clone(&self.topology))
            .with_connection(&self.settings.connection)
            .with_prefix(&self.settings.prefix)
    }

    /// Store on a named connection
    pub fn store_for(&self, name: &str) -> Result<CacheStore, CacheHausError> {
        self.topology.resolve(name)?;
        Ok(self.store().with_connection(name))
    }

    pub fn topology(&self) -> &Arc<ConnectionTopology> {
        &self.topology
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Check every connection answers
    pub async fn health_check(&self) -> Result<(), CacheHausError> {
        self.topology.ping_all().await?;
        Ok(())
    }
}
