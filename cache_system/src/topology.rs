//! Connection topology
//!
//! Builds the set of live connections described by a [`ConnectionConfig`]
//! and resolves connection names to handles. This is the only place that
//! knows whether the backend is a cluster or a set of single nodes.

use crate::backend::{Backend, Connector};
use crate::errors::CacheError;
use crate::redis_backend::RedisConnector;
use config::ConnectionConfig;
use std::sync::Arc;

/// Name of the one logical connection a cluster topology exposes
pub const CLUSTER_CONNECTION: &str = "default";

/// A named, shareable connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    name: String,
    backend: Arc<dyn Backend>,
}

impl ConnectionHandle {
    pub fn new(name: &str, backend: Arc<dyn Backend>) -> Self {
        Self {
            name: name.to_string(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Whether both handles drive the same underlying connection
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.backend), Arc::as_ptr(&other.backend))
    }
}

/// Resolved set of connections for one deployment mode
#[derive(Debug)]
pub struct ConnectionTopology {
    handles: Vec<ConnectionHandle>,
    cluster: bool,
}

impl ConnectionTopology {
    /// Build the topology over Redis
    pub async fn build(config: &ConnectionConfig) -> Result<Self, CacheError> {
        Self::build_with(config, &RedisConnector).await
    }

    /// Parse a raw connection map and build the topology over Redis
    pub async fn from_table(servers: &toml::Table) -> Result<Self, CacheError> {
        let config = ConnectionConfig::from_table(servers)?;
        Self::build(&config).await
    }

    /// Build the topology with any connector
    ///
    /// The whole config is validated before the first connection is opened;
    /// a failure at any point returns an error and drops whatever was
    /// already opened.
    pub async fn build_with(
        config: &ConnectionConfig,
        connector: &dyn Connector,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        match config {
            ConnectionConfig::Cluster(cluster) => {
                let backend = connector.connect_cluster(cluster).await?;
                crate::debug_log!(
                    "Built cluster topology over {} seed(s)",
                    cluster.seeds.len()
                );
                Ok(Self {
                    handles: vec![ConnectionHandle::new(CLUSTER_CONNECTION, backend)],
                    cluster: true,
                })
            }
            ConnectionConfig::Single(nodes) => {
                let mut handles = Vec::with_capacity(nodes.len());
                for named in nodes {
                    let backend = connector.connect_node(&named.name, &named.node).await?;
                    handles.push(ConnectionHandle::new(&named.name, backend));
                }
                crate::debug_log!("Built single-node topology with {} connection(s)", handles.len());
                Ok(Self {
                    handles,
                    cluster: false,
                })
            }
        }
    }

    /// Handle configured under `name`
    pub fn resolve(&self, name: &str) -> Result<&ConnectionHandle, CacheError> {
        self.handles
            .iter()
            .find(|handle| handle.name == name)
            .ok_or_else(|| CacheError::ConnectionNotFound(name.to_string()))
    }

    /// Connection names in configured order
    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(ConnectionHandle::name).collect()
    }

    pub fn handles(&self) -> &[ConnectionHandle] {
        &self.handles
    }

    pub fn is_cluster(&self) -> bool {
        self.cluster
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Ping every connection, stopping at the first failure
    pub async fn ping_all(&self) -> Result<(), CacheError> {
        for handle in &self.handles {
            handle.backend().ping().await.map_err(|e| {
                CacheError::Connection(format!("Connection '{}' failed ping: {}", handle.name, e))
            })?;
        }
        Ok(())
    }
}
