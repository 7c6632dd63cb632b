//! Store backends and the connectors that open them
//!
//! A [`Backend`] is the primitive command surface a cache needs from a
//! key/value store. A [`Connector`] opens backends from node or cluster
//! settings; the topology only ever talks to these two traits.

use crate::batch::{Batch, Command, Reply};
use crate::errors::CacheError;
use async_trait::async_trait;
use config::{ClusterConfig, NodeConfig};
use std::fmt::Debug;
use std::sync::Arc;

/// Primitive commands against one connection
///
/// Implementations must be safe to share between tasks; a topology hands
/// the same backend to every caller.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// One value slot per key, in key order
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> Result<(), CacheError>;

    /// Number of keys actually removed
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Drop every key in the connection's keyspace
    async fn flush_db(&self) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    /// Pipeline all commands and collect one reply per command, in order
    async fn execute_batch(&self, batch: &Batch) -> Result<Vec<Reply>, CacheError>;
}

/// Opens backends for a topology
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect_node(
        &self,
        name: &str,
        node: &NodeConfig,
    ) -> Result<Arc<dyn Backend>, CacheError>;

    async fn connect_cluster(&self, cluster: &ClusterConfig)
    -> Result<Arc<dyn Backend>, CacheError>;
}

/// Connection-level key prefix, applied to every key a backend touches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPrefix(Option<String>);

impl KeyPrefix {
    pub fn new(prefix: Option<&str>) -> Self {
        Self(prefix.filter(|p| !p.is_empty()).map(str::to_string))
    }

    pub fn apply(&self, key: &str) -> String {
        match &self.0 {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }

    pub fn apply_all(&self, keys: &[String]) -> Vec<String> {
        keys.iter().map(|key| self.apply(key)).collect()
    }

    /// Copy of `command` with every key prefixed
    pub fn apply_command(&self, command: &Command) -> Command {
        match command {
            Command::Set { key, value } => Command::Set {
                key: self.apply(key),
                value: value.clone(),
            },
            Command::SetEx {
                key,
                value,
                seconds,
            } => Command::SetEx {
                key: self.apply(key),
                value: value.clone(),
                seconds: *seconds,
            },
            Command::Del { keys } => Command::Del {
                keys: self.apply_all(keys),
            },
        }
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}
