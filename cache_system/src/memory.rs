//! In-process backend
//!
//! Keeps entries in a map guarded by a `tokio` lock and measures expiry with
//! `tokio::time::Instant`, so tests running on a paused runtime can move the
//! clock with `tokio::time::advance`. Failure switches let tests exercise
//! connection loss and partially applied batches.

use crate::backend::{Backend, Connector, KeyPrefix};
use crate::batch::{Batch, Command, Reply};
use crate::errors::CacheError;
use async_trait::async_trait;
use config::{ClusterConfig, NodeConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Map-backed store speaking the [`Backend`] protocol
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, StoredValue>>,
    prefix: KeyPrefix,
    offline: AtomicBool,
    fail_batch_after: Mutex<Option<usize>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that prefixes every key, like a connection-level prefix option
    pub fn with_prefix(prefix: Option<&str>) -> Self {
        Self {
            prefix: KeyPrefix::new(prefix),
            ..Self::default()
        }
    }

    /// Make every command fail as if the connection dropped
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Abort the next batch after applying its first `applied` commands
    pub async fn fail_next_batch_after(&self, applied: usize) {
        *self.fail_batch_after.lock().await = Some(applied);
    }

    /// Raw payload stored under the exact wire key, ignoring the prefix
    pub async fn raw(&self, wire_key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(wire_key)
            .filter(|stored| stored.is_live(Instant::now()))
            .map(|stored| stored.value.clone())
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|stored| stored.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_online(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Connection(
                "memory backend is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn apply(entries: &mut HashMap<String, StoredValue>, command: Command) -> Reply {
        match command {
            Command::Set { key, value } => {
                entries.insert(
                    key,
                    StoredValue {
                        value,
                        expires_at: None,
                    },
                );
                Reply::Ok
            }
            Command::SetEx {
                key,
                value,
                seconds,
            } => {
                // A deadline past what Instant can hold never arrives
                let expires_at = Instant::now().checked_add(Duration::from_secs(seconds));
                entries.insert(key, StoredValue { value, expires_at });
                Reply::Ok
            }
            Command::Del { keys } => {
                let now = Instant::now();
                let removed = keys
                    .iter()
                    .filter_map(|key| entries.remove(key))
                    .filter(|stored| stored.is_live(now))
                    .count();
                Reply::Deleted(removed as u64)
            }
        }
    }

    async fn run(&self, command: Command) -> Result<Reply, CacheError> {
        self.check_online()?;
        let mut entries = self.entries.write().await;
        Ok(Self::apply(&mut entries, self.prefix.apply_command(&command)))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_online()?;
        Ok(self.raw(&self.prefix.apply(key)).await)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        self.check_online()?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .map(|key| {
                entries
                    .get(&self.prefix.apply(key))
                    .filter(|stored| stored.is_live(now))
                    .map(|stored| stored.value.clone())
            })
            .collect())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.run(Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> Result<(), CacheError> {
        self.run(Command::SetEx {
            key: key.to_string(),
            value: value.to_string(),
            seconds,
        })
        .await
        .map(|_| ())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        match self
            .run(Command::Del {
                keys: keys.to_vec(),
            })
            .await?
        {
            Reply::Deleted(count) => Ok(count),
            Reply::Ok => Ok(0),
        }
    }

    async fn flush_db(&self) -> Result<(), CacheError> {
        self.check_online()?;
        self.entries.write().await.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check_online()
    }

    async fn execute_batch(&self, batch: &Batch) -> Result<Vec<Reply>, CacheError> {
        self.check_online()?;
        let fail_after = self.fail_batch_after.lock().await.take();
        let mut entries = self.entries.write().await;
        let mut replies = Vec::with_capacity(batch.len());

        for (index, command) in batch.commands().iter().enumerate() {
            if fail_after == Some(index) {
                return Err(CacheError::Operation {
                    keys: batch.keys(),
                    applied: Some(index),
                    message: "connection lost mid-batch".to_string(),
                });
            }
            replies.push(Self::apply(
                &mut entries,
                self.prefix.apply_command(command),
            ));
        }

        Ok(replies)
    }
}

/// Connector handing out a fresh [`MemoryBackend`] per connection
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    refused: Vec<String>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to open the named connection, as an unreachable node would
    pub fn refuse(mut self, name: &str) -> Self {
        self.refused.push(name.to_string());
        self
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect_node(
        &self,
        name: &str,
        node: &NodeConfig,
    ) -> Result<Arc<dyn Backend>, CacheError> {
        if self.refused.iter().any(|refused| refused == name) {
            return Err(CacheError::Connection(format!(
                "Failed to open connection '{}' to {}: refused",
                name,
                node.address()
            )));
        }
        Ok(Arc::new(MemoryBackend::with_prefix(node.prefix())))
    }

    async fn connect_cluster(
        &self,
        cluster: &ClusterConfig,
    ) -> Result<Arc<dyn Backend>, CacheError> {
        cluster.options.failover_policy()?;
        Ok(Arc::new(MemoryBackend::with_prefix(cluster.options.prefix())))
    }
}
