//! Cache store
//!
//! [`CacheStore`] is the application-facing cache. Every call resolves its
//! connection through the topology, encodes values with [`ValueCodec`] and
//! normalizes lifetimes with [`Ttl`].

use crate::batch::Batch;
use crate::codec::ValueCodec;
use crate::errors::CacheError;
use crate::topology::{CLUSTER_CONNECTION, ConnectionHandle, ConnectionTopology};
use crate::ttl::Ttl;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Operations every cache store provides
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch one value; a missing or unreadable entry is `None`
    async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send;

    /// Store a value for the given lifetime, replacing any existing entry
    async fn put<T, D>(&self, key: &str, value: &T, ttl: D) -> Result<(), CacheError>
    where
        T: Serialize + Sync + ?Sized,
        D: Into<Ttl> + Send;

    /// Fetch many values in one round trip, one result per key in input order
    async fn many<T, K>(&self, keys: &[K]) -> Result<Vec<(String, Option<T>)>, CacheError>
    where
        T: DeserializeOwned + Send,
        K: AsRef<str> + Sync;

    /// Store many values with one shared lifetime in one pipelined round trip
    async fn put_many<K, V, D>(&self, values: &[(K, V)], ttl: D) -> Result<(), CacheError>
    where
        K: AsRef<str> + Sync,
        V: Serialize + Sync,
        D: Into<Ttl> + Send;

    /// Store a value without expiry
    async fn forever<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + Sync + ?Sized;

    /// Remove every entry from the connection's keyspace
    async fn flush(&self) -> Result<(), CacheError>;
}

/// Cache store bound to one named connection of a topology
#[derive(Debug, Clone)]
pub struct CacheStore {
    topology: Arc<ConnectionTopology>,
    connection: String,
    prefix: String,
}

impl CacheStore {
    /// Store on the `default` connection with no key prefix
    pub fn new(topology: Arc<ConnectionTopology>) -> Self {
        Self {
            topology,
            connection: CLUSTER_CONNECTION.to_string(),
            prefix: String::new(),
        }
    }

    pub fn with_connection(mut self, name: &str) -> Self {
        self.connection = name.to_string();
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn connection_name(&self) -> &str {
        &self.connection
    }

    pub fn topology(&self) -> &Arc<ConnectionTopology> {
        &self.topology
    }

    /// Remove one entry, returning whether it existed
    pub async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.handle()?.backend().del(&[self.key(key)]).await?;
        crate::debug_log!("Forgot key '{}': {}", key, removed > 0);
        Ok(removed > 0)
    }

    fn handle(&self) -> Result<&ConnectionHandle, CacheError> {
        self.topology.resolve(&self.connection)
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Decode failures are logged and read as a miss
    fn decode_or_miss<T: DeserializeOwned>(&self, key: &str, raw: Option<&str>) -> Option<T> {
        match ValueCodec::decode(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    connection = %self.connection,
                    error = %e,
                    "Discarding unreadable cache entry"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Store for CacheStore {
    async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.handle()?.backend().get(&self.key(key)).await?;

        if raw.is_some() {
            crate::trace_log!("Cache hit for key '{}'", key);
        } else {
            crate::trace_log!("Cache miss for key '{}'", key);
        }

        Ok(self.decode_or_miss(key, raw.as_deref()))
    }

    async fn put<T, D>(&self, key: &str, value: &T, ttl: D) -> Result<(), CacheError>
    where
        T: Serialize + Sync + ?Sized,
        D: Into<Ttl> + Send,
    {
        let seconds = ttl.into().to_seconds();
        let payload = ValueCodec::encode(value)?;

        self.handle()?
            .backend()
            .set_ex(&self.key(key), &payload, seconds)
            .await?;

        crate::debug_log!("Cached key '{}' with TTL {}s", key, seconds);
        Ok(())
    }

    async fn many<T, K>(&self, keys: &[K]) -> Result<Vec<(String, Option<T>)>, CacheError>
    where
        T: DeserializeOwned + Send,
        K: AsRef<str> + Sync,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let wire_keys: Vec<String> = keys.iter().map(|key| self.key(key.as_ref())).collect();
        let values = self.handle()?.backend().mget(&wire_keys).await?;

        if values.len() != keys.len() {
            return Err(CacheError::Connection(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }

        Ok(keys
            .iter()
            .zip(values)
            .map(|(key, raw)| {
                let key = key.as_ref();
                (key.to_string(), self.decode_or_miss(key, raw.as_deref()))
            })
            .collect())
    }

    async fn put_many<K, V, D>(&self, values: &[(K, V)], ttl: D) -> Result<(), CacheError>
    where
        K: AsRef<str> + Sync,
        V: Serialize + Sync,
        D: Into<Ttl> + Send,
    {
        if values.is_empty() {
            return Ok(());
        }

        let seconds = ttl.into().to_seconds();
        let mut batch = Batch::with_capacity(values.len());
        for (key, value) in values {
            batch.set_ex(self.key(key.as_ref()), ValueCodec::encode(value)?, seconds);
        }

        // Report caller keys, not wire keys
        let keys = || -> Vec<String> {
            values
                .iter()
                .map(|(key, _)| key.as_ref().to_string())
                .collect()
        };

        self.handle()?
            .backend()
            .execute_batch(&batch)
            .await
            .map_err(|e| match e {
                CacheError::Operation {
                    applied, message, ..
                } => CacheError::Operation {
                    keys: keys(),
                    applied,
                    message,
                },
                other => CacheError::Operation {
                    keys: keys(),
                    applied: None,
                    message: other.to_string(),
                },
            })?;

        crate::debug_log!("Cached {} keys with TTL {}s in one batch", values.len(), seconds);
        Ok(())
    }

    async fn forever<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let payload = ValueCodec::encode(value)?;
        self.handle()?.backend().set(&self.key(key), &payload).await?;

        crate::debug_log!("Cached key '{}' without expiry", key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let handle = self.handle()?;

        // A cluster-wide FLUSHDB would wipe every shard
        if self.topology.is_cluster() {
            crate::debug_log!("Skipping flush on cluster connection '{}'", self.connection);
            return Ok(());
        }

        handle.backend().flush_db().await?;
        crate::debug_log!("Flushed connection '{}'", self.connection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;
    use config::{ClusterConfig, ClusterOptions, ConnectionConfig, NodeConfig, SeedNode};
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
    }

    async fn single_store() -> CacheStore {
        let config = ConnectionConfig::single([
            ("default", NodeConfig::new("127.0.0.1", 6379)),
            ("sessions", NodeConfig::new("127.0.0.1", 6379).with_database(1)),
        ]);
        let topology = ConnectionTopology::build_with(&config, &MemoryConnector::new())
            .await
            .unwrap();
        CacheStore::new(Arc::new(topology)).with_prefix("test:")
    }

    async fn cluster_store() -> CacheStore {
        let config = ConnectionConfig::Cluster(ClusterConfig::new(
            vec![SeedNode::new("127.0.0.1", 7000)],
            ClusterOptions::default(),
        ));
        let topology = ConnectionTopology::build_with(&config, &MemoryConnector::new())
            .await
            .unwrap();
        CacheStore::new(Arc::new(topology))
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = single_store().await;
        let profile = Profile {
            name: "ada".to_string(),
            visits: 3,
        };

        store.put("profile:1", &profile, "10m").await.unwrap();
        store.put("count", &41, 60).await.unwrap();

        assert_eq!(store.get::<Profile>("profile:1").await.unwrap(), Some(profile));
        assert_eq!(store.get::<i64>("count").await.unwrap(), Some(41));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = single_store().await;
        assert_eq!(store.get::<String>("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_applies_to_wire_keys() {
        let store = single_store().await;
        store.forever("k", &1).await.unwrap();

        let handle = store.topology().resolve("default").unwrap();
        assert_eq!(
            handle.backend().get("test:k").await.unwrap().as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_miss() {
        let store = single_store().await;
        let handle = store.topology().resolve("default").unwrap();
        handle.backend().set("test:broken", "{oops").await.unwrap();

        assert_eq!(store.get::<Profile>("broken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_many_preserves_order_and_cardinality() {
        let store = single_store().await;
        store.put("k2", "two", 60).await.unwrap();

        let values = store
            .many::<String, _>(&["k1", "k2", "k3"])
            .await
            .unwrap();

        assert_eq!(
            values,
            vec![
                ("k1".to_string(), None),
                ("k2".to_string(), Some("two".to_string())),
                ("k3".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_many_with_no_keys() {
        let store = single_store().await;
        let values = store.many::<i64, &str>(&[]).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_many_shares_normalized_ttl() {
        let store = single_store().await;
        store
            .put_many(&[("k1", "v1"), ("k2", "v2")], "1m")
            .await
            .unwrap();

        assert_eq!(store.get::<String>("k1").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(store.get::<String>("k2").await.unwrap().as_deref(), Some("v2"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get::<String>("k1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get::<String>("k1").await.unwrap(), None);
        assert_eq!(store.get::<String>("k2").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_floored_to_one_second() {
        let store = single_store().await;
        store.put("blink", &1, 0).await.unwrap();
        assert!(store.get::<i64>("blink").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get::<i64>("blink").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forever_does_not_expire() {
        let store = single_store().await;
        store.forever("pinned", "yes").await.unwrap();

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(
            store.get::<String>("pinned").await.unwrap().as_deref(),
            Some("yes")
        );
    }

    #[tokio::test]
    async fn test_flush_clears_single_node() {
        let store = single_store().await;
        store.forever("a", &1).await.unwrap();
        store.flush().await.unwrap();
        assert_eq!(store.get::<i64>("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_flush_is_noop_on_cluster() {
        let store = cluster_store().await;
        store.put("kept", &7, 60).await.unwrap();
        store.flush().await.unwrap();
        assert_eq!(store.get::<i64>("kept").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_cluster_flush_on_unknown_connection_is_error() {
        let store = cluster_store().await.with_connection("sessions");
        let err = store.flush().await.unwrap_err();
        assert!(matches!(err, CacheError::ConnectionNotFound(name) if name == "sessions"));
    }

    #[tokio::test]
    async fn test_huge_ttl_is_clamped_not_overflowed() {
        let store = single_store().await;
        store.put("k", &1, "99999999999999999999h").await.unwrap();
        store
            .put_many(&[("a", 1), ("b", 2)], u64::MAX)
            .await
            .unwrap();

        assert_eq!(store.get::<i64>("k").await.unwrap(), Some(1));
        assert_eq!(store.get::<i64>("b").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_connections_are_isolated() {
        let store = single_store().await;
        let sessions = store.clone().with_connection("sessions");

        store.forever("k", "main").await.unwrap();
        assert_eq!(sessions.get::<String>("k").await.unwrap(), None);

        sessions.flush().await.unwrap();
        assert!(store.get::<String>("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_connection_is_error() {
        let store = single_store().await.with_connection("missing");
        let err = store.get::<i64>("k").await.unwrap_err();
        assert!(matches!(err, CacheError::ConnectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_forget_removes_entry() {
        let store = single_store().await;
        store.put("gone", &1, 60).await.unwrap();

        assert!(store.forget("gone").await.unwrap());
        assert!(!store.forget("gone").await.unwrap());
        assert_eq!(store.get::<i64>("gone").await.unwrap(), None);
    }
}
