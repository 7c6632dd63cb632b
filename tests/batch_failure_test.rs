//! Integration tests for partially applied pipelines
//!
//! Drives CacheStore over a hand-built topology whose backend fails
//! part-way through a batch.

use cachehaus::cache_system::{
    Backend, CacheError, CacheStore, ConnectionHandle, ConnectionTopology, Connector,
    MemoryBackend, Store,
};
use cachehaus::config::{ClusterConfig, ConnectionConfig, NodeConfig};
use cachehaus::async_trait::async_trait;
use std::sync::Arc;

/// Connector that hands every connection the same shared backend
struct SharedConnector(Arc<MemoryBackend>);

#[async_trait]
impl Connector for SharedConnector {
    async fn connect_node(
        &self,
        _name: &str,
        _node: &NodeConfig,
    ) -> Result<Arc<dyn Backend>, CacheError> {
        Ok(self.0.clone())
    }

    async fn connect_cluster(
        &self,
        _cluster: &ClusterConfig,
    ) -> Result<Arc<dyn Backend>, CacheError> {
        Ok(self.0.clone())
    }
}

async fn store_over(backend: Arc<MemoryBackend>) -> CacheStore {
    let config = ConnectionConfig::single([("default", NodeConfig::new("127.0.0.1", 6379))]);
    let topology = ConnectionTopology::build_with(&config, &SharedConnector(backend))
        .await
        .unwrap();
    CacheStore::new(Arc::new(topology)).with_prefix("app:")
}

#[tokio::test]
async fn test_mid_batch_failure_names_keys_and_applied_count() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = store_over(backend.clone()).await;
    backend.fail_next_batch_after(2).await;

    let err = cache
        .put_many(&[("a", 1), ("b", 2), ("c", 3)], 60)
        .await
        .unwrap_err();

    match err {
        CacheError::Operation { keys, applied, .. } => {
            assert_eq!(keys, ["a", "b", "c"]);
            assert_eq!(applied, Some(2));
        }
        other => panic!("expected operation error, got {other:?}"),
    }

    assert_eq!(cache.get::<i64>("a").await.unwrap(), Some(1));
    assert_eq!(cache.get::<i64>("b").await.unwrap(), Some(2));
    assert_eq!(cache.get::<i64>("c").await.unwrap(), None);
}

#[tokio::test]
async fn test_lost_connection_surfaces_as_operation_error() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = store_over(backend.clone()).await;
    backend.set_offline(true);

    let err = cache.put_many(&[("a", "x")], "1m").await.unwrap_err();
    assert!(matches!(err, CacheError::Operation { applied: None, .. }));

    // Reads fail loudly too; only decode failures become misses
    assert!(matches!(
        cache.get::<String>("a").await,
        Err(CacheError::Connection(_))
    ));
}

#[tokio::test]
async fn test_corrupt_payload_is_a_miss_not_an_error() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = store_over(backend.clone()).await;
    backend.set("app:bad", "{\"unterminated").await.unwrap();
    backend.set("app:good", "12").await.unwrap();

    let values = cache.many::<i64, _>(&["bad", "good"]).await.unwrap();
    assert_eq!(
        values,
        vec![("bad".to_string(), None), ("good".to_string(), Some(12))]
    );
}

#[tokio::test]
async fn test_handles_are_shared_across_tasks() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = store_over(backend.clone()).await;

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            cache.put(&format!("worker:{worker}"), &worker, 60).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(backend.len().await, 8);
    let handle: &ConnectionHandle = cache.topology().resolve("default").unwrap();
    assert_eq!(handle.name(), "default");
}
