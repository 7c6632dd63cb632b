//! Integration tests against a live Redis server
//!
//! Ignored by default. Run with a server on REDIS_HOST/REDIS_PORT
//! (defaults 127.0.0.1:6379):
//! `cargo test --test redis_integration_test -- --ignored`

use cachehaus::prelude::*;
use std::time::Duration;

fn config(database: i64) -> AppConfig {
    let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());

    AppConfig::from_toml_str(&format!(
        r#"
        [cache]
        prefix = "cachehaus-test:"

        [redis.default]
        host = "{host}"
        port = {port}
        persistent = true
        database = {database}
        timeout = 2.0

        [redis.transient]
        host = "{host}"
        port = {port}
        database = {database}
        "#
    ))
    .expect("valid config")
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_round_trip_against_redis() {
    let cachehaus = CacheHaus::new(config(15)).await.expect("connect to redis");
    cachehaus.health_check().await.unwrap();

    let cache = cachehaus.store();
    cache.flush().await.unwrap();

    cache.put("number", &42, "1m").await.unwrap();
    cache.put("text", "00501", "1m").await.unwrap();
    cache
        .put_many(&[("a", vec![1, 2]), ("b", vec![3])], 60)
        .await
        .unwrap();

    assert_eq!(cache.get::<i64>("number").await.unwrap(), Some(42));
    assert_eq!(
        cache.get::<String>("text").await.unwrap().as_deref(),
        Some("00501")
    );

    let values = cache.many::<Vec<i32>, _>(&["a", "missing", "b"]).await.unwrap();
    assert_eq!(values[0].1, Some(vec![1, 2]));
    assert_eq!(values[1].1, None);
    assert_eq!(values[2].1, Some(vec![3]));

    cache.flush().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_transient_connection_expires_entries() {
    let cachehaus = CacheHaus::new(config(15)).await.expect("connect to redis");
    let cache = cachehaus.store_for("transient").unwrap();

    cache.put("short", &1, 1).await.unwrap();
    assert_eq!(cache.get::<i64>("short").await.unwrap(), Some(1));

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(cache.get::<i64>("short").await.unwrap(), None);
}
