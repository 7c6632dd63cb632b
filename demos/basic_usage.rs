//! # Basic Cache Usage Example
//!
//! This example demonstrates the cache store against a local Redis:
//! - Building a topology from TOML
//! - Storing values with readable TTLs
//! - Reading single and many values
//! - Pipelined writes with `put_many`

use cachehaus::prelude::*;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub price: i32,
}

const CONFIG: &str = r#"
[cache]
prefix = "demo:"

[redis.default]
host = "127.0.0.1"
port = 6379
persistent = true
timeout = 2.0

[redis.sessions]
host = "127.0.0.1"
port = 6379
database = 1
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 CacheHaus Basic Usage Example");
    println!("================================");

    // 1. Connect
    let config = AppConfig::from_toml_str(CONFIG)?;
    let cachehaus = match CacheHaus::new(config).await {
        Ok(cachehaus) => cachehaus,
        Err(e) => {
            println!("❌ Redis connection failed: {}", e);
            println!("💡 Please start Redis: docker run -d --name redis -p 6379:6379 redis:7-alpine");
            return Ok(());
        }
    };
    cachehaus.health_check().await?;
    println!(
        "✅ Connected: {:?} (cluster: {})",
        cachehaus.topology().names(),
        cachehaus.topology().is_cluster()
    );

    let cache = cachehaus.store();

    // 2. Single values
    println!("\n📦 Single Values");
    println!("----------------");

    let keyboard = Product {
        sku: "KB-001".to_string(),
        name: "Mechanical Keyboard".to_string(),
        price: 12900,
    };
    cache.put("product:KB-001", &keyboard, "10m").await?;
    cache.put("visits", &1, 300).await?;
    cache.put("zip", "00501", "1h").await?;

    let start = Instant::now();
    let cached: Option<Product> = cache.get("product:KB-001").await?;
    println!("✅ Product: {:?} ({:?})", cached, start.elapsed());

    let visits: Option<i64> = cache.get("visits").await?;
    let zip: Option<String> = cache.get("zip").await?;
    println!("✅ Visits: {:?}, zip: {:?}", visits, zip);

    // 3. Many values
    println!("\n📚 Batch Operations");
    println!("-------------------");

    cache
        .put_many(
            &[
                ("price:KB-001", 12900),
                ("price:MS-002", 4900),
                ("price:HS-003", 8900),
            ],
            "1m",
        )
        .await?;
    println!("✅ Stored 3 prices in one pipeline");

    let prices = cache
        .many::<i32, _>(&["price:KB-001", "price:XX-999", "price:HS-003"])
        .await?;
    for (key, price) in &prices {
        match price {
            Some(price) => println!("   {} = {}", key, price),
            None => println!("   {} = (miss)", key),
        }
    }

    // 4. Named connections
    println!("\n🔀 Named Connections");
    println!("--------------------");

    let sessions = cachehaus.store_for("sessions")?;
    sessions.put("session:abc", "user-42", "30m").await?;
    let default_side: Option<String> = cache.get("session:abc").await?;
    let session_side: Option<String> = sessions.get("session:abc").await?;
    println!("✅ default sees {:?}, sessions sees {:?}", default_side, session_side);

    // 5. Cleanup
    cache.forget("product:KB-001").await?;
    sessions.flush().await?;
    cache.flush().await?;
    println!("\n🧹 Flushed demo connections");

    Ok(())
}
