//! # cachehaus
//!
//! A Redis cache store with transparent value encoding, TTL normalization,
//! pipelined batches and a connection topology that hides whether the
//! backend is one node, several named nodes or a cluster.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cachehaus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_toml_str(
//!         r#"
//!         [cache]
//!         prefix = "shop:"
//!
//!         [redis.default]
//!         host = "127.0.0.1"
//!         port = 6379
//!         persistent = true
//!         "#,
//!     )?;
//!
//!     let cachehaus = CacheHaus::new(config).await?;
//!     let cache = cachehaus.store();
//!
//!     cache.put("visits", &1, "10m").await?;
//!     let visits: Option<i64> = cache.get("visits").await?;
//!     println!("visits: {:?}", visits);
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::CacheHaus;
pub use crate::errors::CacheHausError;

// Re-export centralized config
pub use config::{AppConfig, CacheSettings, ConnectionConfig};

// Re-export internal crates used in the public API
pub use cache_system;
pub use config;

// Re-export external dependencies used in public API
pub use async_trait;
