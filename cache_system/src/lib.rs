//! Cache system for Redis-based caching
//!
//! This crate provides the cache core: value encoding, TTL normalization,
//! pipelined batches, the connection topology over single nodes or a
//! cluster, and the [`CacheStore`] built on top of them.

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

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod backend;
pub mod batch;
pub mod codec;
pub mod errors;
pub mod memory;
pub mod prelude;
pub mod redis_backend;
pub mod store;
pub mod topology;
pub mod ttl;

// Re-export centralized config
pub use config::{CacheSettings, ConnectionConfig};

pub use backend::{Backend, Connector};
pub use batch::{Batch, Command, Reply};
pub use codec::ValueCodec;
pub use errors::CacheError;
pub use memory::{MemoryBackend, MemoryConnector};
pub use redis_backend::{RedisBackend, RedisConnector, hash_slot};
pub use store::{CacheStore, Store};
pub use topology::{CLUSTER_CONNECTION, ConnectionHandle, ConnectionTopology};
pub use ttl::{MAX_TTL_SECONDS, MIN_TTL_SECONDS, Ttl, to_seconds};
