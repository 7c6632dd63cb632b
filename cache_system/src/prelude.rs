//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::codec::ValueCodec;
pub use crate::errors::CacheError;
pub use crate::store::{CacheStore, Store};
pub use crate::topology::{ConnectionHandle, ConnectionTopology};
pub use crate::ttl::Ttl;

// Re-export centralized config
pub use config::{CacheSettings, ConnectionConfig};

// Common external dependencies
pub use async_trait::async_trait;
pub use redis;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;
