//! Convenience re-exports for common cachehaus usage
//!
//! This prelude module re-exports the most commonly used items from the cachehaus workspace,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use cachehaus::prelude::*;
//!
//! // Now you have access to all the common cachehaus types and traits
//! ```

// Core cachehaus components
pub use crate::core::CacheHaus;
pub use crate::errors::CacheHausError;

// Re-export centralized config
pub use config::{AppConfig, CacheSettings, ConnectionConfig, NodeConfig};

// Re-export cache system
pub use cache_system::prelude::*;
pub use cache_system::{MemoryConnector, RedisConnector};

// Common external dependencies
pub use async_trait;
pub use tokio;
