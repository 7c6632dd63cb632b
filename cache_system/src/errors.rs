//! Error types for cache operations
//!
//! This module defines all error types that can occur
//! during topology construction and cache operations.

use config::ConfigError;
use thiserror::Error;

/// Cache system errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Redis connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Cache operation timeout: {0}")]
    Timeout(String),

    #[error("Connection not configured: {0}")]
    ConnectionNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed cache payload: {0}")]
    Decode(String),

    #[error("Batch failed after {} of {} commands: {message}", applied_label(.applied), .keys.len())]
    Operation {
        /// Keys the batch tried to write
        keys: Vec<String>,
        /// Leading commands known to be applied, `None` when the backend cannot tell
        applied: Option<usize>,
        message: String,
    },
}

impl CacheError {
    /// Whether the store should treat this error as a cache miss
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

fn applied_label(applied: &Option<usize>) -> String {
    match applied {
        Some(count) => count.to_string(),
        None => "an unknown number".to_string(),
    }
}
