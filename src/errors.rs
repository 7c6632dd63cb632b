//! Error types for the cachehaus crate
//!
//! This module contains all error types that can be returned by cachehaus bootstrap.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheHausError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache_system::CacheError),
}
