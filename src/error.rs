//! Error types for the Breakwater subsystem.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Breakwater operations.
///
/// These errors are internal plumbing between the backends and the rate
/// limiter / cache front ends. The public `check`, `get`, and `set` surfaces
/// never return them to callers: a failing Redis operation is logged,
/// counted, and degraded to the in-memory fallback instead.
#[derive(Error, Debug)]
pub enum BreakwaterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The Redis backend is not reachable for this call (unconfigured or
    /// connection establishment failed)
    #[error("Redis backend unavailable")]
    Unavailable,

    /// A Redis command failed in flight
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A Redis command did not complete within the configured bound
    #[error("Redis command timed out after {0:?}")]
    Timeout(Duration),

    /// Cache entry serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Breakwater operations.
pub type Result<T> = std::result::Result<T, BreakwaterError>;
