//! Breakwater - Rate Limiting and Caching with Graceful Degradation
//!
//! This crate implements a request rate limiter and a read-through cache
//! backed by Redis, with a transparent fallback to a process-local store
//! whenever Redis is unconfigured, unreachable, or failing. Correctness of
//! limiting and caching is deliberately secondary to availability of the
//! caller's request path: no operation here ever fails a request because a
//! backend is down.
//!
//! The composition root wires the pieces together explicitly:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use breakwater::cache::Cache;
//! use breakwater::config::Settings;
//! use breakwater::connector::RedisConnector;
//! use breakwater::memory::MemoryStore;
//! use breakwater::metrics::FallbackMetrics;
//! use breakwater::ratelimit::{presets, RateLimiter};
//!
//! # async fn wire() {
//! let settings = Settings::from_env();
//! let metrics = Arc::new(FallbackMetrics::new());
//! let connector = Arc::new(RedisConnector::new(&settings, metrics.clone()));
//!
//! let windows = Arc::new(MemoryStore::new());
//! let entries = Arc::new(MemoryStore::new());
//! let window_sweeper = windows.spawn_sweeper(settings.sweep_interval());
//! let entry_sweeper = entries.spawn_sweeper(settings.sweep_interval());
//!
//! let limiter = RateLimiter::new(connector.clone(), windows, metrics.clone());
//! let cache = Cache::new(connector.clone(), entries, metrics.clone());
//!
//! let decision = limiter.check("203.0.113.9", &presets::api()).await;
//! if !decision.allowed {
//!     // Tell the client to come back after decision.retry_after.
//! }
//!
//! // On shutdown:
//! window_sweeper.abort();
//! entry_sweeper.abort();
//! connector.close().await;
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod connector;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod ratelimit;
