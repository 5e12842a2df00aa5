//! Rate limiting logic and policies.

mod backend;
mod limiter;
mod local;
mod policy;
mod redis;

pub use backend::{CounterBackend, WindowHit};
pub use limiter::RateLimiter;
pub use local::{LocalCounter, WindowSlot};
pub use policy::{presets, PolicySet, RateLimitDecision, RateLimitPolicy};
pub use redis::RedisCounter;
