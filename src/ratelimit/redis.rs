//! Redis-backed window counter.
//!
//! One Lua script makes the check-and-increment atomic across processes.
//! The original read-count-then-SETEX shape loses updates when two instances
//! race on a cold window; the script closes that hole while keeping the same
//! storage model: a plain integer under the window key, expiring at the
//! window boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use tracing::trace;

use super::backend::{CounterBackend, WindowHit};
use crate::connector::RedisConnector;
use crate::error::{BreakwaterError, Result};
use crate::metrics::FallbackMetrics;

/// KEYS[1] = counter key, ARGV[1] = ceiling, ARGV[2] = window in ms.
/// Returns {admitted, count, pttl}. Requests at or over the ceiling are not
/// counted; the first hit of a fresh window starts the TTL.
const HIT_SCRIPT: &str = r#"
local ceiling = tonumber(ARGV[1])
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
if count >= ceiling then
    return {0, count, redis.call('PTTL', KEYS[1])}
end
count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return {1, count, redis.call('PTTL', KEYS[1])}
"#;

/// Fixed-window counter stored in Redis.
pub struct RedisCounter {
    connector: Arc<RedisConnector>,
    script: Script,
    metrics: Arc<FallbackMetrics>,
}

impl RedisCounter {
    /// Create a counter over an existing connector.
    pub fn new(connector: Arc<RedisConnector>, metrics: Arc<FallbackMetrics>) -> Self {
        Self {
            connector,
            script: Script::new(HIT_SCRIPT),
            metrics,
        }
    }
}

#[async_trait]
impl CounterBackend for RedisCounter {
    async fn hit(&self, key: &str, ceiling: u32, window: Duration) -> Result<WindowHit> {
        let mut conn = match self.connector.connection().await {
            Some(conn) => conn,
            None => return Err(BreakwaterError::Unavailable),
        };

        let timeout = self.connector.command_timeout();
        let mut invocation = self.script.key(key);
        invocation.arg(ceiling).arg(window.as_millis() as u64);

        let reply = tokio::time::timeout(timeout, invocation.invoke_async(&mut conn)).await;
        let (allowed, count, pttl): (bool, u32, i64) = match reply {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                self.metrics.record_redis_error();
                return Err(err.into());
            }
            Err(_) => {
                self.metrics.record_redis_timeout();
                return Err(BreakwaterError::Timeout(timeout));
            }
        };

        trace!(key = %key, count = count, allowed = allowed, "Redis window hit");

        // PTTL is negative when the key is missing (a denied request against
        // a zero ceiling never creates one); treat the window length as the
        // best available reset estimate.
        let ttl = if pttl > 0 {
            Duration::from_millis(pttl as u64)
        } else {
            window
        };

        Ok(WindowHit {
            allowed,
            count,
            ceiling,
            ttl,
        })
    }
}
