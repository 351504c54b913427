use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;

use crate::application::ports::rate_limiter::RateLimiter;

const WINDOW_SECS: i64 = 60;

fn window_key(scope: &str, client: &str) -> String {
    format!("rate:{scope}:{client}")
}

/// Fixed one-minute windows kept in process memory.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, (i64, u32)>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn hit(&self, key: String, per_minute: u32, now_secs: i64) -> bool {
        let window = now_secs / WINDOW_SECS;
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        windows.retain(|_, (w, _)| *w == window);
        let entry = windows.entry(key).or_insert((window, 0));
        entry.1 += 1;
        entry.1 <= per_minute
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn allow(&self, scope: &str, client: &str, per_minute: u32) -> bool {
        self.hit(window_key(scope, client), per_minute, Utc::now().timestamp())
    }
}

/// Redis `INCR` + `EXPIRE` counters shared across instances; falls back to the in-process
/// window when Redis errors.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    fallback: MemoryRateLimiter,
}

impl RedisRateLimiter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            fallback: MemoryRateLimiter::new(),
        }
    }

    async fn incr(&self, key: &str) -> anyhow::Result<u32> {
        let mut conn = self.conn.clone();
        let count: u32 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("redis_incr")?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(WINDOW_SECS)
                .query_async(&mut conn)
                .await
                .context("redis_expire")?;
        }
        Ok(count)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, scope: &str, client: &str, per_minute: u32) -> bool {
        let key = window_key(scope, client);
        match self.incr(&key).await {
            Ok(count) => count <= per_minute,
            Err(e) => {
                tracing::warn!(key = %key, error = ?e, "rate_limit_redis_failed");
                self.fallback.allow(scope, client, per_minute).await
            }
        }
    }
}
