use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::application::ports::cache_port::CachePort;
use crate::application::services::checksum::sha256_hex;

pub const KEY_PREFIX: &str = "dental_clinic_saas";

/// `dental_clinic_saas:<tenant>:<scope>:<hash>`, the hash covering the request parameters.
pub fn tenant_key(tenant_id: Uuid, scope: &str, params: &str) -> String {
    let digest = sha256_hex(params.as_bytes());
    format!("{KEY_PREFIX}:{tenant_id}:{scope}:{}", &digest[..16])
}

/// Glob matching every key written under `scope` for the tenant.
pub fn tenant_scope_pattern(tenant_id: Uuid, scope: &str) -> String {
    format!("{KEY_PREFIX}:{tenant_id}:{scope}:*")
}

pub async fn connect(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(redis_url).context("redis_client_open")?;
    let manager = ConnectionManager::new(client)
        .await
        .context("redis_connection_manager")?;
    Ok(manager)
}

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn scan_delete(&self, pattern: &str) -> anyhow::Result<u64> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0u64;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .context("redis_scan")?;
            if !keys.is_empty() {
                let n: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .context("redis_del")?;
                removed += n;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }
}

#[async_trait]
impl CachePort for RedisCache {
    fn enabled(&self) -> bool {
        true
    }

    async fn get_json(&self, key: &str) -> Option<serde_json::Value> {
        let mut conn = self.conn.clone();
        let raw: redis::RedisResult<Option<String>> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await;
        match raw {
            Ok(Some(text)) => serde_json::from_str(&text).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = ?e, "cache_get_failed");
                None
            }
        }
    }

    async fn set_json(&self, key: &str, value: &serde_json::Value, ttl_secs: u64) {
        let mut conn = self.conn.clone();
        let res: redis::RedisResult<()> = redis::cmd("SET")
            .arg(key)
            .arg(value.to_string())
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut conn)
            .await;
        if let Err(e) = res {
            tracing::warn!(key, error = ?e, "cache_set_failed");
        }
    }

    async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        match self.scan_delete(pattern).await {
            Ok(n) => {
                tracing::debug!(pattern, removed = n, "cache_invalidated");
                n
            }
            Err(e) => {
                tracing::warn!(pattern, error = ?e, "cache_invalidate_failed");
                0
            }
        }
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}

/// Stand-in used when caching is switched off or Redis is unreachable.
#[derive(Debug, Clone, Default)]
pub struct NoopCache;

#[async_trait]
impl CachePort for NoopCache {
    fn enabled(&self) -> bool {
        false
    }

    async fn get_json(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    async fn set_json(&self, _key: &str, _value: &serde_json::Value, _ttl_secs: u64) {}

    async fn invalidate_pattern(&self, _pattern: &str) -> u64 {
        0
    }

    async fn ping(&self) -> bool {
        false
    }
}
