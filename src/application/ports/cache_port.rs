use async_trait::async_trait;

/// Best-effort JSON cache. Failures behave like misses.
#[async_trait]
pub trait CachePort: Send + Sync {
    fn enabled(&self) -> bool;
    async fn get_json(&self, key: &str) -> Option<serde_json::Value>;
    async fn set_json(&self, key: &str, value: &serde_json::Value, ttl_secs: u64);
    /// Deletes every key matching the glob `pattern`; returns how many were removed.
    async fn invalidate_pattern(&self, pattern: &str) -> u64;
    async fn ping(&self) -> bool;
}
