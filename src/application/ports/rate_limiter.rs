use async_trait::async_trait;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts a hit for `client` in `scope`; false once more than `per_minute` hits landed in the
    /// current minute.
    async fn allow(&self, scope: &str, client: &str, per_minute: u32) -> bool;
}
