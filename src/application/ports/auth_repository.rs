use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::auth::{PasswordResetToken, RefreshSession};

#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<&'static str>,
}

/// Refresh sessions, login attempts and password reset tokens.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn create_session(
        &self,
        tenant_id: Uuid,
        session: &NewSession,
    ) -> anyhow::Result<RefreshSession>;
    async fn find_session(&self, tenant_id: Uuid, jti: Uuid)
    -> anyhow::Result<Option<RefreshSession>>;
    /// Revokes `old_jti` and inserts `next` in one transaction. `None` when `old_jti` was
    /// already revoked, so only one of two racing refreshes wins.
    async fn rotate_session(
        &self,
        tenant_id: Uuid,
        old_jti: Uuid,
        next: &NewSession,
    ) -> anyhow::Result<Option<RefreshSession>>;
    async fn revoke_session(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        session_id: Uuid,
    ) -> anyhow::Result<u64>;
    async fn revoke_all_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        except_session: Option<Uuid>,
    ) -> anyhow::Result<u64>;
    async fn list_active_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RefreshSession>>;
    async fn is_session_active(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    async fn record_attempt(&self, tenant_id: Uuid, attempt: &NewLoginAttempt)
    -> anyhow::Result<()>;
    async fn count_failures_since(
        &self,
        tenant_id: Uuid,
        email: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<i64>;

    async fn create_reset_token(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
    async fn find_reset_token(
        &self,
        tenant_id: Uuid,
        token_hash: &str,
    ) -> anyhow::Result<Option<PasswordResetToken>>;
    async fn mark_reset_token_used(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
}
