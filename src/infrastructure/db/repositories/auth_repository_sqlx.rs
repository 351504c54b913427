use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::auth_repository::{AuthRepository, NewLoginAttempt, NewSession};
use crate::domain::auth::{PasswordResetToken, RefreshSession};
use crate::infrastructure::db::{PgPool, begin_tenant_tx};

const SESSION_COLUMNS: &str = r#"id, tenant_id, user_id, session_id, expires_at, is_revoked,
    revoked_at, user_agent, ip_address, created_at"#;

pub struct SqlxAuthRepository {
    pub pool: PgPool,
}

impl SqlxAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_session(r: &PgRow) -> RefreshSession {
    RefreshSession {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        user_id: r.get("user_id"),
        session_id: r.get("session_id"),
        expires_at: r.get("expires_at"),
        is_revoked: r.get("is_revoked"),
        revoked_at: r.get("revoked_at"),
        user_agent: r.get("user_agent"),
        ip_address: r.get("ip_address"),
        created_at: r.get("created_at"),
    }
}

async fn insert_session(
    conn: &mut sqlx::PgConnection,
    tenant_id: Uuid,
    s: &NewSession,
) -> anyhow::Result<RefreshSession> {
    let sql = format!(
        r#"INSERT INTO refresh_tokens (id, tenant_id, user_id, session_id, expires_at,
               user_agent, ip_address)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           RETURNING {SESSION_COLUMNS}"#
    );
    let row = sqlx::query(&sql)
        .bind(s.id)
        .bind(tenant_id)
        .bind(s.user_id)
        .bind(s.session_id)
        .bind(s.expires_at)
        .bind(&s.user_agent)
        .bind(&s.ip_address)
        .fetch_one(&mut *conn)
        .await?;
    Ok(map_session(&row))
}

#[async_trait]
impl AuthRepository for SqlxAuthRepository {
    async fn create_session(
        &self,
        tenant_id: Uuid,
        session: &NewSession,
    ) -> anyhow::Result<RefreshSession> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let created = insert_session(&mut tx, tenant_id, session).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn find_session(
        &self,
        tenant_id: Uuid,
        jti: Uuid,
    ) -> anyhow::Result<Option<RefreshSession>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM refresh_tokens WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(jti)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.as_ref().map(map_session))
    }

    async fn rotate_session(
        &self,
        tenant_id: Uuid,
        old_jti: Uuid,
        next: &NewSession,
    ) -> anyhow::Result<Option<RefreshSession>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let res = sqlx::query(
            r#"UPDATE refresh_tokens SET is_revoked = true, revoked_at = now()
               WHERE tenant_id = $1 AND id = $2 AND NOT is_revoked"#,
        )
        .bind(tenant_id)
        .bind(old_jti)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        let created = insert_session(&mut tx, tenant_id, next).await?;
        tx.commit().await?;
        Ok(Some(created))
    }

    async fn revoke_session(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        session_id: Uuid,
    ) -> anyhow::Result<u64> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let res = sqlx::query(
            r#"UPDATE refresh_tokens SET is_revoked = true, revoked_at = now()
               WHERE tenant_id = $1 AND user_id = $2 AND session_id = $3 AND NOT is_revoked"#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(res.rows_affected())
    }

    async fn revoke_all_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        except_session: Option<Uuid>,
    ) -> anyhow::Result<u64> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let res = sqlx::query(
            r#"UPDATE refresh_tokens SET is_revoked = true, revoked_at = now()
               WHERE tenant_id = $1 AND user_id = $2 AND NOT is_revoked
                 AND ($3::uuid IS NULL OR session_id <> $3)"#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(except_session)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(res.rows_affected())
    }

    async fn list_active_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RefreshSession>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {SESSION_COLUMNS} FROM refresh_tokens
               WHERE tenant_id = $1 AND user_id = $2 AND NOT is_revoked AND expires_at > $3
               ORDER BY created_at DESC"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(user_id)
            .bind(now)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows.iter().map(map_session).collect())
    }

    async fn is_session_active(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let row = sqlx::query(
            r#"SELECT EXISTS (
                   SELECT 1 FROM refresh_tokens
                   WHERE tenant_id = $1 AND session_id = $2 AND NOT is_revoked AND expires_at > $3
               ) AS active"#,
        )
        .bind(tenant_id)
        .bind(session_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.get("active"))
    }

    async fn record_attempt(
        &self,
        tenant_id: Uuid,
        attempt: &NewLoginAttempt,
    ) -> anyhow::Result<()> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        sqlx::query(
            r#"INSERT INTO login_attempts (tenant_id, email, ip_address, user_agent, success,
                   failure_reason)
               VALUES ($1, lower($2), $3, $4, $5, $6)"#,
        )
        .bind(tenant_id)
        .bind(&attempt.email)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.success)
        .bind(attempt.failure_reason)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count_failures_since(
        &self,
        tenant_id: Uuid,
        email: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS n FROM login_attempts
               WHERE tenant_id = $1 AND email = lower($2) AND NOT success AND attempted_at > $3"#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(since)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.get("n"))
    }

    async fn create_reset_token(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        sqlx::query(
            r#"INSERT INTO password_reset_tokens (tenant_id, user_id, token_hash, expires_at)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_reset_token(
        &self,
        tenant_id: Uuid,
        token_hash: &str,
    ) -> anyhow::Result<Option<PasswordResetToken>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let row = sqlx::query(
            r#"SELECT id, tenant_id, user_id, token_hash, created_at, expires_at, is_used, used_at
               FROM password_reset_tokens WHERE tenant_id = $1 AND token_hash = $2"#,
        )
        .bind(tenant_id)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.map(|r| PasswordResetToken {
            id: r.get("id"),
            tenant_id: r.get("tenant_id"),
            user_id: r.get("user_id"),
            token_hash: r.get("token_hash"),
            created_at: r.get("created_at"),
            expires_at: r.get("expires_at"),
            is_used: r.get("is_used"),
            used_at: r.get("used_at"),
        }))
    }

    async fn mark_reset_token_used(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let res = sqlx::query(
            r#"UPDATE password_reset_tokens SET is_used = true, used_at = $3
               WHERE tenant_id = $1 AND id = $2 AND NOT is_used"#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }
}
