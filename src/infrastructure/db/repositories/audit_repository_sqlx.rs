use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::application::ports::audit_repository::{AuditQuery, AuditRepository};
use crate::domain::audit::{AuditEntry, AuditLog};
use crate::infrastructure::db::{PgPool, begin_tenant_tx, text_col};

pub struct SqlxAuditRepository {
    pub pool: PgPool,
}

impl SqlxAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for SqlxAuditRepository {
    async fn record(&self, tenant_id: Uuid, entry: &AuditEntry) -> anyhow::Result<()> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        sqlx::query(
            r#"INSERT INTO audit_logs (tenant_id, user_id, action, entity_type, entity_id,
                   details, ip_address, user_agent)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(tenant_id)
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self, tenant_id: Uuid, q: &AuditQuery) -> anyhow::Result<Vec<AuditLog>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let rows = sqlx::query(
            r#"SELECT id, tenant_id, user_id, action, entity_type, entity_id, details,
                      ip_address, user_agent, created_at
               FROM audit_logs
               WHERE tenant_id = $1
                 AND ($2::text IS NULL OR entity_type = $2)
                 AND ($3::uuid IS NULL OR entity_id = $3)
                 AND ($4::uuid IS NULL OR user_id = $4)
               ORDER BY created_at DESC
               OFFSET $5 LIMIT $6"#,
        )
        .bind(tenant_id)
        .bind(&q.entity_type)
        .bind(q.entity_id)
        .bind(q.user_id)
        .bind(q.page.skip)
        .bind(q.page.limit)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.iter()
            .map(|r| {
                Ok(AuditLog {
                    id: r.get("id"),
                    tenant_id: r.get("tenant_id"),
                    user_id: r.get("user_id"),
                    action: text_col(r, "action")?,
                    entity_type: r.get("entity_type"),
                    entity_id: r.get("entity_id"),
                    details: r.get("details"),
                    ip_address: r.get("ip_address"),
                    user_agent: r.get("user_agent"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }
}
