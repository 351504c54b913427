use async_trait::async_trait;
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::audit::{AuditEntry, AuditLog};

#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub page: Page,
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, tenant_id: Uuid, entry: &AuditEntry) -> anyhow::Result<()>;
    async fn list(&self, tenant_id: Uuid, query: &AuditQuery) -> anyhow::Result<Vec<AuditLog>>;
}

/// Writes an audit entry without letting a failure escape to the caller.
pub async fn record_quietly<A: AuditRepository + ?Sized>(
    repo: &A,
    tenant_id: Uuid,
    entry: AuditEntry,
) {
    if let Err(e) = repo.record(tenant_id, &entry).await {
        tracing::warn!(
            tenant_id = %tenant_id,
            entity_type = entry.entity_type,
            entity_id = %entry.entity_id,
            error = ?e,
            "audit_record_failed"
        );
    }
}
