use chrono::{DateTime, Utc};
use uuid::Uuid;

text_enum!(AuditAction {
    Created => "created",
    Updated => "updated",
    Deleted => "deleted",
    Dispensed => "dispensed",
    Renewed => "renewed",
    Archived => "archived",
    Cancelled => "cancelled",
    Viewed => "viewed",
    Printed => "printed",
    Exported => "exported",
});

#[derive(Debug, Clone)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An audit event before it is persisted.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Uuid,
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
