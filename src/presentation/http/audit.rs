use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::audit_repository::AuditQuery;
use crate::application::use_cases::audit_logs::ListAuditLogs;
use crate::bootstrap::app_context::AppContext;
use crate::domain::audit::{AuditAction, AuditLog};
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(a: AuditLog) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            action: a.action,
            entity_type: a.entity_type,
            entity_id: a.entity_id,
            details: a.details,
            ip_address: a.ip_address,
            user_agent: a.user_agent,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditLogsQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/audit-logs", get(list_audit_logs))
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/audit-logs", tag = "Audit", params(AuditLogsQuery),
    responses((status = 200, body = [AuditLogResponse]), (status = 403)))]
pub async fn list_audit_logs(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<AuditLogsQuery>,
) -> ApiResult<Json<Vec<AuditLogResponse>>> {
    let repo = ctx.audit_repo();
    let uc = ListAuditLogs {
        audit: repo.as_ref(),
    };
    let query = AuditQuery {
        entity_type: q.entity_type,
        entity_id: q.entity_id,
        user_id: q.user_id,
        page: Page::new(q.skip, q.limit),
    };
    let rows = uc.execute(&current.principal, &query).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
