use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::bootstrap::app_context::AppContext;
use crate::bootstrap::config::Config;
use crate::domain::tenants::Tenant;
use crate::presentation::http::error::{ApiError, ApiResult};

/// How a request names its clinic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantRef {
    Id(Uuid),
    Slug(String),
}

impl TenantRef {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match Uuid::parse_str(raw) {
            Ok(id) => TenantRef::Id(id),
            Err(_) => TenantRef::Slug(raw.to_ascii_lowercase()),
        })
    }

    pub fn matches(&self, tenant: &Tenant) -> bool {
        match self {
            TenantRef::Id(id) => *id == tenant.id,
            TenantRef::Slug(slug) => *slug == tenant.slug,
        }
    }
}

/// First label of `host` when it looks like `<clinic>.<domain>.<tld>`.
pub fn subdomain_of(host: &str) -> Option<String> {
    let host = host.split(':').next().unwrap_or_default().trim();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 {
        return None;
    }
    let first = labels[0].to_ascii_lowercase();
    if first.is_empty() || first == "www" || first == "api" {
        return None;
    }
    Some(first)
}

/// Header first, then subdomain.
pub fn tenant_ref_from_headers(cfg: &Config, headers: &HeaderMap) -> Option<TenantRef> {
    if let Some(found) = headers
        .get(cfg.tenant_id_header.as_str())
        .and_then(|v| v.to_str().ok())
        .and_then(TenantRef::parse)
    {
        return Some(found);
    }
    if !cfg.tenant_subdomain_enabled {
        return None;
    }
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(subdomain_of)
        .map(TenantRef::Slug)
}

pub async fn lookup(ctx: &AppContext, reference: &TenantRef) -> ApiResult<Option<Tenant>> {
    let repo = ctx.tenant_repo();
    let found = match reference {
        TenantRef::Id(id) => repo.find_by_id(*id).await?,
        TenantRef::Slug(slug) => repo.find_by_slug(slug).await?,
    };
    Ok(found)
}

/// Loads the tenant and refuses unknown or inactive clinics.
pub async fn resolve(ctx: &AppContext, reference: &TenantRef) -> ApiResult<Tenant> {
    let tenant = lookup(ctx, reference)
        .await?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;
    if !tenant.is_active() {
        tracing::debug!(tenant_id = %tenant.id, status = %tenant.status, "tenant_inactive");
        return Err(ApiError::forbidden("Tenant is not active"));
    }
    Ok(tenant)
}

pub fn identifier_required() -> ApiError {
    ApiError::bad_request("Tenant identifier required")
}

/// The identifier named by the request headers, if any. Never rejects.
pub struct TenantHint(pub Option<TenantRef>);

#[axum::async_trait]
impl FromRequestParts<AppContext> for TenantHint {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        Ok(TenantHint(tenant_ref_from_headers(&ctx.cfg, &parts.headers)))
    }
}

/// An active tenant resolved from the request headers.
pub struct TenantContext(pub Tenant);

#[axum::async_trait]
impl FromRequestParts<AppContext> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let reference =
            tenant_ref_from_headers(&ctx.cfg, &parts.headers).ok_or_else(identifier_required)?;
        Ok(TenantContext(resolve(ctx, &reference).await?))
    }
}
