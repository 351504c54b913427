use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::access::Principal;
use crate::bootstrap::app_context::AppContext;
use crate::bootstrap::config::Config;
use crate::domain::auth::RefreshSession;
use crate::domain::tenants::Tenant;
use crate::domain::users::{StaffRole, User};
use crate::presentation::http::error::{ApiError, ApiResult};
use crate::presentation::http::tenant::{TenantRef, tenant_ref_from_headers};

pub const ACCESS_COOKIE: &str = "access_token";
const ACCESS_TYPE: &str = "access";
const REFRESH_TYPE: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: StaffRole,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub jti: Uuid,
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

fn encoding_key(cfg: &Config) -> EncodingKey {
    EncodingKey::from_secret(cfg.secret_key.as_bytes())
}

fn decoding_key(cfg: &Config) -> DecodingKey {
    DecodingKey::from_secret(cfg.secret_key.as_bytes())
}

pub fn access_ttl(cfg: &Config) -> Duration {
    Duration::minutes(cfg.access_token_expire_minutes)
}

pub fn refresh_ttl(cfg: &Config) -> Duration {
    Duration::days(cfg.refresh_token_expire_days)
}

pub fn issue_access_token(
    cfg: &Config,
    user: &User,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = AccessClaims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        tenant_id: user.tenant_id,
        session_id,
        token_type: ACCESS_TYPE.into(),
        iat: now.timestamp(),
        exp: (now + access_ttl(cfg)).timestamp(),
    };
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &encoding_key(cfg),
    )?)
}

/// The refresh token's expiry mirrors its session row.
pub fn issue_refresh_token(
    cfg: &Config,
    session: &RefreshSession,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = RefreshClaims {
        jti: session.id,
        sub: session.user_id,
        tenant_id: session.tenant_id,
        session_id: session.session_id,
        token_type: REFRESH_TYPE.into(),
        iat: now.timestamp(),
        exp: session.expires_at.timestamp(),
    };
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &encoding_key(cfg),
    )?)
}

pub fn decode_access_token(cfg: &Config, token: &str) -> Option<AccessClaims> {
    let data = jsonwebtoken::decode::<AccessClaims>(
        token,
        &decoding_key(cfg),
        &Validation::new(Algorithm::HS256),
    )
    .ok()?;
    (data.claims.token_type == ACCESS_TYPE).then_some(data.claims)
}

pub fn decode_refresh_token(cfg: &Config, token: &str) -> Option<RefreshClaims> {
    let data = jsonwebtoken::decode::<RefreshClaims>(
        token.trim(),
        &decoding_key(cfg),
        &Validation::new(Algorithm::HS256),
    )
    .ok()?;
    (data.claims.token_type == REFRESH_TYPE).then_some(data.claims)
}

// --- Bearer extraction & cookies ---

pub fn get_cookie(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header.split(';').find_map(|part| {
        let (k, v) = part.trim().split_once('=')?;
        (k.trim() == name).then(|| v.trim().to_string())
    })
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(t) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(t.trim().to_string());
    }
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|c| get_cookie(c, ACCESS_COOKIE))
        .filter(|t| !t.is_empty())
}

pub fn access_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let secure_attr = if secure { "; Secure" } else { "" };
    format!(
        "{ACCESS_COOKIE}={token}; HttpOnly{secure_attr}; Path=/; Max-Age={}; SameSite=Lax",
        max_age_secs.max(0)
    )
}

pub fn cleared_access_cookie(secure: bool) -> String {
    access_cookie("", 0, secure)
}

// --- Authenticated principal ---

/// The token's tenant must be the one the request names (when it names one) and be active.
pub fn check_token_tenant(requested: Option<&TenantRef>, tenant: &Tenant) -> ApiResult<()> {
    if let Some(reference) = requested {
        if !reference.matches(tenant) {
            tracing::warn!(
                token_tenant = %tenant.id,
                requested = ?reference,
                "token_tenant_mismatch"
            );
            return Err(ApiError::forbidden("Token does not belong to this tenant"));
        }
    }
    if !tenant.is_active() {
        return Err(ApiError::forbidden("Tenant is not active"));
    }
    Ok(())
}

/// A validated caller: token, tenant, user and live session all check out.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub principal: Principal,
    pub tenant: Tenant,
    pub user: User,
}

#[axum::async_trait]
impl FromRequestParts<AppContext> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        let claims = decode_access_token(&ctx.cfg, &token).ok_or_else(ApiError::unauthorized)?;

        let tenant = ctx
            .tenant_repo()
            .find_by_id(claims.tenant_id)
            .await?
            .ok_or_else(ApiError::unauthorized)?;
        let requested = tenant_ref_from_headers(&ctx.cfg, &parts.headers);
        check_token_tenant(requested.as_ref(), &tenant)?;

        let user = ctx
            .user_repo()
            .find_by_id(tenant.id, claims.sub)
            .await?
            .ok_or_else(ApiError::unauthorized)?;
        if !user.is_active {
            return Err(ApiError::forbidden("Inactive user"));
        }
        if !ctx
            .auth_repo()
            .is_session_active(tenant.id, claims.session_id, Utc::now())
            .await?
        {
            tracing::debug!(session_id = %claims.session_id, "session_revoked_or_expired");
            return Err(ApiError::unauthorized());
        }

        Ok(CurrentUser {
            principal: Principal {
                user_id: user.id,
                tenant_id: tenant.id,
                session_id: claims.session_id,
                email: user.email.clone(),
                role: user.role,
            },
            tenant,
            user,
        })
    }
}

pub fn cookie_secure(cfg: &Config) -> bool {
    cfg.is_production
}

pub fn require_refresh(cfg: &Config, token: &str) -> ApiResult<RefreshClaims> {
    decode_refresh_token(cfg, token)
        .ok_or_else(|| ApiError::new(axum::http::StatusCode::UNAUTHORIZED, "Invalid refresh token"))
}
