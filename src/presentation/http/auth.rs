use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{delete, get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::use_cases::auth::change_password::ChangePassword;
use crate::application::use_cases::auth::login::{Login, LoginOutcome, LoginRequest as LoginDto};
use crate::application::use_cases::auth::logout::{Logout, LogoutAll};
use crate::application::use_cases::auth::me::GetMe;
use crate::application::use_cases::auth::password_reset::{
    CompletePasswordReset, RequestPasswordReset, VerifyResetToken,
};
use crate::application::use_cases::auth::refresh::{PresentedRefresh, RefreshTokens};
use crate::application::use_cases::auth::register::Register;
use crate::application::use_cases::auth::sessions::{
    ForceLogout, ListSessions, ListUserSessions, RevokeOtherSessions, RevokeSession,
};
use crate::application::use_cases::users::create_user::StaffRegistration;
use crate::bootstrap::app_context::AppContext;
use crate::domain::auth::RefreshSession;
use crate::domain::tenants::Tenant;
use crate::domain::users::{Gender, StaffRole};
use crate::presentation::http::client::{ClientInfo, enforce_rate_limit};
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::{
    CurrentUser, access_cookie, access_ttl, cleared_access_cookie, cookie_secure,
    issue_access_token, issue_refresh_token, refresh_ttl, require_refresh,
};
use crate::presentation::http::tenant::{self, TenantHint, TenantRef, identifier_required};
use crate::presentation::http::users::UserResponse;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Used when neither the tenant header nor a clinic subdomain names the tenant.
    pub tenant_slug: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub contact_number: String,
    pub role: StaffRole,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub employee_id: Option<String>,
    pub tenant_slug: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub is_current: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokedResponse {
    pub revoked: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetRequest {
    pub email: String,
    pub tenant_slug: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetVerifyRequest {
    pub token: String,
    pub tenant_slug: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetCompleteRequest {
    pub token: String,
    pub new_password: String,
    pub tenant_slug: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .route("/register", post(register))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
        .route("/sessions", get(list_sessions))
        .route("/sessions/revoke-others", post(revoke_other_sessions))
        .route("/sessions/:session_id", delete(revoke_session))
        .route("/users/:user_id/sessions", get(list_user_sessions))
        .route("/users/:user_id/force-logout", post(force_logout))
        .route("/password-reset/request", post(request_password_reset))
        .route("/password-reset/verify", post(verify_password_reset))
        .route("/password-reset/complete", post(complete_password_reset))
        .with_state(ctx)
}

/// Auth endpoints accept the tenant from the headers or, failing that, from the body.
async fn auth_tenant(
    ctx: &AppContext,
    hint: TenantHint,
    body_slug: Option<&str>,
) -> ApiResult<Tenant> {
    let reference = hint
        .0
        .or_else(|| body_slug.and_then(TenantRef::parse))
        .ok_or_else(identifier_required)?;
    tenant::resolve(ctx, &reference).await
}

fn session_response(s: RefreshSession, current: Uuid) -> SessionResponse {
    SessionResponse {
        is_current: s.session_id == current,
        session_id: s.session_id,
        created_at: s.created_at,
        expires_at: s.expires_at,
        user_agent: s.user_agent,
        ip_address: s.ip_address,
    }
}

fn token_pair(ctx: &AppContext, outcome: LoginOutcome) -> ApiResult<(HeaderMap, Json<TokenResponse>)> {
    let now = Utc::now();
    let access_token = issue_access_token(&ctx.cfg, &outcome.user, outcome.session.session_id, now)?;
    let refresh_token = issue_refresh_token(&ctx.cfg, &outcome.session, now)?;
    let expires_in = access_ttl(&ctx.cfg).num_seconds();

    let mut headers = HeaderMap::new();
    let cookie = access_cookie(&access_token, expires_in, cookie_secure(&ctx.cfg));
    if let Ok(v) = HeaderValue::from_str(&cookie) {
        headers.insert(axum::http::header::SET_COOKIE, v);
    }
    Ok((
        headers,
        Json(TokenResponse {
            access_token,
            refresh_token,
            token_type: "bearer",
            expires_in,
            user: outcome.user.into(),
        }),
    ))
}

#[utoipa::path(post, path = "/api/v2/auth/login", tag = "Auth", request_body = LoginRequest, security(()),
    responses((status = 200, body = TokenResponse), (status = 401), (status = 423), (status = 429)))]
pub async fn login(
    State(ctx): State<AppContext>,
    hint: TenantHint,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(HeaderMap, Json<TokenResponse>)> {
    enforce_rate_limit(&ctx, "login", &client, ctx.cfg.login_rate_limit_per_minute).await?;
    let tenant = auth_tenant(&ctx, hint, req.tenant_slug.as_deref()).await?;
    let users = ctx.user_repo();
    let auth = ctx.auth_repo();
    let uc = Login {
        users: users.as_ref(),
        auth: auth.as_ref(),
        refresh_ttl: refresh_ttl(&ctx.cfg),
    };
    let dto = LoginDto {
        email: req.email,
        password: req.password,
        ip_address: client.ip_address(),
        user_agent: client.user_agent,
    };
    let outcome = uc.execute(&tenant, &dto, Utc::now()).await?;
    token_pair(&ctx, outcome)
}

#[utoipa::path(post, path = "/api/v2/auth/refresh", tag = "Auth", request_body = RefreshRequest, security(()),
    responses((status = 200, body = TokenResponse), (status = 401)))]
pub async fn refresh(
    State(ctx): State<AppContext>,
    client: ClientInfo,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<(HeaderMap, Json<TokenResponse>)> {
    let claims = require_refresh(&ctx.cfg, &req.refresh_token)?;
    let tenant = tenant::resolve(&ctx, &TenantRef::Id(claims.tenant_id)).await?;
    let users = ctx.user_repo();
    let auth = ctx.auth_repo();
    let uc = RefreshTokens {
        users: users.as_ref(),
        auth: auth.as_ref(),
        refresh_ttl: refresh_ttl(&ctx.cfg),
    };
    let presented = PresentedRefresh {
        jti: claims.jti,
        user_id: claims.sub,
        session_id: claims.session_id,
        ip_address: client.ip_address(),
        user_agent: client.user_agent,
    };
    let outcome = uc.execute(tenant.id, &presented, Utc::now()).await?;
    token_pair(&ctx, outcome)
}

fn clear_cookie_headers(ctx: &AppContext) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&cleared_access_cookie(cookie_secure(&ctx.cfg))) {
        headers.insert(axum::http::header::SET_COOKIE, v);
    }
    headers
}

#[utoipa::path(post, path = "/api/v2/auth/logout", tag = "Auth", request_body = LogoutRequest,
    responses((status = 204)))]
pub async fn logout(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    body: Option<Json<LogoutRequest>>,
) -> ApiResult<(HeaderMap, StatusCode)> {
    let refresh_session = body
        .and_then(|Json(b)| b.refresh_token)
        .and_then(|t| require_refresh(&ctx.cfg, &t).ok())
        .filter(|c| c.sub == current.principal.user_id)
        .map(|c| c.session_id);
    let auth = ctx.auth_repo();
    Logout {
        auth: auth.as_ref(),
    }
    .execute(&current.principal, refresh_session)
    .await?;
    Ok((clear_cookie_headers(&ctx), StatusCode::NO_CONTENT))
}

#[utoipa::path(post, path = "/api/v2/auth/logout-all", tag = "Auth", responses((status = 204)))]
pub async fn logout_all(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<(HeaderMap, StatusCode)> {
    let auth = ctx.auth_repo();
    LogoutAll {
        auth: auth.as_ref(),
    }
    .execute(&current.principal)
    .await?;
    Ok((clear_cookie_headers(&ctx), StatusCode::NO_CONTENT))
}

#[utoipa::path(post, path = "/api/v2/auth/register", tag = "Auth", request_body = RegisterRequest, security(()),
    responses((status = 201, body = UserResponse), (status = 403), (status = 409)))]
pub async fn register(
    State(ctx): State<AppContext>,
    hint: TenantHint,
    client: ClientInfo,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    enforce_rate_limit(&ctx, "register", &client, ctx.cfg.register_rate_limit_per_minute).await?;
    let tenant = auth_tenant(&ctx, hint, req.tenant_slug.as_deref()).await?;
    let repo = ctx.user_repo();
    let uc = Register {
        repo: repo.as_ref(),
    };
    let registration = StaffRegistration {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        password: req.password,
        contact_number: req.contact_number,
        role: req.role,
        gender: req.gender,
        date_of_birth: req.date_of_birth,
        specialization: req.specialization,
        license_number: req.license_number,
        employee_id: req.employee_id,
        work_schedule: None,
    };
    let user = uc.execute(&tenant, &registration).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(get, path = "/api/v2/auth/me", tag = "Auth", responses((status = 200, body = UserResponse)))]
pub async fn me(State(ctx): State<AppContext>, current: CurrentUser) -> ApiResult<Json<UserResponse>> {
    let repo = ctx.user_repo();
    let uc = GetMe {
        repo: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal).await?.into()))
}

#[utoipa::path(post, path = "/api/v2/auth/change-password", tag = "Auth", request_body = ChangePasswordRequest,
    responses((status = 200, body = MessageResponse), (status = 400)))]
pub async fn change_password(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let users = ctx.user_repo();
    let auth = ctx.auth_repo();
    ChangePassword {
        users: users.as_ref(),
        auth: auth.as_ref(),
    }
    .execute(&current.principal, &req.current_password, &req.new_password)
    .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

#[utoipa::path(get, path = "/api/v2/auth/sessions", tag = "Auth",
    responses((status = 200, body = [SessionResponse])))]
pub async fn list_sessions(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let auth = ctx.auth_repo();
    let sessions = ListSessions {
        auth: auth.as_ref(),
    }
    .execute(&current.principal, Utc::now())
    .await?;
    let me = current.principal.session_id;
    Ok(Json(
        sessions.into_iter().map(|s| session_response(s, me)).collect(),
    ))
}

#[utoipa::path(delete, path = "/api/v2/auth/sessions/{session_id}", tag = "Auth",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses((status = 204), (status = 400), (status = 404)))]
pub async fn revoke_session(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let auth = ctx.auth_repo();
    RevokeSession {
        auth: auth.as_ref(),
    }
    .execute(&current.principal, session_id)
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/v2/auth/sessions/revoke-others", tag = "Auth",
    responses((status = 200, body = RevokedResponse)))]
pub async fn revoke_other_sessions(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<Json<RevokedResponse>> {
    let auth = ctx.auth_repo();
    let revoked = RevokeOtherSessions {
        auth: auth.as_ref(),
    }
    .execute(&current.principal)
    .await?;
    Ok(Json(RevokedResponse { revoked }))
}

#[utoipa::path(get, path = "/api/v2/auth/users/{user_id}/sessions", tag = "Auth",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = [SessionResponse])))]
pub async fn list_user_sessions(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let users = ctx.user_repo();
    let auth = ctx.auth_repo();
    let sessions = ListUserSessions {
        users: users.as_ref(),
        auth: auth.as_ref(),
    }
    .execute(&current.principal, user_id, Utc::now())
    .await?;
    let me = current.principal.session_id;
    Ok(Json(
        sessions.into_iter().map(|s| session_response(s, me)).collect(),
    ))
}

#[utoipa::path(post, path = "/api/v2/auth/users/{user_id}/force-logout", tag = "Auth",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = RevokedResponse), (status = 404)))]
pub async fn force_logout(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<RevokedResponse>> {
    let users = ctx.user_repo();
    let auth = ctx.auth_repo();
    let revoked = ForceLogout {
        users: users.as_ref(),
        auth: auth.as_ref(),
    }
    .execute(&current.principal, user_id)
    .await?;
    Ok(Json(RevokedResponse { revoked }))
}

#[utoipa::path(post, path = "/api/v2/auth/password-reset/request", tag = "Auth", request_body = ResetRequest,
    security(()), responses((status = 202, body = MessageResponse)))]
pub async fn request_password_reset(
    State(ctx): State<AppContext>,
    hint: TenantHint,
    Json(req): Json<ResetRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let tenant = auth_tenant(&ctx, hint, req.tenant_slug.as_deref()).await?;
    let users = ctx.user_repo();
    let auth = ctx.auth_repo();
    let issued = RequestPasswordReset {
        users: users.as_ref(),
        auth: auth.as_ref(),
    }
    .execute(tenant.id, &req.email, Utc::now())
    .await?;
    if let Some(raw) = issued {
        if ctx.cfg.is_production {
            tracing::info!(tenant_id = %tenant.id, "password_reset_issued");
        } else {
            tracing::debug!(tenant_id = %tenant.id, token = %raw, "password_reset_issued");
        }
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If the email is registered, a password reset link has been sent",
        }),
    ))
}

#[utoipa::path(post, path = "/api/v2/auth/password-reset/verify", tag = "Auth", request_body = ResetVerifyRequest,
    security(()), responses((status = 200, body = MessageResponse), (status = 400)))]
pub async fn verify_password_reset(
    State(ctx): State<AppContext>,
    hint: TenantHint,
    Json(req): Json<ResetVerifyRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let tenant = auth_tenant(&ctx, hint, req.tenant_slug.as_deref()).await?;
    let auth = ctx.auth_repo();
    VerifyResetToken {
        auth: auth.as_ref(),
    }
    .execute(tenant.id, &req.token, Utc::now())
    .await?;
    Ok(Json(MessageResponse {
        message: "Reset token is valid",
    }))
}

#[utoipa::path(post, path = "/api/v2/auth/password-reset/complete", tag = "Auth", request_body = ResetCompleteRequest,
    security(()), responses((status = 200, body = MessageResponse), (status = 400)))]
pub async fn complete_password_reset(
    State(ctx): State<AppContext>,
    hint: TenantHint,
    Json(req): Json<ResetCompleteRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let tenant = auth_tenant(&ctx, hint, req.tenant_slug.as_deref()).await?;
    let users = ctx.user_repo();
    let auth = ctx.auth_repo();
    CompletePasswordReset {
        users: users.as_ref(),
        auth: auth.as_ref(),
    }
    .execute(tenant.id, &req.token, &req.new_password, Utc::now())
    .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset",
    }))
}

