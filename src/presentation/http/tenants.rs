use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::tenant_repository::{TenantPatch, TenantStats};
use crate::application::use_cases::tenants::manage_tenants::{
    DeactivateTenant, GetTenant, ListPublicTenants, ListTenants, UpdateTenant,
};
use crate::application::use_cases::tenants::register_tenant::{
    CreateTenant, RegisterTenant, TenantDetails,
};
use crate::application::use_cases::tenants::reports::{
    CheckTenantHealth, GetTenantStats, GetTenantUsage, TenantHealth, UsageReport,
};
use crate::application::use_cases::users::create_user::StaffRegistration;
use crate::bootstrap::app_context::AppContext;
use crate::domain::tenants::{
    BillingCycle, PaymentStatus, Tenant, TenantStatus, TenantTier,
};
use crate::domain::users::{Gender, StaffRole};
use crate::presentation::http::client::{ClientInfo, enforce_rate_limit};
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;
use crate::presentation::http::tenant::TenantContext;
use crate::presentation::http::users::UserResponse;

#[derive(Debug, Serialize, ToSchema)]
pub struct TenantResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub tier: TenantTier,
    pub payment_status: PaymentStatus,
    pub status: TenantStatus,
    pub billing_cycle: BillingCycle,
    pub subscription_id: Option<String>,
    pub max_users: i32,
    pub max_patients: i32,
    pub max_storage_gb: i32,
    pub max_api_calls_per_month: i32,
    #[schema(value_type = Object)]
    pub enabled_features: serde_json::Value,
    #[schema(value_type = Object)]
    pub settings: serde_json::Value,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub activation_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name,
            slug: t.slug,
            contact_email: t.contact_email,
            contact_phone: t.contact_phone,
            address: t.address,
            tier: t.tier,
            payment_status: t.payment_status,
            status: t.status,
            billing_cycle: t.billing_cycle,
            subscription_id: t.subscription_id,
            max_users: t.max_users,
            max_patients: t.max_patients,
            max_storage_gb: t.max_storage_gb,
            max_api_calls_per_month: t.max_api_calls_per_month,
            enabled_features: t.enabled_features,
            settings: t.settings,
            trial_ends_at: t.trial_ends_at,
            subscription_ends_at: t.subscription_ends_at,
            grace_period_ends_at: t.grace_period_ends_at,
            activation_date: t.activation_date,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicTenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TierFeaturesResponse {
    pub max_users: i32,
    pub max_patients: i32,
    pub max_storage_gb: i32,
    pub max_api_calls_per_month: i32,
    pub features: Vec<&'static str>,
    pub support_level: &'static str,
    pub price: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TenantInfoResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub tier: TenantTier,
    pub status: TenantStatus,
    pub payment_status: PaymentStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub trial_days_remaining: i64,
    pub features: TierFeaturesResponse,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub contact_number: String,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterTenantRequest {
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub admin: AdminAccount,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterTenantResponse {
    pub tenant: TenantResponse,
    pub admin: UserResponse,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTenantRequest {
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub tier: Option<TenantTier>,
    pub billing_cycle: Option<BillingCycle>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub tier: Option<TenantTier>,
    pub billing_cycle: Option<BillingCycle>,
    #[schema(value_type = Option<Object>)]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TenantStatsResponse {
    pub tenant_id: Uuid,
    pub users: i64,
    pub patients: i64,
    pub appointments: i64,
    pub invoices: i64,
    pub monthly_revenue: f64,
    pub active_patients: i64,
}

impl TenantStatsResponse {
    fn new(tenant_id: Uuid, s: TenantStats) -> Self {
        Self {
            tenant_id,
            users: s.users,
            patients: s.patients,
            appointments: s.appointments,
            invoices: s.invoices,
            monthly_revenue: s.monthly_revenue,
            active_patients: s.active_patients,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageResponse {
    pub tenant_id: Uuid,
    pub users: i64,
    pub max_users: i32,
    pub patients: i64,
    pub max_patients: i32,
    pub storage_gb: f64,
    pub max_storage_gb: i32,
}

impl From<UsageReport> for UsageResponse {
    fn from(u: UsageReport) -> Self {
        Self {
            tenant_id: u.tenant_id,
            users: u.users,
            max_users: u.max_users,
            patients: u.patients,
            max_patients: u.max_patients,
            storage_gb: (u.storage_gb * 1000.0).round() / 1000.0,
            max_storage_gb: u.max_storage_gb,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TenantHealthResponse {
    pub tenant_id: Uuid,
    pub status: TenantStatus,
    pub payment_status: PaymentStatus,
    pub login_allowed: bool,
    pub login_message: Option<&'static str>,
    pub trial_days_remaining: i64,
    pub user_limit_reached: bool,
    pub patient_limit_reached: bool,
    pub usage: UsageResponse,
}

impl From<TenantHealth> for TenantHealthResponse {
    fn from(h: TenantHealth) -> Self {
        Self {
            tenant_id: h.tenant_id,
            status: h.status,
            payment_status: h.payment_status,
            login_allowed: h.login_allowed,
            login_message: h.login_message,
            trial_days_remaining: h.trial_days_remaining,
            user_limit_reached: h.user_limit_reached,
            patient_limit_reached: h.patient_limit_reached,
            usage: h.usage.into(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/tenants/register", post(register_tenant))
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route(
            "/tenants/:id",
            get(get_tenant).put(update_tenant).delete(delete_tenant),
        )
        .route("/tenants/:id/stats", get(tenant_stats))
        .route("/tenants/:id/usage", get(tenant_usage))
        .route("/public/tenants", get(list_public_tenants))
        .route("/tenant-info", get(tenant_info))
        .route("/tenant/health", get(tenant_health))
        .with_state(ctx)
}

#[utoipa::path(post, path = "/api/v2/tenants/register", tag = "Tenants", request_body = RegisterTenantRequest,
    security(()), responses((status = 201, body = RegisterTenantResponse), (status = 409), (status = 429)))]
pub async fn register_tenant(
    State(ctx): State<AppContext>,
    client: ClientInfo,
    Json(req): Json<RegisterTenantRequest>,
) -> ApiResult<(StatusCode, Json<RegisterTenantResponse>)> {
    enforce_rate_limit(
        &ctx,
        "tenant_create",
        &client,
        ctx.cfg.tenant_create_rate_limit_per_minute,
    )
    .await?;
    let details = TenantDetails {
        name: req.name,
        slug: req.slug,
        contact_email: req.contact_email,
        contact_phone: req.contact_phone,
        address: req.address,
        tier: TenantTier::Trial,
        billing_cycle: req.billing_cycle.unwrap_or(BillingCycle::Monthly),
    };
    let admin = StaffRegistration {
        first_name: req.admin.first_name,
        last_name: req.admin.last_name,
        email: req.admin.email,
        password: req.admin.password,
        contact_number: req.admin.contact_number,
        role: StaffRole::Admin,
        gender: req.admin.gender,
        date_of_birth: req.admin.date_of_birth,
        specialization: None,
        license_number: None,
        employee_id: None,
        work_schedule: None,
    };
    let repo = ctx.tenant_repo();
    let uc = RegisterTenant {
        repo: repo.as_ref(),
    };
    let (tenant, user) = uc.execute(&details, &admin, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterTenantResponse {
            tenant: tenant.into(),
            admin: user.into(),
        }),
    ))
}

#[utoipa::path(post, path = "/api/v2/tenants", tag = "Tenants", request_body = CreateTenantRequest,
    responses((status = 201, body = TenantResponse), (status = 409)))]
pub async fn create_tenant(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    client: ClientInfo,
    Json(req): Json<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<TenantResponse>)> {
    enforce_rate_limit(
        &ctx,
        "tenant_create",
        &client,
        ctx.cfg.tenant_create_rate_limit_per_minute,
    )
    .await?;
    let details = TenantDetails {
        name: req.name,
        slug: req.slug,
        contact_email: req.contact_email,
        contact_phone: req.contact_phone,
        address: req.address,
        tier: req.tier.unwrap_or(TenantTier::Trial),
        billing_cycle: req.billing_cycle.unwrap_or(BillingCycle::Monthly),
    };
    let repo = ctx.tenant_repo();
    let uc = CreateTenant {
        repo: repo.as_ref(),
    };
    let tenant = uc
        .execute(&current.principal, &details, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(tenant.into())))
}

#[utoipa::path(get, path = "/api/v2/tenants", tag = "Tenants", params(PageQuery),
    responses((status = 200, body = [TenantResponse])))]
pub async fn list_tenants(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<PageQuery>,
) -> ApiResult<Json<Vec<TenantResponse>>> {
    let repo = ctx.tenant_repo();
    let uc = ListTenants {
        repo: repo.as_ref(),
    };
    let tenants = uc
        .execute(&current.principal, Page::new(q.skip, q.limit))
        .await?;
    Ok(Json(tenants.into_iter().map(TenantResponse::from).collect()))
}

#[utoipa::path(get, path = "/api/v2/tenants/{id}", tag = "Tenants",
    params(("id" = Uuid, Path, description = "Tenant id")),
    responses((status = 200, body = TenantResponse), (status = 403)))]
pub async fn get_tenant(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TenantResponse>> {
    let repo = ctx.tenant_repo();
    let uc = GetTenant {
        repo: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

#[utoipa::path(put, path = "/api/v2/tenants/{id}", tag = "Tenants", request_body = UpdateTenantRequest,
    params(("id" = Uuid, Path, description = "Tenant id")),
    responses((status = 200, body = TenantResponse)))]
pub async fn update_tenant(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTenantRequest>,
) -> ApiResult<Json<TenantResponse>> {
    let repo = ctx.tenant_repo();
    let uc = UpdateTenant {
        repo: repo.as_ref(),
    };
    let patch = TenantPatch {
        name: req.name,
        contact_email: req.contact_email,
        contact_phone: req.contact_phone,
        address: req.address,
        tier: req.tier,
        billing_cycle: req.billing_cycle,
        settings: req.settings,
        ..TenantPatch::default()
    };
    Ok(Json(uc.execute(&current.principal, id, &patch).await?.into()))
}

#[utoipa::path(delete, path = "/api/v2/tenants/{id}", tag = "Tenants",
    params(("id" = Uuid, Path, description = "Tenant id")),
    responses((status = 204)))]
pub async fn delete_tenant(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let repo = ctx.tenant_repo();
    DeactivateTenant {
        repo: repo.as_ref(),
    }
    .execute(&current.principal, id)
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/api/v2/tenants/{id}/stats", tag = "Tenants",
    params(("id" = Uuid, Path, description = "Tenant id")),
    responses((status = 200, body = TenantStatsResponse)))]
pub async fn tenant_stats(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TenantStatsResponse>> {
    let repo = ctx.tenant_repo();
    let stats = GetTenantStats {
        repo: repo.as_ref(),
    }
    .execute(&current.principal, id, Utc::now())
    .await?;
    Ok(Json(TenantStatsResponse::new(id, stats)))
}

#[utoipa::path(get, path = "/api/v2/tenants/{id}/usage", tag = "Tenants",
    params(("id" = Uuid, Path, description = "Tenant id")),
    responses((status = 200, body = UsageResponse)))]
pub async fn tenant_usage(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UsageResponse>> {
    let repo = ctx.tenant_repo();
    let usage = GetTenantUsage {
        repo: repo.as_ref(),
    }
    .execute(&current.principal, id)
    .await?;
    Ok(Json(usage.into()))
}

#[utoipa::path(get, path = "/api/v2/public/tenants", tag = "Tenants", security(()),
    responses((status = 200, body = [PublicTenant])))]
pub async fn list_public_tenants(State(ctx): State<AppContext>) -> ApiResult<Json<Vec<PublicTenant>>> {
    let repo = ctx.tenant_repo();
    let tenants = ListPublicTenants {
        repo: repo.as_ref(),
    }
    .execute()
    .await?;
    Ok(Json(
        tenants
            .into_iter()
            .map(|t| PublicTenant {
                id: t.id,
                name: t.name,
                slug: t.slug,
            })
            .collect(),
    ))
}

#[utoipa::path(get, path = "/api/v2/tenant-info", tag = "Tenants", security(()),
    responses((status = 200, body = TenantInfoResponse), (status = 400), (status = 404)))]
pub async fn tenant_info(TenantContext(tenant): TenantContext) -> Json<TenantInfoResponse> {
    let f = tenant.tier.features();
    Json(TenantInfoResponse {
        trial_days_remaining: tenant.trial_days_remaining(Utc::now()),
        id: tenant.id,
        name: tenant.name,
        slug: tenant.slug,
        tier: tenant.tier,
        status: tenant.status,
        payment_status: tenant.payment_status,
        trial_ends_at: tenant.trial_ends_at,
        features: TierFeaturesResponse {
            max_users: f.max_users,
            max_patients: f.max_patients,
            max_storage_gb: f.max_storage_gb,
            max_api_calls_per_month: f.max_api_calls_per_month,
            features: f.features,
            support_level: f.support_level,
            price: f.price,
        },
    })
}

#[utoipa::path(get, path = "/api/v2/tenant/health", tag = "Tenants", security(()),
    responses((status = 200, body = TenantHealthResponse)))]
pub async fn tenant_health(
    State(ctx): State<AppContext>,
    TenantContext(tenant): TenantContext,
) -> ApiResult<Json<TenantHealthResponse>> {
    let repo = ctx.tenant_repo();
    let health = CheckTenantHealth {
        repo: repo.as_ref(),
    }
    .execute(&tenant, Utc::now())
    .await?;
    Ok(Json(health.into()))
}
