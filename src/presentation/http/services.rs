use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::catalog_repository::{CategorySummary, NewService, ServiceQuery};
use crate::application::use_cases::services::catalog::{
    CategoriesSummary, CreateService, DeactivateService, GetService, ListServices, ServiceChanges,
    UpdateService,
};
use crate::bootstrap::app_context::AppContext;
use crate::domain::catalog::{DentalService, ServiceCategory, ServiceStatus};
use crate::infrastructure::cache::{tenant_key, tenant_scope_pattern};
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

const CACHE_SCOPE: &str = "services";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub base_price: f64,
    pub duration_minutes: i32,
    pub status: ServiceStatus,
    pub is_taxable: bool,
    pub tax_rate: f64,
    #[schema(value_type = Option<Object>)]
    pub requirements: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub materials: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DentalService> for ServiceResponse {
    fn from(s: DentalService) -> Self {
        Self {
            id: s.id,
            tenant_id: s.tenant_id,
            code: s.code,
            name: s.name,
            description: s.description,
            category: s.category,
            base_price: s.base_price,
            duration_minutes: s.duration_minutes,
            status: s.status,
            is_taxable: s.is_taxable,
            tax_rate: s.tax_rate,
            requirements: s.requirements,
            materials: s.materials,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateServiceRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub base_price: f64,
    pub duration_minutes: i32,
    #[serde(default = "default_taxable")]
    pub is_taxable: bool,
    #[serde(default)]
    pub tax_rate: f64,
    #[schema(value_type = Option<Object>)]
    pub requirements: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub materials: Option<serde_json::Value>,
}

fn default_taxable() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateServiceRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ServiceCategory>,
    pub base_price: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub status: Option<ServiceStatus>,
    pub is_taxable: Option<bool>,
    pub tax_rate: Option<f64>,
    #[schema(value_type = Option<Object>)]
    pub requirements: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub materials: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, IntoParams)]
pub struct ListServicesQuery {
    pub category: Option<ServiceCategory>,
    pub status: Option<ServiceStatus>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategorySummaryResponse {
    pub category: ServiceCategory,
    pub count: i64,
    pub average_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

impl From<CategorySummary> for CategorySummaryResponse {
    fn from(c: CategorySummary) -> Self {
        Self {
            category: c.category,
            count: c.count,
            average_price: c.average_price,
            min_price: c.min_price,
            max_price: c.max_price,
        }
    }
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/services", get(list_services).post(create_service))
        .route("/services/categories/summary", get(categories_summary))
        .route(
            "/services/:id",
            get(get_service).put(update_service).delete(deactivate_service),
        )
        .with_state(ctx)
}

async fn invalidate_listing(ctx: &AppContext, tenant_id: Uuid) {
    let removed = ctx
        .cache()
        .invalidate_pattern(&tenant_scope_pattern(tenant_id, CACHE_SCOPE))
        .await;
    tracing::debug!(tenant_id = %tenant_id, removed, "services_cache_invalidated");
}

#[utoipa::path(get, path = "/api/v2/services", tag = "Services", params(ListServicesQuery),
    responses((status = 200, body = [ServiceResponse])))]
pub async fn list_services(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<ListServicesQuery>,
) -> ApiResult<Json<Vec<ServiceResponse>>> {
    let tenant_id = current.principal.tenant_id;
    let params = serde_json::to_string(&q).unwrap_or_default();
    let key = tenant_key(tenant_id, CACHE_SCOPE, &params);
    let cache = ctx.cache();
    if let Some(hit) = cache.get_json(&key).await {
        if let Ok(services) = serde_json::from_value::<Vec<ServiceResponse>>(hit) {
            return Ok(Json(services));
        }
    }

    let repo = ctx.catalog_repo();
    let uc = ListServices {
        repo: repo.as_ref(),
    };
    let query = ServiceQuery {
        category: q.category,
        status: q.status,
        search: q.search,
        min_price: q.min_price,
        max_price: q.max_price,
        page: Page::new(q.skip, q.limit),
    };
    let services: Vec<ServiceResponse> = uc
        .execute(&current.principal, &query)
        .await?
        .into_iter()
        .map(ServiceResponse::from)
        .collect();
    if let Ok(value) = serde_json::to_value(&services) {
        cache
            .set_json(&key, &value, ctx.cfg.cache_default_ttl_secs)
            .await;
    }
    Ok(Json(services))
}

#[utoipa::path(post, path = "/api/v2/services", tag = "Services", request_body = CreateServiceRequest,
    responses((status = 201, body = ServiceResponse), (status = 409)))]
pub async fn create_service(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreateServiceRequest>,
) -> ApiResult<(StatusCode, Json<ServiceResponse>)> {
    let repo = ctx.catalog_repo();
    let uc = CreateService {
        repo: repo.as_ref(),
    };
    let service = uc
        .execute(
            &current.principal,
            &NewService {
                code: req.code,
                name: req.name,
                description: req.description,
                category: req.category,
                base_price: req.base_price,
                duration_minutes: req.duration_minutes,
                is_taxable: req.is_taxable,
                tax_rate: req.tax_rate,
                requirements: req.requirements,
                materials: req.materials,
            },
        )
        .await?;
    invalidate_listing(&ctx, current.principal.tenant_id).await;
    Ok((StatusCode::CREATED, Json(service.into())))
}

#[utoipa::path(get, path = "/api/v2/services/categories/summary", tag = "Services",
    responses((status = 200, body = [CategorySummaryResponse])))]
pub async fn categories_summary(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<CategorySummaryResponse>>> {
    let repo = ctx.catalog_repo();
    let uc = CategoriesSummary {
        repo: repo.as_ref(),
    };
    let rows = uc.execute(&current.principal).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(get, path = "/api/v2/services/{id}", tag = "Services",
    params(("id" = Uuid, Path, description = "Service id")),
    responses((status = 200, body = ServiceResponse), (status = 404)))]
pub async fn get_service(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ServiceResponse>> {
    let repo = ctx.catalog_repo();
    let uc = GetService {
        repo: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

#[utoipa::path(put, path = "/api/v2/services/{id}", tag = "Services", request_body = UpdateServiceRequest,
    params(("id" = Uuid, Path, description = "Service id")),
    responses((status = 200, body = ServiceResponse)))]
pub async fn update_service(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateServiceRequest>,
) -> ApiResult<Json<ServiceResponse>> {
    let repo = ctx.catalog_repo();
    let uc = UpdateService {
        repo: repo.as_ref(),
    };
    let changes = ServiceChanges {
        code: req.code,
        name: req.name,
        description: req.description,
        category: req.category,
        base_price: req.base_price,
        duration_minutes: req.duration_minutes,
        status: req.status,
        is_taxable: req.is_taxable,
        tax_rate: req.tax_rate,
        requirements: req.requirements,
        materials: req.materials,
    };
    let service = uc
        .execute(&current.principal, id, &changes, Utc::now())
        .await?;
    invalidate_listing(&ctx, current.principal.tenant_id).await;
    Ok(Json(service.into()))
}

/// Services are never removed, only taken out of the catalog.
#[utoipa::path(delete, path = "/api/v2/services/{id}", tag = "Services",
    params(("id" = Uuid, Path, description = "Service id")),
    responses((status = 200, body = ServiceResponse)))]
pub async fn deactivate_service(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ServiceResponse>> {
    let repo = ctx.catalog_repo();
    let uc = DeactivateService {
        repo: repo.as_ref(),
    };
    let service = uc.execute(&current.principal, id, Utc::now()).await?;
    invalidate_listing(&ctx, current.principal.tenant_id).await;
    Ok(Json(service.into()))
}
