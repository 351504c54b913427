use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::treatment_repository::{NewTreatment, TreatmentQuery};
use crate::application::use_cases::treatments::plan_treatment::{
    CreateTreatment, GetTreatment, ListTreatments, TreatmentChanges, TreatmentCost,
    UpdateTreatment,
};
use crate::application::use_cases::treatments::progress::{
    AddProgressNote, AddTreatmentItem, ItemRequest, UpdateTreatmentStatus,
};
use crate::bootstrap::app_context::AppContext;
use crate::domain::treatments::{
    ItemStatus, Treatment, TreatmentItem, TreatmentPriority, TreatmentStatus,
};
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct TreatmentResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: TreatmentStatus,
    pub priority: TreatmentPriority,
    #[schema(value_type = Option<Object>)]
    pub teeth_involved: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub quadrants: Option<serde_json::Value>,
    #[schema(value_type = Vec<Object>)]
    pub progress_notes: serde_json::Value,
    pub current_stage: Option<String>,
    pub total_stages: i32,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<TreatmentItemResponse>>,
}

impl From<Treatment> for TreatmentResponse {
    fn from(t: Treatment) -> Self {
        Self {
            id: t.id,
            tenant_id: t.tenant_id,
            patient_id: t.patient_id,
            dentist_id: t.dentist_id,
            consultation_id: t.consultation_id,
            appointment_id: t.appointment_id,
            name: t.name,
            description: t.description,
            status: t.status,
            priority: t.priority,
            teeth_involved: t.teeth_involved,
            quadrants: t.quadrants,
            progress_notes: t.progress_notes,
            current_stage: t.current_stage,
            total_stages: t.total_stages,
            estimated_cost: t.estimated_cost,
            actual_cost: t.actual_cost,
            created_at: t.created_at,
            updated_at: t.updated_at,
            started_at: t.started_at,
            completed_at: t.completed_at,
            items: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TreatmentItemResponse {
    pub id: Uuid,
    pub treatment_id: Uuid,
    pub service_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub status: ItemStatus,
    pub tooth_number: Option<String>,
    pub surface: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<TreatmentItem> for TreatmentItemResponse {
    fn from(i: TreatmentItem) -> Self {
        Self {
            total_price: f64::from(i.quantity) * i.unit_price,
            id: i.id,
            treatment_id: i.treatment_id,
            service_id: i.service_id,
            quantity: i.quantity,
            unit_price: i.unit_price,
            status: i.status,
            tooth_number: i.tooth_number,
            surface: i.surface,
            notes: i.notes,
            created_at: i.created_at,
            completed_at: i.completed_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTreatmentRequest {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<TreatmentPriority>,
    #[schema(value_type = Option<Object>)]
    pub teeth_involved: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub quadrants: Option<serde_json::Value>,
    pub total_stages: Option<i32>,
    pub estimated_cost: Option<f64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTreatmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TreatmentPriority>,
    #[schema(value_type = Option<Object>)]
    pub teeth_involved: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub quadrants: Option<serde_json::Value>,
    pub total_stages: Option<i32>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TreatmentStatusRequest {
    pub status: TreatmentStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProgressNoteRequest {
    pub note: String,
    pub stage: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub service_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
    pub tooth_number: Option<String>,
    pub surface: Option<String>,
    pub notes: Option<String>,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TreatmentCostResponse {
    pub treatment_id: Uuid,
    pub total_cost: f64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListTreatmentsQuery {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub status: Option<TreatmentStatus>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/treatments", get(list_treatments).post(create_treatment))
        .route("/treatments/:id", get(get_treatment).put(update_treatment))
        .route("/treatments/:id/status", put(update_status))
        .route("/treatments/:id/progress-notes", post(add_progress_note))
        .route("/treatments/:id/items", post(add_item))
        .route("/treatments/:id/cost", get(treatment_cost))
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/treatments", tag = "Treatments", params(ListTreatmentsQuery),
    responses((status = 200, body = [TreatmentResponse])))]
pub async fn list_treatments(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<ListTreatmentsQuery>,
) -> ApiResult<Json<Vec<TreatmentResponse>>> {
    let repo = ctx.treatment_repo();
    let uc = ListTreatments {
        treatments: repo.as_ref(),
    };
    let query = TreatmentQuery {
        patient_id: q.patient_id,
        dentist_id: q.dentist_id,
        status: q.status,
        page: Page::new(q.skip, q.limit),
    };
    let rows = uc.execute(&current.principal, &query).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(post, path = "/api/v2/treatments", tag = "Treatments", request_body = CreateTreatmentRequest,
    responses((status = 201, body = TreatmentResponse)))]
pub async fn create_treatment(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreateTreatmentRequest>,
) -> ApiResult<(StatusCode, Json<TreatmentResponse>)> {
    let treatments = ctx.treatment_repo();
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let uc = CreateTreatment {
        treatments: treatments.as_ref(),
        patients: patients.as_ref(),
        users: users.as_ref(),
    };
    let new = NewTreatment {
        patient_id: req.patient_id,
        dentist_id: req.dentist_id,
        consultation_id: req.consultation_id,
        appointment_id: req.appointment_id,
        name: req.name,
        description: req.description,
        priority: req.priority.unwrap_or(TreatmentPriority::Routine),
        teeth_involved: req.teeth_involved,
        quadrants: req.quadrants,
        total_stages: req.total_stages.unwrap_or(1),
        estimated_cost: req.estimated_cost,
    };
    let treatment = uc.execute(&current.principal, &new).await?;
    Ok((StatusCode::CREATED, Json(treatment.into())))
}

#[utoipa::path(get, path = "/api/v2/treatments/{id}", tag = "Treatments",
    params(("id" = Uuid, Path, description = "Treatment id")),
    responses((status = 200, body = TreatmentResponse), (status = 404)))]
pub async fn get_treatment(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TreatmentResponse>> {
    let repo = ctx.treatment_repo();
    let uc = GetTreatment {
        treatments: repo.as_ref(),
    };
    let (treatment, items) = uc.execute(&current.principal, id).await?;
    let mut body = TreatmentResponse::from(treatment);
    body.items = Some(items.into_iter().map(Into::into).collect());
    Ok(Json(body))
}

#[utoipa::path(put, path = "/api/v2/treatments/{id}", tag = "Treatments", request_body = UpdateTreatmentRequest,
    params(("id" = Uuid, Path, description = "Treatment id")),
    responses((status = 200, body = TreatmentResponse)))]
pub async fn update_treatment(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTreatmentRequest>,
) -> ApiResult<Json<TreatmentResponse>> {
    let repo = ctx.treatment_repo();
    let uc = UpdateTreatment {
        treatments: repo.as_ref(),
    };
    let changes = TreatmentChanges {
        name: req.name,
        description: req.description,
        priority: req.priority,
        teeth_involved: req.teeth_involved,
        quadrants: req.quadrants,
        total_stages: req.total_stages,
        estimated_cost: req.estimated_cost,
        actual_cost: req.actual_cost,
    };
    let treatment = uc
        .execute(&current.principal, id, &changes, Utc::now())
        .await?;
    Ok(Json(treatment.into()))
}

#[utoipa::path(put, path = "/api/v2/treatments/{id}/status", tag = "Treatments", request_body = TreatmentStatusRequest,
    params(("id" = Uuid, Path, description = "Treatment id")),
    responses((status = 200, body = TreatmentResponse)))]
pub async fn update_status(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TreatmentStatusRequest>,
) -> ApiResult<Json<TreatmentResponse>> {
    let repo = ctx.treatment_repo();
    let uc = UpdateTreatmentStatus {
        treatments: repo.as_ref(),
    };
    let treatment = uc
        .execute(&current.principal, id, req.status, Utc::now())
        .await?;
    Ok(Json(treatment.into()))
}

#[utoipa::path(post, path = "/api/v2/treatments/{id}/progress-notes", tag = "Treatments", request_body = ProgressNoteRequest,
    params(("id" = Uuid, Path, description = "Treatment id")),
    responses((status = 200, body = TreatmentResponse)))]
pub async fn add_progress_note(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ProgressNoteRequest>,
) -> ApiResult<Json<TreatmentResponse>> {
    let repo = ctx.treatment_repo();
    let uc = AddProgressNote {
        treatments: repo.as_ref(),
    };
    let treatment = uc
        .execute(
            &current.principal,
            id,
            &req.note,
            req.stage.as_deref(),
            Utc::now(),
        )
        .await?;
    Ok(Json(treatment.into()))
}

#[utoipa::path(post, path = "/api/v2/treatments/{id}/items", tag = "Treatments", request_body = AddItemRequest,
    params(("id" = Uuid, Path, description = "Treatment id")),
    responses((status = 201, body = TreatmentItemResponse), (status = 400, description = "Service not found or inactive")))]
pub async fn add_item(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<(StatusCode, Json<TreatmentItemResponse>)> {
    let treatments = ctx.treatment_repo();
    let catalog = ctx.catalog_repo();
    let uc = AddTreatmentItem {
        treatments: treatments.as_ref(),
        catalog: catalog.as_ref(),
    };
    let item = uc
        .execute(
            &current.principal,
            id,
            &ItemRequest {
                service_id: req.service_id,
                quantity: req.quantity,
                tooth_number: req.tooth_number,
                surface: req.surface,
                notes: req.notes,
            },
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

#[utoipa::path(get, path = "/api/v2/treatments/{id}/cost", tag = "Treatments",
    params(("id" = Uuid, Path, description = "Treatment id")),
    responses((status = 200, body = TreatmentCostResponse)))]
pub async fn treatment_cost(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TreatmentCostResponse>> {
    let repo = ctx.treatment_repo();
    let uc = TreatmentCost {
        treatments: repo.as_ref(),
    };
    let total_cost = uc.execute(&current.principal, id).await?;
    Ok(Json(TreatmentCostResponse {
        treatment_id: id,
        total_cost,
    }))
}
