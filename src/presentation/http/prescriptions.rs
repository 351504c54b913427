use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::use_cases::prescriptions::manage_prescriptions::{
    CreatePrescription, DeletePrescription, DispensePrescription, ExpiryCheck, GetPrescription,
    ListPrescriptions, PrescriptionChanges, PrescriptionRequest, UpdatePrescription,
};
use crate::bootstrap::app_context::AppContext;
use crate::domain::prescriptions::Prescription;
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct PrescriptionResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub treatment_id: Option<Uuid>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    pub quantity: Option<String>,
    pub refills: i32,
    pub is_dispensed: bool,
    pub is_active: bool,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PrescriptionResponse {
    fn at(p: Prescription, now: DateTime<Utc>) -> Self {
        Self {
            is_active: p.is_active(now),
            id: p.id,
            tenant_id: p.tenant_id,
            patient_id: p.patient_id,
            dentist_id: p.dentist_id,
            treatment_id: p.treatment_id,
            medication_name: p.medication_name,
            dosage: p.dosage,
            frequency: p.frequency,
            duration: p.duration,
            instructions: p.instructions,
            quantity: p.quantity,
            refills: p.refills,
            is_dispensed: p.is_dispensed,
            dispensed_at: p.dispensed_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
            expires_at: p.expires_at,
        }
    }
}

fn respond_all(list: Vec<Prescription>, now: DateTime<Utc>) -> Vec<PrescriptionResponse> {
    list.into_iter()
        .map(|p| PrescriptionResponse::at(p, now))
        .collect()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Uuid,
    pub treatment_id: Option<Uuid>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    pub quantity: Option<String>,
    #[serde(default)]
    pub refills: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePrescriptionRequest {
    pub medication_name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
    pub quantity: Option<String>,
    pub refills: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPrescriptionsQuery {
    pub patient_id: Option<Uuid>,
    pub active_only: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpiryCheckResponse {
    pub expired: Vec<PrescriptionResponse>,
    pub expiring_soon: Vec<PrescriptionResponse>,
    pub expired_count: usize,
    pub expiring_soon_count: usize,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route(
            "/prescriptions",
            get(list_prescriptions).post(create_prescription),
        )
        .route("/prescriptions/expiry-check", get(expiry_check))
        .route(
            "/prescriptions/:id",
            get(get_prescription)
                .put(update_prescription)
                .delete(delete_prescription),
        )
        .route("/prescriptions/:id/dispense", post(dispense_prescription))
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/prescriptions", tag = "Prescriptions", params(ListPrescriptionsQuery),
    responses((status = 200, body = [PrescriptionResponse])))]
pub async fn list_prescriptions(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<ListPrescriptionsQuery>,
) -> ApiResult<Json<Vec<PrescriptionResponse>>> {
    let repo = ctx.prescription_repo();
    let uc = ListPrescriptions {
        prescriptions: repo.as_ref(),
    };
    let now = Utc::now();
    let rows = uc
        .execute(
            &current.principal,
            q.patient_id,
            q.active_only.unwrap_or(false),
            Page::new(q.skip, q.limit),
            now,
        )
        .await?;
    Ok(Json(respond_all(rows, now)))
}

#[utoipa::path(post, path = "/api/v2/prescriptions", tag = "Prescriptions", request_body = CreatePrescriptionRequest,
    responses((status = 201, body = PrescriptionResponse)))]
pub async fn create_prescription(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreatePrescriptionRequest>,
) -> ApiResult<(StatusCode, Json<PrescriptionResponse>)> {
    let prescriptions = ctx.prescription_repo();
    let patients = ctx.patient_repo();
    let uc = CreatePrescription {
        prescriptions: prescriptions.as_ref(),
        patients: patients.as_ref(),
    };
    let now = Utc::now();
    let request = PrescriptionRequest {
        patient_id: req.patient_id,
        treatment_id: req.treatment_id,
        medication_name: req.medication_name,
        dosage: req.dosage,
        frequency: req.frequency,
        duration: req.duration,
        instructions: req.instructions,
        quantity: req.quantity,
        refills: req.refills,
        expires_at: req.expires_at,
    };
    let created = uc.execute(&current.principal, &request, now).await?;
    Ok((
        StatusCode::CREATED,
        Json(PrescriptionResponse::at(created, now)),
    ))
}

#[utoipa::path(get, path = "/api/v2/prescriptions/expiry-check", tag = "Prescriptions",
    responses((status = 200, body = ExpiryCheckResponse)))]
pub async fn expiry_check(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<Json<ExpiryCheckResponse>> {
    let repo = ctx.prescription_repo();
    let uc = ExpiryCheck {
        prescriptions: repo.as_ref(),
    };
    let now = Utc::now();
    let report = uc.execute(&current.principal, now).await?;
    let expired = respond_all(report.expired, now);
    let expiring_soon = respond_all(report.expiring_soon, now);
    Ok(Json(ExpiryCheckResponse {
        expired_count: expired.len(),
        expiring_soon_count: expiring_soon.len(),
        expired,
        expiring_soon,
    }))
}

#[utoipa::path(get, path = "/api/v2/prescriptions/{id}", tag = "Prescriptions",
    params(("id" = Uuid, Path, description = "Prescription id")),
    responses((status = 200, body = PrescriptionResponse), (status = 404)))]
pub async fn get_prescription(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PrescriptionResponse>> {
    let repo = ctx.prescription_repo();
    let uc = GetPrescription {
        prescriptions: repo.as_ref(),
    };
    let p = uc.execute(&current.principal, id).await?;
    Ok(Json(PrescriptionResponse::at(p, Utc::now())))
}

#[utoipa::path(put, path = "/api/v2/prescriptions/{id}", tag = "Prescriptions", request_body = UpdatePrescriptionRequest,
    params(("id" = Uuid, Path, description = "Prescription id")),
    responses((status = 200, body = PrescriptionResponse), (status = 400, description = "Already dispensed")))]
pub async fn update_prescription(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePrescriptionRequest>,
) -> ApiResult<Json<PrescriptionResponse>> {
    let repo = ctx.prescription_repo();
    let uc = UpdatePrescription {
        prescriptions: repo.as_ref(),
    };
    let changes = PrescriptionChanges {
        medication_name: req.medication_name,
        dosage: req.dosage,
        frequency: req.frequency,
        duration: req.duration,
        instructions: req.instructions,
        quantity: req.quantity,
        refills: req.refills,
        expires_at: req.expires_at,
    };
    let now = Utc::now();
    let p = uc.execute(&current.principal, id, &changes, now).await?;
    Ok(Json(PrescriptionResponse::at(p, now)))
}

#[utoipa::path(post, path = "/api/v2/prescriptions/{id}/dispense", tag = "Prescriptions",
    params(("id" = Uuid, Path, description = "Prescription id")),
    responses((status = 200, body = PrescriptionResponse), (status = 400)))]
pub async fn dispense_prescription(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PrescriptionResponse>> {
    let prescriptions = ctx.prescription_repo();
    let audit = ctx.audit_repo();
    let uc = DispensePrescription {
        prescriptions: prescriptions.as_ref(),
        audit: audit.as_ref(),
    };
    let now = Utc::now();
    let p = uc.execute(&current.principal, id, now).await?;
    Ok(Json(PrescriptionResponse::at(p, now)))
}

#[utoipa::path(delete, path = "/api/v2/prescriptions/{id}", tag = "Prescriptions",
    params(("id" = Uuid, Path, description = "Prescription id")),
    responses((status = 204), (status = 404)))]
pub async fn delete_prescription(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let prescriptions = ctx.prescription_repo();
    let audit = ctx.audit_repo();
    DeletePrescription {
        prescriptions: prescriptions.as_ref(),
        audit: audit.as_ref(),
    }
    .execute(&current.principal, id)
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
