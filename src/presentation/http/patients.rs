use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::patient_repository::{NewPatient, PatientPatch};
use crate::application::use_cases::patients::manage_patients::{
    CreatePatient, DeletePatient, GetPatient, UpdatePatient,
};
use crate::application::use_cases::patients::search_patients::{PatientFilters, SearchPatients};
use crate::bootstrap::app_context::AppContext;
use crate::domain::patients::{Patient, PatientStatus, age_on};
use crate::domain::users::Gender;
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct PatientResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub age: i32,
    pub gender: Gender,
    pub contact_number: String,
    pub email: Option<String>,
    pub address: String,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    #[schema(value_type = Object)]
    pub medical_history: serde_json::Value,
    #[schema(value_type = Object)]
    pub dental_history: serde_json::Value,
    #[schema(value_type = Option<Object>)]
    pub insurance_info: Option<serde_json::Value>,
    pub status: PatientStatus,
    #[schema(value_type = Object)]
    pub preferences: serde_json::Value,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_visit_at: Option<DateTime<Utc>>,
    pub assigned_dentist_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assignment_reason: Option<String>,
}

impl From<Patient> for PatientResponse {
    fn from(p: Patient) -> Self {
        Self {
            full_name: p.full_name(),
            age: age_on(p.date_of_birth, Utc::now().date_naive()),
            id: p.id,
            tenant_id: p.tenant_id,
            first_name: p.first_name,
            last_name: p.last_name,
            date_of_birth: p.date_of_birth,
            gender: p.gender,
            contact_number: p.contact_number,
            email: p.email,
            address: p.address,
            emergency_contact_name: p.emergency_contact_name,
            emergency_contact_phone: p.emergency_contact_phone,
            medical_history: p.medical_history,
            dental_history: p.dental_history,
            insurance_info: p.insurance_info,
            status: p.status,
            preferences: p.preferences,
            created_by: p.created_by,
            updated_by: p.updated_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
            last_visit_at: p.last_visit_at,
            assigned_dentist_id: p.assigned_dentist_id,
            assigned_at: p.assigned_at,
            assignment_reason: p.assignment_reason,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub contact_number: String,
    pub email: Option<String>,
    pub address: String,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub medical_history: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub dental_history: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub insurance_info: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub preferences: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub medical_history: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub dental_history: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub insurance_info: Option<serde_json::Value>,
    pub status: Option<PatientStatus>,
    #[schema(value_type = Option<Object>)]
    pub preferences: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PatientSearchQuery {
    pub search: Option<String>,
    pub status: Option<PatientStatus>,
    pub gender: Option<Gender>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/patients", get(search_patients).post(create_patient))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/patients", tag = "Patients", params(PatientSearchQuery),
    responses((status = 200, body = [PatientResponse])))]
pub async fn search_patients(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<PatientSearchQuery>,
) -> ApiResult<Json<Vec<PatientResponse>>> {
    let repo = ctx.patient_repo();
    let uc = SearchPatients {
        repo: repo.as_ref(),
    };
    let filters = PatientFilters {
        search: q.search,
        status: q.status,
        gender: q.gender,
        min_age: q.min_age,
        max_age: q.max_age,
        page: Page::new(q.skip, q.limit),
    };
    let patients = uc
        .execute(&current.principal, &filters, Utc::now().date_naive())
        .await?;
    Ok(Json(patients.into_iter().map(PatientResponse::from).collect()))
}

#[utoipa::path(post, path = "/api/v2/patients", tag = "Patients", request_body = CreatePatientRequest,
    responses((status = 201, body = PatientResponse), (status = 403), (status = 409)))]
pub async fn create_patient(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreatePatientRequest>,
) -> ApiResult<(StatusCode, Json<PatientResponse>)> {
    let repo = ctx.patient_repo();
    let uc = CreatePatient {
        repo: repo.as_ref(),
    };
    let new_patient = NewPatient {
        first_name: req.first_name,
        last_name: req.last_name,
        date_of_birth: req.date_of_birth,
        gender: req.gender,
        contact_number: req.contact_number,
        email: req.email,
        address: req.address,
        emergency_contact_name: req.emergency_contact_name,
        emergency_contact_phone: req.emergency_contact_phone,
        medical_history: req.medical_history.unwrap_or_else(|| serde_json::json!({})),
        dental_history: req.dental_history.unwrap_or_else(|| serde_json::json!({})),
        insurance_info: req.insurance_info,
        preferences: req.preferences.unwrap_or_else(|| serde_json::json!({})),
        created_by: current.principal.user_id,
    };
    let patient = uc
        .execute(&current.principal, &current.tenant, &new_patient, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(patient.into())))
}

#[utoipa::path(get, path = "/api/v2/patients/{id}", tag = "Patients",
    params(("id" = Uuid, Path, description = "Patient id")),
    responses((status = 200, body = PatientResponse), (status = 404)))]
pub async fn get_patient(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PatientResponse>> {
    let repo = ctx.patient_repo();
    let uc = GetPatient {
        repo: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

#[utoipa::path(put, path = "/api/v2/patients/{id}", tag = "Patients", request_body = UpdatePatientRequest,
    params(("id" = Uuid, Path, description = "Patient id")),
    responses((status = 200, body = PatientResponse), (status = 409)))]
pub async fn update_patient(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> ApiResult<Json<PatientResponse>> {
    let repo = ctx.patient_repo();
    let uc = UpdatePatient {
        repo: repo.as_ref(),
    };
    let patch = PatientPatch {
        first_name: req.first_name,
        last_name: req.last_name,
        date_of_birth: req.date_of_birth,
        gender: req.gender,
        contact_number: req.contact_number,
        email: req.email,
        address: req.address,
        emergency_contact_name: req.emergency_contact_name,
        emergency_contact_phone: req.emergency_contact_phone,
        medical_history: req.medical_history,
        dental_history: req.dental_history,
        insurance_info: req.insurance_info,
        status: req.status,
        preferences: req.preferences,
    };
    let patient = uc
        .execute(&current.principal, id, &patch, Utc::now())
        .await?;
    Ok(Json(patient.into()))
}

#[utoipa::path(delete, path = "/api/v2/patients/{id}", tag = "Patients",
    params(("id" = Uuid, Path, description = "Patient id")),
    responses((status = 204), (status = 404)))]
pub async fn delete_patient(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let repo = ctx.patient_repo();
    let audit = ctx.audit_repo();
    DeletePatient {
        repo: repo.as_ref(),
        audit: audit.as_ref(),
    }
    .execute(&current.principal, id)
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
