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
use crate::application::ports::consultation_repository::{ConsultationQuery, NewConsultation};
use crate::application::use_cases::consultations::record_consultation::{
    AddDiagnosis, ConsultationChanges, CreateConsultation, GetConsultation, ListConsultations,
    UpdateConsultation,
};
use crate::bootstrap::app_context::AppContext;
use crate::domain::consultations::Consultation;
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsultationResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub chief_complaint: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub medical_history_review: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub dental_history_review: Option<serde_json::Value>,
    pub extraoral_findings: Option<String>,
    pub intraoral_findings: Option<String>,
    pub periodontal_assessment: Option<String>,
    pub occlusion_assessment: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub diagnosis: serde_json::Value,
    #[schema(value_type = Vec<Object>)]
    pub treatment_plan: serde_json::Value,
    pub recommendations: Option<String>,
    pub consultation_fee: Option<f64>,
    pub next_appointment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Consultation> for ConsultationResponse {
    fn from(c: Consultation) -> Self {
        Self {
            id: c.id,
            tenant_id: c.tenant_id,
            appointment_id: c.appointment_id,
            patient_id: c.patient_id,
            dentist_id: c.dentist_id,
            chief_complaint: c.chief_complaint,
            medical_history_review: c.medical_history_review,
            dental_history_review: c.dental_history_review,
            extraoral_findings: c.extraoral_findings,
            intraoral_findings: c.intraoral_findings,
            periodontal_assessment: c.periodontal_assessment,
            occlusion_assessment: c.occlusion_assessment,
            diagnosis: c.diagnosis,
            treatment_plan: c.treatment_plan,
            recommendations: c.recommendations,
            consultation_fee: c.consultation_fee,
            next_appointment_date: c.next_appointment_date,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConsultationRequest {
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub chief_complaint: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub medical_history_review: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub dental_history_review: Option<serde_json::Value>,
    pub extraoral_findings: Option<String>,
    pub intraoral_findings: Option<String>,
    pub periodontal_assessment: Option<String>,
    pub occlusion_assessment: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub diagnosis: serde_json::Value,
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub treatment_plan: serde_json::Value,
    pub recommendations: Option<String>,
    pub consultation_fee: Option<f64>,
    pub next_appointment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateConsultationRequest {
    pub chief_complaint: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub medical_history_review: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub dental_history_review: Option<serde_json::Value>,
    pub extraoral_findings: Option<String>,
    pub intraoral_findings: Option<String>,
    pub periodontal_assessment: Option<String>,
    pub occlusion_assessment: Option<String>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub diagnosis: Option<serde_json::Value>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub treatment_plan: Option<serde_json::Value>,
    pub recommendations: Option<String>,
    pub consultation_fee: Option<f64>,
    pub next_appointment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListConsultationsQuery {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route(
            "/consultations",
            get(list_consultations).post(create_consultation),
        )
        .route(
            "/consultations/:id",
            get(get_consultation).put(update_consultation),
        )
        .route("/consultations/:id/diagnosis", post(add_diagnosis))
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/consultations", tag = "Consultations", params(ListConsultationsQuery),
    responses((status = 200, body = [ConsultationResponse])))]
pub async fn list_consultations(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<ListConsultationsQuery>,
) -> ApiResult<Json<Vec<ConsultationResponse>>> {
    let repo = ctx.consultation_repo();
    let uc = ListConsultations {
        consultations: repo.as_ref(),
    };
    let query = ConsultationQuery {
        patient_id: q.patient_id,
        dentist_id: q.dentist_id,
        page: Page::new(q.skip, q.limit),
    };
    let rows = uc.execute(&current.principal, &query).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(post, path = "/api/v2/consultations", tag = "Consultations", request_body = CreateConsultationRequest,
    responses((status = 201, body = ConsultationResponse), (status = 400)))]
pub async fn create_consultation(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreateConsultationRequest>,
) -> ApiResult<(StatusCode, Json<ConsultationResponse>)> {
    let consultations = ctx.consultation_repo();
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let appointments = ctx.appointment_repo();
    let uc = CreateConsultation {
        consultations: consultations.as_ref(),
        patients: patients.as_ref(),
        users: users.as_ref(),
        appointments: appointments.as_ref(),
    };
    let new = NewConsultation {
        appointment_id: req.appointment_id,
        patient_id: req.patient_id,
        dentist_id: req.dentist_id,
        chief_complaint: req.chief_complaint,
        medical_history_review: req.medical_history_review,
        dental_history_review: req.dental_history_review,
        extraoral_findings: req.extraoral_findings,
        intraoral_findings: req.intraoral_findings,
        periodontal_assessment: req.periodontal_assessment,
        occlusion_assessment: req.occlusion_assessment,
        diagnosis: req.diagnosis,
        treatment_plan: req.treatment_plan,
        recommendations: req.recommendations,
        consultation_fee: req.consultation_fee,
        next_appointment_date: req.next_appointment_date,
    };
    let consultation = uc.execute(&current.principal, &new).await?;
    Ok((StatusCode::CREATED, Json(consultation.into())))
}

#[utoipa::path(get, path = "/api/v2/consultations/{id}", tag = "Consultations",
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses((status = 200, body = ConsultationResponse), (status = 404)))]
pub async fn get_consultation(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConsultationResponse>> {
    let repo = ctx.consultation_repo();
    let uc = GetConsultation {
        consultations: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

#[utoipa::path(put, path = "/api/v2/consultations/{id}", tag = "Consultations", request_body = UpdateConsultationRequest,
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses((status = 200, body = ConsultationResponse)))]
pub async fn update_consultation(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateConsultationRequest>,
) -> ApiResult<Json<ConsultationResponse>> {
    let repo = ctx.consultation_repo();
    let uc = UpdateConsultation {
        consultations: repo.as_ref(),
    };
    let changes = ConsultationChanges {
        chief_complaint: req.chief_complaint,
        medical_history_review: req.medical_history_review,
        dental_history_review: req.dental_history_review,
        extraoral_findings: req.extraoral_findings,
        intraoral_findings: req.intraoral_findings,
        periodontal_assessment: req.periodontal_assessment,
        occlusion_assessment: req.occlusion_assessment,
        diagnosis: req.diagnosis,
        treatment_plan: req.treatment_plan,
        recommendations: req.recommendations,
        consultation_fee: req.consultation_fee,
        next_appointment_date: req.next_appointment_date,
    };
    let consultation = uc
        .execute(&current.principal, id, &changes, Utc::now())
        .await?;
    Ok(Json(consultation.into()))
}

#[utoipa::path(post, path = "/api/v2/consultations/{id}/diagnosis", tag = "Consultations",
    request_body(content = Object, description = "Diagnosis entry appended to the list"),
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses((status = 200, body = ConsultationResponse)))]
pub async fn add_diagnosis(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(entry): Json<serde_json::Value>,
) -> ApiResult<Json<ConsultationResponse>> {
    let repo = ctx.consultation_repo();
    let uc = AddDiagnosis {
        consultations: repo.as_ref(),
    };
    let consultation = uc
        .execute(&current.principal, id, entry, Utc::now())
        .await?;
    Ok(Json(consultation.into()))
}
