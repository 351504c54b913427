use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::use_cases::patients::assignments::{
    AllWorkloads, AssignDentist, AssignmentNote, AssignmentOutcome, AutoAssignDentist,
    DentistPatients, DentistWorkload, ReassignDentist, RemoveDentist, TransferOutcome,
    TransferPatient, Workload,
};
use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::patients::PatientResponse;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignDentistRequest {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReassignDentistRequest {
    pub patient_id: Uuid,
    pub new_dentist_id: Uuid,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferPatientRequest {
    pub patient_id: Uuid,
    pub to_dentist_id: Uuid,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RemoveDentistQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub previous_dentist_id: Option<Uuid>,
    pub patient: PatientResponse,
}

impl From<AssignmentOutcome> for AssignmentResponse {
    fn from(o: AssignmentOutcome) -> Self {
        Self {
            previous_dentist_id: o.previous_dentist_id,
            patient: o.patient.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    pub previous_dentist_id: Option<Uuid>,
    pub patient: PatientResponse,
    pub moved_appointment_ids: Vec<Uuid>,
    pub kept_appointment_ids: Vec<Uuid>,
}

impl From<TransferOutcome> for TransferResponse {
    fn from(o: TransferOutcome) -> Self {
        Self {
            previous_dentist_id: o.assignment.previous_dentist_id,
            patient: o.assignment.patient.into(),
            moved_appointment_ids: o.moved_appointment_ids,
            kept_appointment_ids: o.kept_appointment_ids,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkloadResponse {
    pub dentist_id: Uuid,
    pub dentist_name: String,
    pub specialization: Option<String>,
    pub is_available: bool,
    pub assigned_patients: i64,
    pub appointments_today: usize,
    pub upcoming_appointments: usize,
}

impl From<Workload> for WorkloadResponse {
    fn from(w: Workload) -> Self {
        Self {
            dentist_name: w.dentist.full_name(),
            dentist_id: w.dentist.id,
            specialization: w.dentist.specialization,
            is_available: w.dentist.is_available,
            assigned_patients: w.assigned_patients,
            appointments_today: w.appointments_today,
            upcoming_appointments: w.upcoming_appointments,
        }
    }
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/patient-assignments/assign", post(assign_dentist))
        .route("/patient-assignments/reassign", post(reassign_dentist))
        .route("/patient-assignments/transfer", post(transfer_patient))
        .route(
            "/patient-assignments/auto-assign/:patient_id",
            post(auto_assign_dentist),
        )
        .route(
            "/patient-assignments/:patient_id/dentist",
            delete(remove_dentist),
        )
        .route("/patient-assignments/dentists/workloads", get(all_workloads))
        .route(
            "/patient-assignments/dentists/:dentist_id/workload",
            get(dentist_workload),
        )
        .route(
            "/patient-assignments/dentists/:dentist_id/patients",
            get(dentist_patients),
        )
        .with_state(ctx)
}

#[utoipa::path(post, path = "/api/v2/patient-assignments/assign", tag = "Patient Assignments",
    request_body = AssignDentistRequest,
    responses((status = 200, body = AssignmentResponse), (status = 400), (status = 404), (status = 409)))]
pub async fn assign_dentist(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<AssignDentistRequest>,
) -> ApiResult<Json<AssignmentResponse>> {
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let audit = ctx.audit_repo();
    let note = AssignmentNote {
        reason: req.reason,
        notes: req.notes,
    };
    let outcome = AssignDentist {
        patients: patients.as_ref(),
        users: users.as_ref(),
        audit: audit.as_ref(),
    }
    .execute(&current.principal, req.patient_id, req.dentist_id, &note, Utc::now())
    .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(post, path = "/api/v2/patient-assignments/reassign", tag = "Patient Assignments",
    request_body = ReassignDentistRequest,
    responses((status = 200, body = AssignmentResponse), (status = 400), (status = 404), (status = 409)))]
pub async fn reassign_dentist(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<ReassignDentistRequest>,
) -> ApiResult<Json<AssignmentResponse>> {
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let audit = ctx.audit_repo();
    let note = AssignmentNote {
        reason: req.reason,
        notes: req.notes,
    };
    let outcome = ReassignDentist {
        patients: patients.as_ref(),
        users: users.as_ref(),
        audit: audit.as_ref(),
    }
    .execute(
        &current.principal,
        req.patient_id,
        req.new_dentist_id,
        &note,
        Utc::now(),
    )
    .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(delete, path = "/api/v2/patient-assignments/{patient_id}/dentist", tag = "Patient Assignments",
    params(("patient_id" = Uuid, Path,), RemoveDentistQuery),
    responses((status = 200, body = AssignmentResponse), (status = 400), (status = 404)))]
pub async fn remove_dentist(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(patient_id): Path<Uuid>,
    Query(q): Query<RemoveDentistQuery>,
) -> ApiResult<Json<AssignmentResponse>> {
    let patients = ctx.patient_repo();
    let audit = ctx.audit_repo();
    let note = AssignmentNote {
        reason: q.reason,
        notes: None,
    };
    let outcome = RemoveDentist {
        patients: patients.as_ref(),
        audit: audit.as_ref(),
    }
    .execute(&current.principal, patient_id, &note, Utc::now())
    .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(post, path = "/api/v2/patient-assignments/auto-assign/{patient_id}", tag = "Patient Assignments",
    params(("patient_id" = Uuid, Path,)),
    responses((status = 200, body = AssignmentResponse), (status = 400), (status = 404)))]
pub async fn auto_assign_dentist(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<AssignmentResponse>> {
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let audit = ctx.audit_repo();
    let outcome = AutoAssignDentist {
        patients: patients.as_ref(),
        users: users.as_ref(),
        audit: audit.as_ref(),
    }
    .execute(&current.principal, patient_id, Utc::now())
    .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(post, path = "/api/v2/patient-assignments/transfer", tag = "Patient Assignments",
    request_body = TransferPatientRequest,
    responses((status = 200, body = TransferResponse), (status = 400), (status = 404), (status = 409)))]
pub async fn transfer_patient(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<TransferPatientRequest>,
) -> ApiResult<Json<TransferResponse>> {
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let appointments = ctx.appointment_repo();
    let audit = ctx.audit_repo();
    let note = AssignmentNote {
        reason: req.reason,
        notes: req.notes,
    };
    let outcome = TransferPatient {
        patients: patients.as_ref(),
        users: users.as_ref(),
        appointments: appointments.as_ref(),
        audit: audit.as_ref(),
    }
    .execute(
        &current.principal,
        req.patient_id,
        req.to_dentist_id,
        &note,
        Utc::now(),
    )
    .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(get, path = "/api/v2/patient-assignments/dentists/workloads", tag = "Patient Assignments",
    responses((status = 200, body = [WorkloadResponse])))]
pub async fn all_workloads(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<WorkloadResponse>>> {
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let appointments = ctx.appointment_repo();
    let workloads = AllWorkloads {
        patients: patients.as_ref(),
        users: users.as_ref(),
        appointments: appointments.as_ref(),
    }
    .execute(&current.principal, Utc::now())
    .await?;
    Ok(Json(workloads.into_iter().map(WorkloadResponse::from).collect()))
}

#[utoipa::path(get, path = "/api/v2/patient-assignments/dentists/{dentist_id}/workload", tag = "Patient Assignments",
    params(("dentist_id" = Uuid, Path,)),
    responses((status = 200, body = WorkloadResponse), (status = 404)))]
pub async fn dentist_workload(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(dentist_id): Path<Uuid>,
) -> ApiResult<Json<WorkloadResponse>> {
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let appointments = ctx.appointment_repo();
    let workload = DentistWorkload {
        patients: patients.as_ref(),
        users: users.as_ref(),
        appointments: appointments.as_ref(),
    }
    .execute(&current.principal, dentist_id, Utc::now())
    .await?;
    Ok(Json(workload.into()))
}

#[utoipa::path(get, path = "/api/v2/patient-assignments/dentists/{dentist_id}/patients", tag = "Patient Assignments",
    params(("dentist_id" = Uuid, Path,), PageQuery),
    responses((status = 200, body = [PatientResponse])))]
pub async fn dentist_patients(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(dentist_id): Path<Uuid>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Json<Vec<PatientResponse>>> {
    let patients = ctx.patient_repo();
    let found = DentistPatients {
        patients: patients.as_ref(),
    }
    .execute(&current.principal, dentist_id, Page::new(q.skip, q.limit))
    .await?;
    Ok(Json(found.into_iter().map(PatientResponse::from).collect()))
}
