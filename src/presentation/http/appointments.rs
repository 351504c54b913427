use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::appointment_repository::AppointmentQuery;
use crate::application::use_cases::appointments::book_appointment::{
    AppointmentChanges, BookAppointment, BookingRequest, DEFAULT_DURATION_MINUTES,
    UpdateAppointment,
};
use crate::application::use_cases::appointments::lifecycle::{
    CancelAppointment, UpdateAppointmentStatus,
};
use crate::application::use_cases::appointments::schedule_queries::{
    AvailableSlots, GetAppointment, ListAppointments, UpcomingAppointments,
};
use crate::bootstrap::app_context::AppContext;
use crate::domain::appointments::{Appointment, AppointmentStatus, AppointmentType, Slot};
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(a: Appointment) -> Self {
        Self {
            end_time: a.ends_at(),
            id: a.id,
            tenant_id: a.tenant_id,
            patient_id: a.patient_id,
            dentist_id: a.dentist_id,
            appointment_date: a.appointment_date,
            duration_minutes: a.duration_minutes,
            appointment_type: a.appointment_type,
            status: a.status,
            reason: a.reason,
            notes: a.notes,
            created_by: a.created_by,
            created_at: a.created_at,
            updated_at: a.updated_at,
            confirmed_at: a.confirmed_at,
            completed_at: a.completed_at,
            cancelled_at: a.cancelled_at,
            cancellation_reason: a.cancellation_reason,
        }
    }
}

fn respond(list: Vec<Appointment>) -> Json<Vec<AppointmentResponse>> {
    Json(list.into_iter().map(AppointmentResponse::from).collect())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAppointmentRequest {
    pub dentist_id: Option<Uuid>,
    pub appointment_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAppointmentsQuery {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SlotsQuery {
    pub dentist_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CancelQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SlotResponse {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_available: bool,
}

impl From<Slot> for SlotResponse {
    fn from(s: Slot) -> Self {
        Self {
            start_time: s.start,
            end_time: s.end,
            is_available: s.is_available,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableSlotsResponse {
    pub dentist_id: Uuid,
    pub dentist_name: String,
    pub date: NaiveDate,
    pub duration_minutes: i32,
    pub slots: Vec<SlotResponse>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/available-slots", get(available_slots))
        .route("/appointments/upcoming", get(upcoming_appointments))
        .route(
            "/appointments/:id",
            get(get_appointment)
                .put(update_appointment)
                .delete(cancel_appointment),
        )
        .route("/appointments/:id/status", put(update_status))
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/appointments", tag = "Appointments", params(ListAppointmentsQuery),
    responses((status = 200, body = [AppointmentResponse])))]
pub async fn list_appointments(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<ListAppointmentsQuery>,
) -> ApiResult<Json<Vec<AppointmentResponse>>> {
    let repo = ctx.appointment_repo();
    let uc = ListAppointments {
        appointments: repo.as_ref(),
    };
    let query = AppointmentQuery {
        patient_id: q.patient_id,
        dentist_id: q.dentist_id,
        status: q.status,
        date_from: q.date_from,
        date_to: q.date_to,
        page: Page::new(q.skip, q.limit),
    };
    Ok(respond(uc.execute(&current.principal, &query).await?))
}

#[utoipa::path(post, path = "/api/v2/appointments", tag = "Appointments", request_body = CreateAppointmentRequest,
    responses((status = 201, body = AppointmentResponse), (status = 409, description = "Dentist already booked")))]
pub async fn create_appointment(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreateAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<AppointmentResponse>)> {
    let appointments = ctx.appointment_repo();
    let patients = ctx.patient_repo();
    let users = ctx.user_repo();
    let uc = BookAppointment {
        appointments: appointments.as_ref(),
        patients: patients.as_ref(),
        users: users.as_ref(),
    };
    let booking = BookingRequest {
        patient_id: req.patient_id,
        dentist_id: req.dentist_id,
        appointment_date: req.appointment_date,
        duration_minutes: req.duration_minutes,
        appointment_type: req.appointment_type,
        reason: req.reason,
        notes: req.notes,
    };
    let appointment = uc.execute(&current.principal, &booking).await?;
    Ok((StatusCode::CREATED, Json(appointment.into())))
}

#[utoipa::path(get, path = "/api/v2/appointments/available-slots", tag = "Appointments", params(SlotsQuery),
    responses((status = 200, body = AvailableSlotsResponse)))]
pub async fn available_slots(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<SlotsQuery>,
) -> ApiResult<Json<AvailableSlotsResponse>> {
    let appointments = ctx.appointment_repo();
    let users = ctx.user_repo();
    let uc = AvailableSlots {
        appointments: appointments.as_ref(),
        users: users.as_ref(),
    };
    let duration = q.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    let (dentist, slots) = uc
        .execute(&current.principal, q.dentist_id, q.date, duration)
        .await?;
    Ok(Json(AvailableSlotsResponse {
        dentist_id: dentist.id,
        dentist_name: dentist.full_name(),
        date: q.date,
        duration_minutes: duration,
        slots: slots.into_iter().map(SlotResponse::from).collect(),
    }))
}

#[utoipa::path(get, path = "/api/v2/appointments/upcoming", tag = "Appointments", params(UpcomingQuery),
    responses((status = 200, body = [AppointmentResponse])))]
pub async fn upcoming_appointments(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<UpcomingQuery>,
) -> ApiResult<Json<Vec<AppointmentResponse>>> {
    let repo = ctx.appointment_repo();
    let uc = UpcomingAppointments {
        appointments: repo.as_ref(),
    };
    let list = uc
        .execute(&current.principal, q.days.unwrap_or(7), Utc::now())
        .await?;
    Ok(respond(list))
}

#[utoipa::path(get, path = "/api/v2/appointments/{id}", tag = "Appointments",
    params(("id" = Uuid, Path, description = "Appointment id")),
    responses((status = 200, body = AppointmentResponse), (status = 404)))]
pub async fn get_appointment(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AppointmentResponse>> {
    let repo = ctx.appointment_repo();
    let uc = GetAppointment {
        appointments: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

#[utoipa::path(put, path = "/api/v2/appointments/{id}", tag = "Appointments", request_body = UpdateAppointmentRequest,
    params(("id" = Uuid, Path, description = "Appointment id")),
    responses((status = 200, body = AppointmentResponse), (status = 409)))]
pub async fn update_appointment(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> ApiResult<Json<AppointmentResponse>> {
    let appointments = ctx.appointment_repo();
    let users = ctx.user_repo();
    let uc = UpdateAppointment {
        appointments: appointments.as_ref(),
        users: users.as_ref(),
    };
    let changes = AppointmentChanges {
        dentist_id: req.dentist_id,
        appointment_date: req.appointment_date,
        duration_minutes: req.duration_minutes,
        appointment_type: req.appointment_type,
        reason: req.reason,
        notes: req.notes,
    };
    let appointment = uc
        .execute(&current.principal, id, &changes, Utc::now())
        .await?;
    Ok(Json(appointment.into()))
}

#[utoipa::path(put, path = "/api/v2/appointments/{id}/status", tag = "Appointments", request_body = StatusUpdateRequest,
    params(("id" = Uuid, Path, description = "Appointment id")),
    responses((status = 200, body = AppointmentResponse)))]
pub async fn update_status(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> ApiResult<Json<AppointmentResponse>> {
    let appointments = ctx.appointment_repo();
    let patients = ctx.patient_repo();
    let uc = UpdateAppointmentStatus {
        appointments: appointments.as_ref(),
        patients: patients.as_ref(),
    };
    let appointment = uc
        .execute(
            &current.principal,
            id,
            req.status,
            req.cancellation_reason,
            Utc::now(),
        )
        .await?;
    Ok(Json(appointment.into()))
}

#[utoipa::path(delete, path = "/api/v2/appointments/{id}", tag = "Appointments", params(
        ("id" = Uuid, Path, description = "Appointment id"),
        CancelQuery
    ),
    responses((status = 200, body = AppointmentResponse), (status = 400, description = "Already completed")))]
pub async fn cancel_appointment(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Query(q): Query<CancelQuery>,
) -> ApiResult<Json<AppointmentResponse>> {
    let repo = ctx.appointment_repo();
    let uc = CancelAppointment {
        appointments: repo.as_ref(),
    };
    let appointment = uc
        .execute(&current.principal, id, q.reason, Utc::now())
        .await?;
    Ok(Json(appointment.into()))
}
