use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{Principal, SCHEDULERS, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::appointment_repository::{
    AppointmentRepository, NewAppointment, SlotWrite,
};
use crate::application::ports::patient_repository::PatientRepository;
use crate::application::ports::user_repository::UserRepository;
use crate::domain::appointments::{Appointment, AppointmentType, validate_duration};
use crate::domain::users::User;

pub const CONFLICT_MESSAGE: &str = "Appointment time conflicts with existing appointment";

/// The dentist must exist, be bookable, active and available.
pub(crate) async fn bookable_clinician<U: UserRepository + ?Sized>(
    users: &U,
    tenant_id: Uuid,
    dentist_id: Uuid,
) -> ServiceResult<User> {
    let dentist = users
        .find_by_id(tenant_id, dentist_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Dentist"))?;
    if !dentist.role.is_clinician() {
        return Err(ServiceError::validation(
            "Selected staff member cannot take appointments",
        ));
    }
    if !dentist.is_active || !dentist.is_available {
        return Err(ServiceError::validation("Dentist not found or not available"));
    }
    Ok(dentist)
}

fn slot_taken(tenant_id: Uuid, written: SlotWrite) -> ServiceResult<Appointment> {
    match written {
        SlotWrite::Written(appointment) => Ok(appointment),
        SlotWrite::Conflict(other) => {
            tracing::debug!(tenant_id = %tenant_id, dentist_id = %other.dentist_id, conflicting = %other.id, "appointment_conflict");
            Err(ServiceError::conflict(CONFLICT_MESSAGE))
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

pub const DEFAULT_DURATION_MINUTES: i32 = 30;

pub struct BookAppointment<'a, A, P, U>
where
    A: AppointmentRepository + ?Sized,
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    pub appointments: &'a A,
    pub patients: &'a P,
    pub users: &'a U,
}

impl<'a, A, P, U> BookAppointment<'a, A, P, U>
where
    A: AppointmentRepository + ?Sized,
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        req: &BookingRequest,
    ) -> ServiceResult<Appointment> {
        require_roles(principal, SCHEDULERS)?;
        let tenant_id = principal.tenant_id;
        let duration = req.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        validate_duration(duration).map_err(ServiceError::Validation)?;

        self.patients
            .find_by_id(tenant_id, req.patient_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Patient"))?;
        bookable_clinician(self.users, tenant_id, req.dentist_id).await?;

        let written = self
            .appointments
            .create(
                tenant_id,
                &NewAppointment {
                    patient_id: req.patient_id,
                    dentist_id: req.dentist_id,
                    appointment_date: req.appointment_date,
                    duration_minutes: duration,
                    appointment_type: req.appointment_type,
                    reason: req.reason.clone(),
                    notes: req.notes.clone(),
                    created_by: principal.user_id,
                },
            )
            .await?;
        let appointment = slot_taken(tenant_id, written)?;
        tracing::info!(tenant_id = %tenant_id, appointment_id = %appointment.id, "appointment_booked");
        Ok(appointment)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub dentist_id: Option<Uuid>,
    pub appointment_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

pub struct UpdateAppointment<'a, A, U>
where
    A: AppointmentRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    pub appointments: &'a A,
    pub users: &'a U,
}

impl<'a, A, U> UpdateAppointment<'a, A, U>
where
    A: AppointmentRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    /// Moving the booking in time or to another dentist re-runs the conflict check.
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: &AppointmentChanges,
        now: DateTime<Utc>,
    ) -> ServiceResult<Appointment> {
        require_roles(principal, SCHEDULERS)?;
        let tenant_id = principal.tenant_id;
        let mut appointment = self
            .appointments
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Appointment"))?;

        let moved = changes
            .dentist_id
            .is_some_and(|d| d != appointment.dentist_id)
            || changes
                .appointment_date
                .is_some_and(|d| d != appointment.appointment_date)
            || changes
                .duration_minutes
                .is_some_and(|d| d != appointment.duration_minutes);

        if let Some(d) = changes.duration_minutes {
            validate_duration(d).map_err(ServiceError::Validation)?;
            appointment.duration_minutes = d;
        }
        if let Some(dentist_id) = changes.dentist_id.filter(|d| *d != appointment.dentist_id) {
            bookable_clinician(self.users, tenant_id, dentist_id).await?;
            appointment.dentist_id = dentist_id;
        }
        if let Some(date) = changes.appointment_date {
            appointment.appointment_date = date;
        }
        if let Some(t) = changes.appointment_type {
            appointment.appointment_type = t;
        }
        if changes.reason.is_some() {
            appointment.reason = changes.reason.clone();
        }
        if changes.notes.is_some() {
            appointment.notes = changes.notes.clone();
        }
        appointment.updated_at = now;
        if moved {
            let written = self.appointments.reschedule(tenant_id, &appointment).await?;
            return slot_taken(tenant_id, written);
        }
        Ok(self.appointments.save(tenant_id, &appointment).await?)
    }
}
