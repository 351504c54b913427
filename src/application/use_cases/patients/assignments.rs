use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::application::access::{CLINICAL_STAFF, Principal, SCHEDULERS, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::Page;
use crate::application::ports::appointment_repository::{
    AppointmentQuery, AppointmentRepository, SlotWrite,
};
use crate::application::ports::audit_repository::{AuditRepository, record_quietly};
use crate::application::ports::patient_repository::{DentistAssignment, PatientRepository};
use crate::application::ports::user_repository::{UserQuery, UserRepository};
use crate::application::use_cases::appointments::book_appointment::bookable_clinician;
use crate::application::use_cases::patients::manage_patients::load_patient;
use crate::domain::appointments::AppointmentStatus;
use crate::domain::audit::{AuditAction, AuditEntry};
use crate::domain::patients::{AUTO_ASSIGN_REASON, Patient, PatientStatus, assigned_count, least_busy};
use crate::domain::users::User;

const STALE_ASSIGNMENT: &str = "Patient assignment changed, reload and retry";
const UPCOMING_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub patient: Patient,
    pub previous_dentist_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentNote {
    pub reason: Option<String>,
    pub notes: Option<String>,
}

async fn active_patient<P: PatientRepository + ?Sized>(
    patients: &P,
    tenant_id: Uuid,
    patient_id: Uuid,
) -> ServiceResult<Patient> {
    let patient = load_patient(patients, tenant_id, patient_id).await?;
    if patient.status != PatientStatus::Active {
        return Err(ServiceError::validation("Patient is not active"));
    }
    Ok(patient)
}

/// Compare-and-set against the dentist read from `current`, then audit.
async fn write_assignment<P, A>(
    patients: &P,
    audit: &A,
    principal: &Principal,
    current: &Patient,
    dentist_id: Option<Uuid>,
    note: &AssignmentNote,
    now: DateTime<Utc>,
) -> ServiceResult<AssignmentOutcome>
where
    P: PatientRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    let previous_dentist_id = current.assigned_dentist_id;
    let assignment = DentistAssignment {
        dentist_id,
        expected: previous_dentist_id,
        reason: note.reason.clone(),
        assigned_by: principal.user_id,
        at: now,
    };
    let patient = match patients
        .set_assigned_dentist(principal.tenant_id, current.id, &assignment)
        .await?
    {
        Some(patient) => patient,
        None => {
            tracing::warn!(tenant_id = %principal.tenant_id, patient_id = %current.id, "patient_assignment_stale");
            return Err(ServiceError::conflict(STALE_ASSIGNMENT));
        }
    };
    record_quietly(
        audit,
        principal.tenant_id,
        AuditEntry {
            user_id: principal.user_id,
            action: AuditAction::Updated,
            entity_type: "patient_assignment",
            entity_id: patient.id,
            details: Some(json!({
                "previous_dentist_id": previous_dentist_id,
                "dentist_id": dentist_id,
                "reason": note.reason,
                "notes": note.notes,
            })),
            ip_address: None,
            user_agent: None,
        },
    )
    .await;
    tracing::info!(
        tenant_id = %principal.tenant_id,
        patient_id = %patient.id,
        previous = ?previous_dentist_id,
        dentist = ?dentist_id,
        "patient_assignment_changed"
    );
    Ok(AssignmentOutcome {
        patient,
        previous_dentist_id,
    })
}

pub struct AssignDentist<'a, P, U, A>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub patients: &'a P,
    pub users: &'a U,
    pub audit: &'a A,
}

impl<'a, P, U, A> AssignDentist<'a, P, U, A>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        patient_id: Uuid,
        dentist_id: Uuid,
        note: &AssignmentNote,
        now: DateTime<Utc>,
    ) -> ServiceResult<AssignmentOutcome> {
        require_roles(principal, SCHEDULERS)?;
        let patient = active_patient(self.patients, principal.tenant_id, patient_id).await?;
        bookable_clinician(self.users, principal.tenant_id, dentist_id).await?;
        if patient.assigned_dentist_id == Some(dentist_id) {
            return Err(ServiceError::validation(
                "Patient is already assigned to this dentist",
            ));
        }
        write_assignment(
            self.patients,
            self.audit,
            principal,
            &patient,
            Some(dentist_id),
            note,
            now,
        )
        .await
    }
}

/// Moves an already assigned patient to another dentist.
pub struct ReassignDentist<'a, P, U, A>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub patients: &'a P,
    pub users: &'a U,
    pub audit: &'a A,
}

impl<'a, P, U, A> ReassignDentist<'a, P, U, A>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        patient_id: Uuid,
        new_dentist_id: Uuid,
        note: &AssignmentNote,
        now: DateTime<Utc>,
    ) -> ServiceResult<AssignmentOutcome> {
        require_roles(principal, SCHEDULERS)?;
        let patient = active_patient(self.patients, principal.tenant_id, patient_id).await?;
        let Some(current) = patient.assigned_dentist_id else {
            return Err(ServiceError::validation("Patient has no assigned dentist"));
        };
        if current == new_dentist_id {
            return Err(ServiceError::validation(
                "Patient is already assigned to this dentist",
            ));
        }
        bookable_clinician(self.users, principal.tenant_id, new_dentist_id).await?;
        write_assignment(
            self.patients,
            self.audit,
            principal,
            &patient,
            Some(new_dentist_id),
            note,
            now,
        )
        .await
    }
}

pub struct RemoveDentist<'a, P, A>
where
    P: PatientRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub patients: &'a P,
    pub audit: &'a A,
}

impl<'a, P, A> RemoveDentist<'a, P, A>
where
    P: PatientRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        patient_id: Uuid,
        note: &AssignmentNote,
        now: DateTime<Utc>,
    ) -> ServiceResult<AssignmentOutcome> {
        require_roles(principal, SCHEDULERS)?;
        let patient = load_patient(self.patients, principal.tenant_id, patient_id).await?;
        if patient.assigned_dentist_id.is_none() {
            return Err(ServiceError::validation("Patient has no assigned dentist"));
        }
        write_assignment(self.patients, self.audit, principal, &patient, None, note, now).await
    }
}

/// Hands the patient to the available dentist with the fewest active patients.
pub struct AutoAssignDentist<'a, P, U, A>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub patients: &'a P,
    pub users: &'a U,
    pub audit: &'a A,
}

impl<'a, P, U, A> AutoAssignDentist<'a, P, U, A>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<AssignmentOutcome> {
        require_roles(principal, SCHEDULERS)?;
        let patient = active_patient(self.patients, principal.tenant_id, patient_id).await?;
        let candidates: Vec<Uuid> = self
            .users
            .available_dentists(principal.tenant_id)
            .await?
            .into_iter()
            .map(|u| u.id)
            .filter(|id| Some(*id) != patient.assigned_dentist_id)
            .collect();
        let counts = self.patients.assignment_counts(principal.tenant_id).await?;
        let dentist_id = least_busy(&candidates, &counts)
            .ok_or_else(|| ServiceError::validation("No available dentists"))?;
        let note = AssignmentNote {
            reason: Some(AUTO_ASSIGN_REASON.to_owned()),
            notes: None,
        };
        write_assignment(
            self.patients,
            self.audit,
            principal,
            &patient,
            Some(dentist_id),
            &note,
            now,
        )
        .await
    }
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub assignment: AssignmentOutcome,
    pub moved_appointment_ids: Vec<Uuid>,
    /// Appointments left with their dentist because the new dentist was booked at that time.
    pub kept_appointment_ids: Vec<Uuid>,
}

/// Reassigns the patient and moves their upcoming appointments to the new dentist.
pub struct TransferPatient<'a, P, U, R, A>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    R: AppointmentRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub patients: &'a P,
    pub users: &'a U,
    pub appointments: &'a R,
    pub audit: &'a A,
}

impl<'a, P, U, R, A> TransferPatient<'a, P, U, R, A>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    R: AppointmentRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        patient_id: Uuid,
        to_dentist_id: Uuid,
        note: &AssignmentNote,
        now: DateTime<Utc>,
    ) -> ServiceResult<TransferOutcome> {
        let assignment = ReassignDentist {
            patients: self.patients,
            users: self.users,
            audit: self.audit,
        }
        .execute(principal, patient_id, to_dentist_id, note, now)
        .await?;

        let query = AppointmentQuery {
            patient_id: Some(patient_id),
            date_from: Some(now),
            page: Page::new(Some(0), Some(Page::MAX_LIMIT)),
            ..AppointmentQuery::default()
        };
        let upcoming = self.appointments.list(principal.tenant_id, &query).await?;
        let mut moved_appointment_ids = Vec::new();
        let mut kept_appointment_ids = Vec::new();
        for appointment in upcoming.into_iter().filter(|a| {
            AppointmentStatus::UPCOMING.contains(&a.status) && a.dentist_id != to_dentist_id
        }) {
            let mut moved = appointment.clone();
            moved.dentist_id = to_dentist_id;
            moved.updated_at = now;
            match self
                .appointments
                .reschedule(principal.tenant_id, &moved)
                .await?
            {
                SlotWrite::Written(a) => moved_appointment_ids.push(a.id),
                SlotWrite::Conflict(_) => kept_appointment_ids.push(appointment.id),
            }
        }
        tracing::info!(
            tenant_id = %principal.tenant_id,
            patient_id = %patient_id,
            moved = moved_appointment_ids.len(),
            kept = kept_appointment_ids.len(),
            "patient_transferred"
        );
        Ok(TransferOutcome {
            assignment,
            moved_appointment_ids,
            kept_appointment_ids,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Workload {
    pub dentist: User,
    pub assigned_patients: i64,
    pub appointments_today: usize,
    pub upcoming_appointments: usize,
}

async fn workload_of<R: AppointmentRepository + ?Sized>(
    appointments: &R,
    tenant_id: Uuid,
    dentist: User,
    assigned_patients: i64,
    now: DateTime<Utc>,
) -> ServiceResult<Workload> {
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let today = appointments
        .for_dentist_between(
            tenant_id,
            dentist.id,
            day_start,
            day_start + Duration::days(1),
            &AppointmentStatus::BLOCKING,
        )
        .await?;
    let upcoming = appointments
        .for_dentist_between(
            tenant_id,
            dentist.id,
            now,
            now + Duration::days(UPCOMING_WINDOW_DAYS),
            &AppointmentStatus::UPCOMING,
        )
        .await?;
    Ok(Workload {
        dentist,
        assigned_patients,
        appointments_today: today.len(),
        upcoming_appointments: upcoming.len(),
    })
}

pub struct DentistWorkload<'a, P, U, R>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    R: AppointmentRepository + ?Sized,
{
    pub patients: &'a P,
    pub users: &'a U,
    pub appointments: &'a R,
}

impl<'a, P, U, R> DentistWorkload<'a, P, U, R>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    R: AppointmentRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        dentist_id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<Workload> {
        require_roles(principal, CLINICAL_STAFF)?;
        let dentist = self
            .users
            .find_by_id(principal.tenant_id, dentist_id)
            .await?
            .filter(|u| u.role.is_clinician())
            .ok_or_else(|| ServiceError::not_found("Dentist"))?;
        let counts = self.patients.assignment_counts(principal.tenant_id).await?;
        let assigned = assigned_count(&counts, dentist.id);
        workload_of(
            self.appointments,
            principal.tenant_id,
            dentist,
            assigned,
            now,
        )
        .await
    }
}

/// Workload of every active clinician in the clinic.
pub struct AllWorkloads<'a, P, U, R>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    R: AppointmentRepository + ?Sized,
{
    pub patients: &'a P,
    pub users: &'a U,
    pub appointments: &'a R,
}

impl<'a, P, U, R> AllWorkloads<'a, P, U, R>
where
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    R: AppointmentRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Workload>> {
        require_roles(principal, CLINICAL_STAFF)?;
        let query = UserQuery {
            role: None,
            active_only: true,
            page: Page::new(Some(0), Some(Page::MAX_LIMIT)),
        };
        let clinicians = self
            .users
            .list(principal.tenant_id, &query)
            .await?
            .into_iter()
            .filter(|u| u.role.is_clinician());
        let counts = self.patients.assignment_counts(principal.tenant_id).await?;
        let mut workloads = Vec::new();
        for dentist in clinicians {
            let assigned = assigned_count(&counts, dentist.id);
            workloads.push(
                workload_of(
                    self.appointments,
                    principal.tenant_id,
                    dentist,
                    assigned,
                    now,
                )
                .await?,
            );
        }
        Ok(workloads)
    }
}

pub struct DentistPatients<'a, P: PatientRepository + ?Sized> {
    pub patients: &'a P,
}

impl<'a, P: PatientRepository + ?Sized> DentistPatients<'a, P> {
    pub async fn execute(
        &self,
        principal: &Principal,
        dentist_id: Uuid,
        page: Page,
    ) -> ServiceResult<Vec<Patient>> {
        require_roles(principal, CLINICAL_STAFF)?;
        Ok(self
            .patients
            .assigned_to(principal.tenant_id, dentist_id, page)
            .await?)
    }
}
