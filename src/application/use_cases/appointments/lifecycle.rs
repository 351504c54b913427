use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{Principal, SCHEDULERS, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::appointment_repository::AppointmentRepository;
use crate::application::ports::patient_repository::PatientRepository;
use crate::domain::appointments::{Appointment, AppointmentStatus};

pub struct UpdateAppointmentStatus<'a, A, P>
where
    A: AppointmentRepository + ?Sized,
    P: PatientRepository + ?Sized,
{
    pub appointments: &'a A,
    pub patients: &'a P,
}

impl<'a, A, P> UpdateAppointmentStatus<'a, A, P>
where
    A: AppointmentRepository + ?Sized,
    P: PatientRepository + ?Sized,
{
    /// Completing a visit also stamps the patient's last visit.
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        status: AppointmentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Appointment> {
        require_roles(principal, SCHEDULERS)?;
        let tenant_id = principal.tenant_id;
        let mut appointment = self
            .appointments
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Appointment"))?;
        appointment.apply_status(status, reason, now);
        let saved = self.appointments.save(tenant_id, &appointment).await?;
        if status == AppointmentStatus::Completed {
            self.patients
                .touch_last_visit(tenant_id, saved.patient_id, now)
                .await?;
        }
        tracing::info!(tenant_id = %tenant_id, appointment_id = %id, status = %status, "appointment_status_changed");
        Ok(saved)
    }
}

pub struct CancelAppointment<'a, A: AppointmentRepository + ?Sized> {
    pub appointments: &'a A,
}

impl<'a, A: AppointmentRepository + ?Sized> CancelAppointment<'a, A> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Appointment> {
        require_roles(principal, SCHEDULERS)?;
        let mut appointment = self
            .appointments
            .find_by_id(principal.tenant_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Appointment"))?;
        if appointment.status == AppointmentStatus::Completed {
            return Err(ServiceError::validation(
                "Completed appointments cannot be cancelled",
            ));
        }
        appointment.apply_status(AppointmentStatus::Cancelled, reason, now);
        Ok(self.appointments.save(principal.tenant_id, &appointment).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::domain::users::StaffRole;

    #[tokio::test]
    async fn completion_updates_last_visit() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", dentist.id);
        let appt = store.seed_appointment(tenant.id, patient.id, dentist.id, Utc::now());
        let now = Utc::now();
        let done = UpdateAppointmentStatus {
            appointments: &store,
            patients: &store,
        }
        .execute(
            &store.principal_for(&dentist),
            appt.id,
            AppointmentStatus::Completed,
            None,
            now,
        )
        .await
        .unwrap();
        assert_eq!(done.completed_at, Some(now));
        assert_eq!(store.patient(patient.id).and_then(|p| p.last_visit_at), Some(now));
    }

    #[tokio::test]
    async fn cancel_records_reason() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", dentist.id);
        let appt = store.seed_appointment(tenant.id, patient.id, dentist.id, Utc::now());
        let cancelled = CancelAppointment { appointments: &store }
            .execute(
                &store.principal_for(&dentist),
                appt.id,
                Some("patient ill".into()),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("patient ill"));
    }

    #[tokio::test]
    async fn assistants_cannot_change_status() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let assistant = store.seed_user(tenant.id, "as@clinic.test", StaffRole::Assistant);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", dentist.id);
        let appt = store.seed_appointment(tenant.id, patient.id, dentist.id, Utc::now());
        let err = CancelAppointment { appointments: &store }
            .execute(&store.principal_for(&assistant), appt.id, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
