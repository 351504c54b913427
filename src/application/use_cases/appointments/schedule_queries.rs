use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::application::access::Principal;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::appointment_repository::{AppointmentQuery, AppointmentRepository};
use crate::application::ports::user_repository::UserRepository;
use crate::domain::appointments::{
    Appointment, AppointmentStatus, Slot, day_slots, validate_duration,
};
use crate::domain::users::User;

pub struct ListAppointments<'a, A: AppointmentRepository + ?Sized> {
    pub appointments: &'a A,
}

impl<'a, A: AppointmentRepository + ?Sized> ListAppointments<'a, A> {
    pub async fn execute(
        &self,
        principal: &Principal,
        query: &AppointmentQuery,
    ) -> ServiceResult<Vec<Appointment>> {
        if let (Some(from), Some(to)) = (query.date_from, query.date_to) {
            if from > to {
                return Err(ServiceError::validation("date_from must not be after date_to"));
            }
        }
        Ok(self.appointments.list(principal.tenant_id, query).await?)
    }
}

pub struct GetAppointment<'a, A: AppointmentRepository + ?Sized> {
    pub appointments: &'a A,
}

impl<'a, A: AppointmentRepository + ?Sized> GetAppointment<'a, A> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<Appointment> {
        self.appointments
            .find_by_id(principal.tenant_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Appointment"))
    }
}

pub struct AvailableSlots<'a, A, U>
where
    A: AppointmentRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    pub appointments: &'a A,
    pub users: &'a U,
}

impl<'a, A, U> AvailableSlots<'a, A, U>
where
    A: AppointmentRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    /// Every working-day slot for the dentist on `date`, flagged free or taken.
    pub async fn execute(
        &self,
        principal: &Principal,
        dentist_id: Uuid,
        date: NaiveDate,
        duration_minutes: i32,
    ) -> ServiceResult<(User, Vec<Slot>)> {
        validate_duration(duration_minutes).map_err(ServiceError::Validation)?;
        let dentist = self
            .users
            .find_by_id(principal.tenant_id, dentist_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Dentist"))?;
        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        let booked = self
            .appointments
            .for_dentist_between(
                principal.tenant_id,
                dentist_id,
                day_start,
                day_start + Duration::days(1),
                &AppointmentStatus::BLOCKING,
            )
            .await?;
        let busy: Vec<_> = booked
            .iter()
            .map(|a| (a.appointment_date, a.ends_at()))
            .collect();
        Ok((dentist, day_slots(date, duration_minutes, &busy)))
    }
}

pub const MAX_UPCOMING_DAYS: i64 = 30;

pub struct UpcomingAppointments<'a, A: AppointmentRepository + ?Sized> {
    pub appointments: &'a A,
}

impl<'a, A: AppointmentRepository + ?Sized> UpcomingAppointments<'a, A> {
    pub async fn execute(
        &self,
        principal: &Principal,
        days: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Appointment>> {
        if !(1..=MAX_UPCOMING_DAYS).contains(&days) {
            return Err(ServiceError::validation(format!(
                "days must be between 1 and {MAX_UPCOMING_DAYS}"
            )));
        }
        Ok(self
            .appointments
            .upcoming(principal.tenant_id, now, now + Duration::days(days))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::domain::users::StaffRole;
    use chrono::TimeZone;

    #[tokio::test]
    async fn booked_hour_is_marked_taken() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", dentist.id);
        store.seed_appointment(
            tenant.id,
            patient.id,
            dentist.id,
            Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap(),
        );
        let date = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
        let (who, slots) = AvailableSlots {
            appointments: &store,
            users: &store,
        }
        .execute(&store.principal_for(&dentist), dentist.id, date, 60)
        .await
        .unwrap();
        assert_eq!(who.id, dentist.id);
        assert_eq!(slots.len(), 8);
        let taken: Vec<_> = slots.iter().filter(|s| !s.is_available).collect();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].start, Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn upcoming_window_is_bounded() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let uc = UpcomingAppointments { appointments: &store };
        let principal = store.principal_for(&dentist);
        assert!(uc.execute(&principal, 0, Utc::now()).await.is_err());
        assert!(uc.execute(&principal, 31, Utc::now()).await.is_err());
        assert!(uc.execute(&principal, 7, Utc::now()).await.unwrap().is_empty());
    }
}
