use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::appointments::{Appointment, AppointmentStatus, AppointmentType};

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: Page,
}

/// Result of a write that must not collide with another booking of the same dentist.
#[derive(Debug, Clone)]
pub enum SlotWrite {
    Written(Appointment),
    /// The booking already holding the slot.
    Conflict(Appointment),
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Checks the dentist's calendar and inserts in one transaction, serialised per dentist.
    async fn create(
        &self,
        tenant_id: Uuid,
        appointment: &NewAppointment,
    ) -> anyhow::Result<SlotWrite>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Appointment>>;
    async fn list(
        &self,
        tenant_id: Uuid,
        query: &AppointmentQuery,
    ) -> anyhow::Result<Vec<Appointment>>;
    /// Appointments of `dentist_id` with one of `statuses` starting inside `[from, to)`.
    async fn for_dentist_between(
        &self,
        tenant_id: Uuid,
        dentist_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> anyhow::Result<Vec<Appointment>>;
    async fn upcoming(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Appointment>>;
    /// Saves a booking whose dentist or time changed, under the same check as `create`.
    async fn reschedule(
        &self,
        tenant_id: Uuid,
        appointment: &Appointment,
    ) -> anyhow::Result<SlotWrite>;
    async fn save(&self, tenant_id: Uuid, appointment: &Appointment) -> anyhow::Result<Appointment>;
}
