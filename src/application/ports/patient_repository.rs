use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::patients::{AssignmentCount, Patient, PatientStatus};
use crate::domain::users::Gender;

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub contact_number: String,
    pub email: Option<String>,
    pub address: String,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_history: serde_json::Value,
    pub dental_history: serde_json::Value,
    pub insurance_info: Option<serde_json::Value>,
    pub preferences: serde_json::Value,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct PatientPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_history: Option<serde_json::Value>,
    pub dental_history: Option<serde_json::Value>,
    pub insurance_info: Option<serde_json::Value>,
    pub status: Option<PatientStatus>,
    pub preferences: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct PatientQuery {
    pub search: Option<String>,
    pub status: Option<PatientStatus>,
    pub gender: Option<Gender>,
    pub born_on_or_after: Option<NaiveDate>,
    pub born_on_or_before: Option<NaiveDate>,
    pub page: Page,
}

/// New value of a patient's dentist assignment. `dentist_id: None` clears it.
#[derive(Debug, Clone)]
pub struct DentistAssignment {
    pub dentist_id: Option<Uuid>,
    /// The assignment the caller read; the write is skipped if it has changed since.
    pub expected: Option<Uuid>,
    pub reason: Option<String>,
    pub assigned_by: Uuid,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn create(&self, tenant_id: Uuid, patient: &NewPatient) -> anyhow::Result<Patient>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Patient>>;
    async fn find_by_email(&self, tenant_id: Uuid, email: &str)
    -> anyhow::Result<Option<Patient>>;
    async fn search(&self, tenant_id: Uuid, query: &PatientQuery) -> anyhow::Result<Vec<Patient>>;
    async fn count(&self, tenant_id: Uuid) -> anyhow::Result<i64>;
    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: &PatientPatch,
        updated_by: Uuid,
    ) -> anyhow::Result<Option<Patient>>;
    /// `None` when the patient is missing or its assignment no longer equals `expected`.
    async fn set_assigned_dentist(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
        assignment: &DentistAssignment,
    ) -> anyhow::Result<Option<Patient>>;
    async fn assigned_to(
        &self,
        tenant_id: Uuid,
        dentist_id: Uuid,
        page: Page,
    ) -> anyhow::Result<Vec<Patient>>;
    /// Active patients per assigned dentist; dentists without patients are absent.
    async fn assignment_counts(&self, tenant_id: Uuid) -> anyhow::Result<Vec<AssignmentCount>>;
    async fn touch_last_visit(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}
