use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::prescriptions::Prescription;

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub treatment_id: Option<Uuid>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    pub quantity: Option<String>,
    pub refills: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PrescriptionQuery {
    pub patient_id: Option<Uuid>,
    /// When set, only undispensed prescriptions expiring after this instant.
    pub active_at: Option<DateTime<Utc>>,
    pub page: Page,
}

#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    async fn create(
        &self,
        tenant_id: Uuid,
        prescription: &NewPrescription,
    ) -> anyhow::Result<Prescription>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid)
    -> anyhow::Result<Option<Prescription>>;
    async fn list(
        &self,
        tenant_id: Uuid,
        query: &PrescriptionQuery,
    ) -> anyhow::Result<Vec<Prescription>>;
    async fn undispensed_expiring_before(
        &self,
        tenant_id: Uuid,
        before: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Prescription>>;
    async fn save(&self, tenant_id: Uuid, prescription: &Prescription)
    -> anyhow::Result<Prescription>;
    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}
