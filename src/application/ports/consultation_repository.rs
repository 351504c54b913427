use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::consultations::Consultation;

#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub chief_complaint: Option<String>,
    pub medical_history_review: Option<serde_json::Value>,
    pub dental_history_review: Option<serde_json::Value>,
    pub extraoral_findings: Option<String>,
    pub intraoral_findings: Option<String>,
    pub periodontal_assessment: Option<String>,
    pub occlusion_assessment: Option<String>,
    pub diagnosis: serde_json::Value,
    pub treatment_plan: serde_json::Value,
    pub recommendations: Option<String>,
    pub consultation_fee: Option<f64>,
    pub next_appointment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ConsultationQuery {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub page: Page,
}

#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    async fn create(
        &self,
        tenant_id: Uuid,
        consultation: &NewConsultation,
    ) -> anyhow::Result<Consultation>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid)
    -> anyhow::Result<Option<Consultation>>;
    async fn list(
        &self,
        tenant_id: Uuid,
        query: &ConsultationQuery,
    ) -> anyhow::Result<Vec<Consultation>>;
    async fn save(
        &self,
        tenant_id: Uuid,
        consultation: &Consultation,
    ) -> anyhow::Result<Consultation>;
}
