use async_trait::async_trait;
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::treatments::{Treatment, TreatmentItem, TreatmentPriority, TreatmentStatus};

#[derive(Debug, Clone)]
pub struct NewTreatment {
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub priority: TreatmentPriority,
    pub teeth_involved: Option<serde_json::Value>,
    pub quadrants: Option<serde_json::Value>,
    pub total_stages: i32,
    pub estimated_cost: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewTreatmentItem {
    pub treatment_id: Uuid,
    pub service_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub tooth_number: Option<String>,
    pub surface: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TreatmentQuery {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub status: Option<TreatmentStatus>,
    pub page: Page,
}

#[async_trait]
pub trait TreatmentRepository: Send + Sync {
    async fn create(&self, tenant_id: Uuid, treatment: &NewTreatment) -> anyhow::Result<Treatment>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Treatment>>;
    async fn list(&self, tenant_id: Uuid, query: &TreatmentQuery)
    -> anyhow::Result<Vec<Treatment>>;
    async fn save(&self, tenant_id: Uuid, treatment: &Treatment) -> anyhow::Result<Treatment>;
    async fn add_item(
        &self,
        tenant_id: Uuid,
        item: &NewTreatmentItem,
    ) -> anyhow::Result<TreatmentItem>;
    async fn items(&self, tenant_id: Uuid, treatment_id: Uuid)
    -> anyhow::Result<Vec<TreatmentItem>>;
}
