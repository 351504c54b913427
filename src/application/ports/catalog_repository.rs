use async_trait::async_trait;
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::catalog::{DentalService, ServiceCategory, ServiceStatus};

#[derive(Debug, Clone)]
pub struct NewService {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub base_price: f64,
    pub duration_minutes: i32,
    pub is_taxable: bool,
    pub tax_rate: f64,
    pub requirements: Option<serde_json::Value>,
    pub materials: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceQuery {
    pub category: Option<ServiceCategory>,
    pub status: Option<ServiceStatus>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub page: Page,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: ServiceCategory,
    pub count: i64,
    pub average_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn create(&self, tenant_id: Uuid, service: &NewService) -> anyhow::Result<DentalService>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid)
    -> anyhow::Result<Option<DentalService>>;
    async fn find_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> anyhow::Result<Option<DentalService>>;
    async fn list(&self, tenant_id: Uuid, query: &ServiceQuery)
    -> anyhow::Result<Vec<DentalService>>;
    async fn save(&self, tenant_id: Uuid, service: &DentalService) -> anyhow::Result<DentalService>;
    async fn category_summary(&self, tenant_id: Uuid) -> anyhow::Result<Vec<CategorySummary>>;
}
