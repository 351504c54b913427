use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::user_repository::NewUser;
use crate::domain::tenants::{BillingCycle, PaymentStatus, Tenant, TenantStatus, TenantTier};
use crate::domain::users::User;

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub tier: TenantTier,
    pub payment_status: PaymentStatus,
    pub billing_cycle: BillingCycle,
    pub max_users: i32,
    pub max_patients: i32,
    pub max_storage_gb: i32,
    pub max_api_calls_per_month: i32,
    pub enabled_features: serde_json::Value,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct TenantPatch {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub tier: Option<TenantTier>,
    pub billing_cycle: Option<BillingCycle>,
    pub settings: Option<serde_json::Value>,
    pub max_users: Option<i32>,
    pub max_patients: Option<i32>,
    pub max_storage_gb: Option<i32>,
    pub max_api_calls_per_month: Option<i32>,
    pub enabled_features: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantStats {
    pub users: i64,
    pub patients: i64,
    pub appointments: i64,
    pub invoices: i64,
    pub monthly_revenue: f64,
    pub active_patients: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantUsage {
    pub active_users: i64,
    pub patients: i64,
    pub storage_bytes: i64,
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create(&self, tenant: &NewTenant) -> anyhow::Result<Tenant>;
    /// Creates the tenant and its first user atomically.
    async fn create_with_admin(
        &self,
        tenant: &NewTenant,
        admin: &NewUser,
    ) -> anyhow::Result<(Tenant, User)>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Tenant>>;
    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<Tenant>>;
    async fn name_or_slug_taken(
        &self,
        name: &str,
        slug: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool>;
    async fn list(&self, page: Page) -> anyhow::Result<Vec<Tenant>>;
    async fn list_active(&self) -> anyhow::Result<Vec<Tenant>>;
    async fn update(&self, id: Uuid, patch: &TenantPatch) -> anyhow::Result<Option<Tenant>>;
    async fn set_status(&self, id: Uuid, status: TenantStatus) -> anyhow::Result<bool>;
    async fn stats(&self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<TenantStats>;
    async fn usage(&self, id: Uuid) -> anyhow::Result<TenantUsage>;
}
