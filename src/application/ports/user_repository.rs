use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::users::{Gender, StaffRole, User};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub contact_number: String,
    pub role: StaffRole,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub employee_id: Option<String>,
    pub work_schedule: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub contact_number: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub employee_id: Option<String>,
    pub work_schedule: Option<serde_json::Value>,
    pub is_available: Option<bool>,
    pub role: Option<StaffRole>,
    pub is_active: Option<bool>,
}

impl UserPatch {
    pub fn touches_privileged_fields(&self) -> bool {
        self.role.is_some() || self.is_active.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub role: Option<StaffRole>,
    pub active_only: bool,
    pub page: Page,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, tenant_id: Uuid, user: &NewUser) -> anyhow::Result<User>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> anyhow::Result<Option<User>>;
    async fn list(&self, tenant_id: Uuid, query: &UserQuery) -> anyhow::Result<Vec<User>>;
    async fn count_active(&self, tenant_id: Uuid) -> anyhow::Result<i64>;
    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: &UserPatch,
    ) -> anyhow::Result<Option<User>>;
    async fn set_password(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<bool>;
    async fn touch_last_login(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
    async fn available_dentists(&self, tenant_id: Uuid) -> anyhow::Result<Vec<User>>;
}
