use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::role::StaffRole;

text_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
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
    pub is_available: bool,
    pub is_active: bool,
    pub is_verified: bool,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
