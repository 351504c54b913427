use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::users::Gender;

text_enum!(PatientStatus {
    Active => "active",
    Inactive => "inactive",
    Deceased => "deceased",
});

#[derive(Debug, Clone)]
pub struct Patient {
    pub id: Uuid,
    pub tenant_id: Uuid,
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
    pub status: PatientStatus,
    pub preferences: serde_json::Value,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_visit_at: Option<DateTime<Utc>>,
    pub assigned_dentist_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assignment_reason: Option<String>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Completed years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// Inclusive birth-date window `(earliest, latest)` for patients aged between `min_age` and
/// `max_age` on `today`. Either bound may be open.
pub fn birth_date_bounds(
    today: NaiveDate,
    min_age: Option<u32>,
    max_age: Option<u32>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let latest = min_age.and_then(|a| today.checked_sub_months(Months::new(a * 12)));
    let earliest = max_age
        .and_then(|a| today.checked_sub_months(Months::new((a + 1) * 12)))
        .and_then(|d| d.succ_opt());
    (earliest, latest)
}
