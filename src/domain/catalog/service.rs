use chrono::{DateTime, Utc};
use uuid::Uuid;

text_enum!(ServiceCategory {
    Consultation => "consultation",
    Preventive => "preventive",
    Restorative => "restorative",
    Endodontics => "endodontics",
    Periodontics => "periodontics",
    Prosthodontics => "prosthodontics",
    Orthodontics => "orthodontics",
    OralSurgery => "oral_surgery",
    Cosmetic => "cosmetic",
    Other => "other",
});

text_enum!(ServiceStatus {
    Active => "active",
    Inactive => "inactive",
});

/// A billable procedure in a clinic's catalog.
#[derive(Debug, Clone)]
pub struct DentalService {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub base_price: f64,
    pub duration_minutes: i32,
    pub status: ServiceStatus,
    pub is_taxable: bool,
    pub tax_rate: f64,
    pub requirements: Option<serde_json::Value>,
    pub materials: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DentalService {
    pub fn is_active(&self) -> bool {
        self.status == ServiceStatus::Active
    }
}
