pub mod appointment_repository;
pub mod audit_repository;
pub mod auth_repository;
pub mod cache_port;
pub mod catalog_repository;
pub mod consultation_repository;
pub mod invoice_repository;
pub mod medical_file_store;
pub mod medical_record_repository;
pub mod patient_repository;
pub mod prescription_repository;
pub mod rate_limiter;
pub mod reporting_repository;
pub mod tenant_repository;
pub mod treatment_repository;
pub mod user_repository;

/// Offset pagination shared by list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 500;

    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(100).clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}
