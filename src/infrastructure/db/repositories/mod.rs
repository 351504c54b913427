pub mod appointment_repository_sqlx;
pub mod audit_repository_sqlx;
pub mod auth_repository_sqlx;
pub mod catalog_repository_sqlx;
pub mod consultation_repository_sqlx;
pub mod invoice_repository_sqlx;
pub mod medical_record_repository_sqlx;
pub mod patient_repository_sqlx;
pub mod prescription_repository_sqlx;
pub mod reporting_repository_sqlx;
pub mod tenant_repository_sqlx;
pub mod treatment_repository_sqlx;
pub mod user_repository_sqlx;
