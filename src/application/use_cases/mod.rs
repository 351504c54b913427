pub mod appointments;
pub mod audit_logs;
pub mod auth;
pub mod consultations;
pub mod dashboard;
pub mod invoices;
pub mod medical_records;
pub mod patients;
pub mod prescriptions;
pub mod services;
pub mod tenants;
pub mod treatments;
pub mod users;

#[cfg(test)]
pub(crate) mod fakes;
