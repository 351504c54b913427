pub mod prescription;

pub use prescription::{EXPIRY_WARNING_DAYS, ExpiryReport, Prescription, default_expiry, expiry_report};
