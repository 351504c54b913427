pub mod service;

pub use service::{DentalService, ServiceCategory, ServiceStatus};
