pub mod assignment;
pub mod patient;

pub use assignment::{AUTO_ASSIGN_REASON, AssignmentCount, assigned_count, least_busy};
pub use patient::{Patient, PatientStatus, age_on, birth_date_bounds};
