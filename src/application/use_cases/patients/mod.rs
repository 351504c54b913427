pub mod assignments;
pub mod manage_patients;
pub mod search_patients;
