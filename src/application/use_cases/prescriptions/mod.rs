pub mod manage_prescriptions;
