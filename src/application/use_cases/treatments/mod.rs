pub mod plan_treatment;
pub mod progress;
