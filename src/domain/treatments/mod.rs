pub mod treatment;

pub use treatment::{
    ItemStatus, Treatment, TreatmentItem, TreatmentPriority, TreatmentStatus, items_cost,
};
