pub mod consultation;

pub use consultation::Consultation;
