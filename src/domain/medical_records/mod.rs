pub mod record;

pub use record::{ALLOWED_EXTENSIONS, MedicalRecord, RecordType, normalized_extension};
