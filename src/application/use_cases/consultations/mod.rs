pub mod record_consultation;
