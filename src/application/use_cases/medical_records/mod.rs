pub mod records;
pub mod upload_record;
