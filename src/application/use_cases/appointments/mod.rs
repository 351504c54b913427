pub mod book_appointment;
pub mod lifecycle;
pub mod schedule_queries;
