pub mod appointment;
pub mod schedule;

pub use appointment::{Appointment, AppointmentStatus, AppointmentType};
pub use schedule::{Slot, conflict_window, day_slots, validate_duration};
