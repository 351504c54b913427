pub mod role;
pub mod user;

pub use role::{Permission, StaffRole};
pub use user::{Gender, User};
