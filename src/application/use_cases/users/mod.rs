pub mod create_user;
pub mod manage_users;
