pub mod change_password;
pub mod login;
pub mod logout;
pub mod me;
pub mod password_reset;
pub mod refresh;
pub mod register;
pub mod sessions;
