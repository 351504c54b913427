pub mod checksum;
pub mod password_policy;
pub mod passwords;
pub mod validation;
