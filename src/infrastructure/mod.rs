pub mod cache;
pub mod crypto;
pub mod db;
pub mod rate_limit;
pub mod storage;
