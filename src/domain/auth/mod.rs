pub mod lockout;
pub mod session;

pub use lockout::{LOCKOUT_MINUTES, LoginAttempt, MAX_FAILED_ATTEMPTS, is_locked_out, lockout_window_start};
pub use session::{PasswordResetToken, RefreshSession};
