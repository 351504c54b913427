use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub const MAX_FAILED_ATTEMPTS: i64 = 5;
pub const LOCKOUT_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Failed attempts newer than this instant count towards the lockout.
pub fn lockout_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::minutes(LOCKOUT_MINUTES)
}

pub fn is_locked_out(recent_failures: i64) -> bool {
    recent_failures >= MAX_FAILED_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifth_failure_locks() {
        assert!(!is_locked_out(4));
        assert!(is_locked_out(5));
    }

    #[test]
    fn window_is_thirty_minutes() {
        let now = Utc::now();
        assert_eq!(now - lockout_window_start(now), Duration::minutes(30));
    }
}
