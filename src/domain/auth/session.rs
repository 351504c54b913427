use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One issued refresh token. Rotation revokes the row and inserts a successor carrying the
/// same `session_id`, so a session is the lineage of its refresh tokens.
#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RefreshSession {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at > now
    }
}
