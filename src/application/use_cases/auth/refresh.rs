use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::auth_repository::{AuthRepository, NewSession};
use crate::application::ports::user_repository::UserRepository;
use crate::application::use_cases::auth::login::LoginOutcome;

pub struct RefreshTokens<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub users: &'a U,
    pub auth: &'a A,
    pub refresh_ttl: Duration,
}

/// The identifying fields of an already verified refresh token.
#[derive(Debug, Clone)]
pub struct PresentedRefresh {
    pub jti: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

fn invalid() -> ServiceError {
    ServiceError::Unauthorized("Invalid refresh token".into())
}

impl<'a, U, A> RefreshTokens<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    /// Revokes the presented token and issues its successor in the same session.
    pub async fn execute(
        &self,
        tenant_id: Uuid,
        presented: &PresentedRefresh,
        now: DateTime<Utc>,
    ) -> ServiceResult<LoginOutcome> {
        let current = self
            .auth
            .find_session(tenant_id, presented.jti)
            .await?
            .ok_or_else(invalid)?;
        if current.user_id != presented.user_id
            || current.session_id != presented.session_id
            || !current.is_usable(now)
        {
            tracing::warn!(
                tenant_id = %tenant_id,
                jti = %presented.jti,
                revoked = current.is_revoked,
                "refresh_token_rejected"
            );
            return Err(invalid());
        }
        let user = self
            .users
            .find_by_id(tenant_id, current.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(invalid)?;
        let session = self
            .auth
            .rotate_session(
                tenant_id,
                current.id,
                &NewSession {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    session_id: current.session_id,
                    expires_at: now + self.refresh_ttl,
                    user_agent: presented.user_agent.clone(),
                    ip_address: presented.ip_address.clone(),
                },
            )
            .await?
            .ok_or_else(|| {
                tracing::warn!(tenant_id = %tenant_id, jti = %current.id, "refresh_token_raced");
                invalid()
            })?;
        Ok(LoginOutcome { user, session })
    }
}
