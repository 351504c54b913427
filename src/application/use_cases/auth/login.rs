use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::auth_repository::{AuthRepository, NewLoginAttempt, NewSession};
use crate::application::ports::user_repository::UserRepository;
use crate::application::services::passwords::verify_password;
use crate::domain::auth::{RefreshSession, is_locked_out, lockout_window_start};
use crate::domain::tenants::{LoginEligibility, Tenant};
use crate::domain::users::User;

pub const LOCKED_MESSAGE: &str =
    "Account temporarily locked due to too many failed login attempts. Try again in 30 minutes.";
pub const BAD_CREDENTIALS: &str = "Incorrect email or password";

pub struct Login<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub users: &'a U,
    pub auth: &'a A,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: RefreshSession,
}

impl<'a, U, A> Login<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub async fn execute(
        &self,
        tenant: &Tenant,
        req: &LoginRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<LoginOutcome> {
        if let LoginEligibility::Denied { kind, message } = tenant.login_eligibility(now) {
            return Err(ServiceError::from_denial(kind, message));
        }

        let email = req.email.trim().to_lowercase();
        let failures = self
            .auth
            .count_failures_since(tenant.id, &email, lockout_window_start(now))
            .await?;
        if is_locked_out(failures) {
            tracing::warn!(tenant_id = %tenant.id, email = %email, "login_locked_out");
            return Err(ServiceError::Locked(LOCKED_MESSAGE.into()));
        }

        let user = match self.users.find_by_email(tenant.id, &email).await? {
            Some(u) if verify_password(&req.password, &u.password_hash) => u,
            found => {
                let reason = if found.is_some() {
                    "invalid_password"
                } else {
                    "unknown_email"
                };
                self.record(tenant.id, &email, req, false, Some(reason)).await?;
                return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()));
            }
        };
        if !user.is_active {
            self.record(tenant.id, &email, req, false, Some("inactive_user"))
                .await?;
            return Err(ServiceError::forbidden("Inactive user"));
        }

        self.record(tenant.id, &email, req, true, None).await?;
        let session = self
            .auth
            .create_session(
                tenant.id,
                &NewSession {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    session_id: Uuid::new_v4(),
                    expires_at: now + self.refresh_ttl,
                    user_agent: req.user_agent.clone(),
                    ip_address: req.ip_address.clone(),
                },
            )
            .await?;
        self.users.touch_last_login(tenant.id, user.id, now).await?;
        tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "login_succeeded");
        Ok(LoginOutcome { user, session })
    }

    async fn record(
        &self,
        tenant_id: Uuid,
        email: &str,
        req: &LoginRequest,
        success: bool,
        failure_reason: Option<&'static str>,
    ) -> ServiceResult<()> {
        self.auth
            .record_attempt(
                tenant_id,
                &NewLoginAttempt {
                    email: email.to_string(),
                    ip_address: req.ip_address.clone(),
                    user_agent: req.user_agent.clone(),
                    success,
                    failure_reason,
                },
            )
            .await?;
        Ok(())
    }
}
