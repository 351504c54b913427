use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::auth_repository::AuthRepository;
use crate::application::ports::user_repository::UserRepository;
use crate::application::services::checksum::sha256_hex;
use crate::application::services::{password_policy, passwords};
use crate::domain::auth::PasswordResetToken;

pub const RESET_TOKEN_TTL_HOURS: i64 = 24;
pub const INVALID_TOKEN: &str = "Invalid or expired reset token";

fn hash_token(raw: &str) -> String {
    sha256_hex(raw.as_bytes())
}

fn new_raw_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub struct RequestPasswordReset<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub users: &'a U,
    pub auth: &'a A,
}

impl<'a, U, A> RequestPasswordReset<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    /// Returns the raw token when the address belongs to an active user. Callers answer the
    /// same way either way.
    pub async fn execute(
        &self,
        tenant_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<String>> {
        let email = email.trim().to_lowercase();
        let Some(user) = self
            .users
            .find_by_email(tenant_id, &email)
            .await?
            .filter(|u| u.is_active)
        else {
            return Ok(None);
        };
        let raw = new_raw_token();
        self.auth
            .create_reset_token(
                tenant_id,
                user.id,
                &hash_token(&raw),
                now + Duration::hours(RESET_TOKEN_TTL_HOURS),
            )
            .await?;
        Ok(Some(raw))
    }
}

async fn usable_token<A: AuthRepository + ?Sized>(
    auth: &A,
    tenant_id: Uuid,
    raw: &str,
    now: DateTime<Utc>,
) -> ServiceResult<PasswordResetToken> {
    auth.find_reset_token(tenant_id, &hash_token(raw.trim()))
        .await?
        .filter(|t| t.is_valid(now))
        .ok_or_else(|| ServiceError::validation(INVALID_TOKEN))
}

pub struct VerifyResetToken<'a, A: AuthRepository + ?Sized> {
    pub auth: &'a A,
}

impl<'a, A: AuthRepository + ?Sized> VerifyResetToken<'a, A> {
    pub async fn execute(&self, tenant_id: Uuid, raw: &str, now: DateTime<Utc>) -> ServiceResult<()> {
        usable_token(self.auth, tenant_id, raw, now).await.map(|_| ())
    }
}

pub struct CompletePasswordReset<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub users: &'a U,
    pub auth: &'a A,
}

impl<'a, U, A> CompletePasswordReset<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub async fn execute(
        &self,
        tenant_id: Uuid,
        raw: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let token = usable_token(self.auth, tenant_id, raw, now).await?;
        password_policy::validate(new_password).map_err(ServiceError::Validation)?;
        let hash = passwords::hash_password(new_password)?;
        if !self.users.set_password(tenant_id, token.user_id, &hash).await? {
            return Err(ServiceError::validation(INVALID_TOKEN));
        }
        self.auth.mark_reset_token_used(tenant_id, token.id, now).await?;
        self.auth
            .revoke_all_sessions(tenant_id, token.user_id, None)
            .await?;
        tracing::info!(tenant_id = %tenant_id, user_id = %token.user_id, "password_reset_completed");
        Ok(())
    }
}
