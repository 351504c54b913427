use uuid::Uuid;

use crate::application::access::Principal;
use crate::application::error::ServiceResult;
use crate::application::ports::auth_repository::AuthRepository;

pub struct Logout<'a, A: AuthRepository + ?Sized> {
    pub auth: &'a A,
}

impl<'a, A: AuthRepository + ?Sized> Logout<'a, A> {
    /// Ends the caller's session, plus the session of `refresh_session_id` when it belongs to
    /// the same user.
    pub async fn execute(
        &self,
        principal: &Principal,
        refresh_session_id: Option<Uuid>,
    ) -> ServiceResult<()> {
        self.auth
            .revoke_session(principal.tenant_id, principal.user_id, principal.session_id)
            .await?;
        if let Some(other) = refresh_session_id.filter(|s| *s != principal.session_id) {
            self.auth
                .revoke_session(principal.tenant_id, principal.user_id, other)
                .await?;
        }
        Ok(())
    }
}

pub struct LogoutAll<'a, A: AuthRepository + ?Sized> {
    pub auth: &'a A,
}

impl<'a, A: AuthRepository + ?Sized> LogoutAll<'a, A> {
    pub async fn execute(&self, principal: &Principal) -> ServiceResult<u64> {
        let revoked = self
            .auth
            .revoke_all_sessions(principal.tenant_id, principal.user_id, None)
            .await?;
        tracing::info!(user_id = %principal.user_id, revoked, "logout_all");
        Ok(revoked)
    }
}
