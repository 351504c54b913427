use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{ADMIN_ONLY, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::auth_repository::AuthRepository;
use crate::application::ports::user_repository::UserRepository;
use crate::domain::auth::RefreshSession;

pub struct ListSessions<'a, A: AuthRepository + ?Sized> {
    pub auth: &'a A,
}

impl<'a, A: AuthRepository + ?Sized> ListSessions<'a, A> {
    pub async fn execute(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<RefreshSession>> {
        Ok(self
            .auth
            .list_active_sessions(principal.tenant_id, principal.user_id, now)
            .await?)
    }
}

pub struct RevokeSession<'a, A: AuthRepository + ?Sized> {
    pub auth: &'a A,
}

impl<'a, A: AuthRepository + ?Sized> RevokeSession<'a, A> {
    pub async fn execute(&self, principal: &Principal, session_id: Uuid) -> ServiceResult<()> {
        if session_id == principal.session_id {
            return Err(ServiceError::validation(
                "Cannot revoke the current session; use logout instead",
            ));
        }
        let revoked = self
            .auth
            .revoke_session(principal.tenant_id, principal.user_id, session_id)
            .await?;
        if revoked == 0 {
            return Err(ServiceError::not_found("Session"));
        }
        Ok(())
    }
}

pub struct RevokeOtherSessions<'a, A: AuthRepository + ?Sized> {
    pub auth: &'a A,
}

impl<'a, A: AuthRepository + ?Sized> RevokeOtherSessions<'a, A> {
    pub async fn execute(&self, principal: &Principal) -> ServiceResult<u64> {
        Ok(self
            .auth
            .revoke_all_sessions(
                principal.tenant_id,
                principal.user_id,
                Some(principal.session_id),
            )
            .await?)
    }
}

pub struct ListUserSessions<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub users: &'a U,
    pub auth: &'a A,
}

impl<'a, U, A> ListUserSessions<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<RefreshSession>> {
        require_roles(principal, ADMIN_ONLY)?;
        self.users
            .find_by_id(principal.tenant_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        Ok(self
            .auth
            .list_active_sessions(principal.tenant_id, user_id, now)
            .await?)
    }
}

pub struct ForceLogout<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub users: &'a U,
    pub auth: &'a A,
}

impl<'a, U, A> ForceLogout<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub async fn execute(&self, principal: &Principal, user_id: Uuid) -> ServiceResult<u64> {
        require_roles(principal, ADMIN_ONLY)?;
        self.users
            .find_by_id(principal.tenant_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        let revoked = self
            .auth
            .revoke_all_sessions(principal.tenant_id, user_id, None)
            .await?;
        tracing::info!(
            tenant_id = %principal.tenant_id,
            admin_id = %principal.user_id,
            user_id = %user_id,
            revoked,
            "force_logout"
        );
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::domain::users::StaffRole;

    #[tokio::test]
    async fn current_session_cannot_be_revoked_directly() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let user = store.seed_user(tenant.id, "h@clinic.test", StaffRole::Hygienist);
        let principal = store.principal_for(&user);
        let err = RevokeSession { auth: &store }
            .execute(&principal, principal.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn revoking_an_unknown_session_is_not_found() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let user = store.seed_user(tenant.id, "h@clinic.test", StaffRole::Hygienist);
        let err = RevokeSession { auth: &store }
            .execute(&store.principal_for(&user), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn force_logout_needs_admin_and_a_known_user() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let admin = store.seed_user(tenant.id, "admin@clinic.test", StaffRole::Admin);
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let s = store.seed_session(tenant.id, dentist.id);
        let uc = ForceLogout {
            users: &store,
            auth: &store,
        };

        let denied = uc
            .execute(&store.principal_for(&dentist), admin.id)
            .await
            .unwrap_err();
        assert!(matches!(denied, ServiceError::Forbidden(_)));

        let missing = uc
            .execute(&store.principal_for(&admin), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));

        let revoked = uc
            .execute(&store.principal_for(&admin), dentist.id)
            .await
            .unwrap();
        assert_eq!(revoked, 1);
        assert!(store.session(s.id).is_some_and(|s| s.is_revoked));
    }
}
