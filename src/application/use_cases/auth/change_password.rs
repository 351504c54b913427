use crate::application::access::Principal;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::auth_repository::AuthRepository;
use crate::application::ports::user_repository::UserRepository;
use crate::application::services::{password_policy, passwords};

pub struct ChangePassword<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    pub users: &'a U,
    pub auth: &'a A,
}

impl<'a, U, A> ChangePassword<'a, U, A>
where
    U: UserRepository + ?Sized,
    A: AuthRepository + ?Sized,
{
    /// Replaces the password and signs out every other session of the user.
    pub async fn execute(
        &self,
        principal: &Principal,
        current_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let user = self
            .users
            .find_by_id(principal.tenant_id, principal.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        if !passwords::verify_password(current_password, &user.password_hash) {
            return Err(ServiceError::validation("Current password is incorrect"));
        }
        if current_password == new_password {
            return Err(ServiceError::validation(
                "New password must be different from the current password",
            ));
        }
        password_policy::validate(new_password).map_err(ServiceError::Validation)?;
        let hash = passwords::hash_password(new_password)?;
        self.users
            .set_password(principal.tenant_id, user.id, &hash)
            .await?;
        self.auth
            .revoke_all_sessions(principal.tenant_id, user.id, Some(principal.session_id))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::{MemoryStore, SEED_PASSWORD};
    use crate::domain::users::StaffRole;

    #[tokio::test]
    async fn wrong_current_password_is_a_validation_error() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let user = store.seed_user(tenant.id, "r@clinic.test", StaffRole::Receptionist);
        let principal = store.principal_for(&user);
        let uc = ChangePassword {
            users: &store,
            auth: &store,
        };
        let err = uc
            .execute(&principal, "Nope1234x", "Fresh9Enamel")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(m) if m == "Current password is incorrect"));
    }

    #[tokio::test]
    async fn change_revokes_other_sessions_only() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let user = store.seed_user(tenant.id, "r@clinic.test", StaffRole::Receptionist);
        let mine = store.seed_session(tenant.id, user.id);
        let other = store.seed_session(tenant.id, user.id);
        let mut principal = store.principal_for(&user);
        principal.session_id = mine.session_id;
        ChangePassword {
            users: &store,
            auth: &store,
        }
        .execute(&principal, SEED_PASSWORD, "Fresh9Enamel")
        .await
        .unwrap();
        assert!(store.session(mine.id).is_some_and(|s| !s.is_revoked));
        assert!(store.session(other.id).is_some_and(|s| s.is_revoked));
    }
}
