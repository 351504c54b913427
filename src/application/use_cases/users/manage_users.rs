use uuid::Uuid;

use crate::application::access::{MANAGERS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::user_repository::{UserPatch, UserQuery, UserRepository};
use crate::domain::users::User;

pub struct ListUsers<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> ListUsers<'a, R> {
    pub async fn execute(&self, principal: &Principal, query: &UserQuery) -> ServiceResult<Vec<User>> {
        require_roles(principal, MANAGERS)?;
        Ok(self.repo.list(principal.tenant_id, query).await?)
    }
}

pub struct GetUser<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> GetUser<'a, R> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<User> {
        if id != principal.user_id {
            require_roles(principal, MANAGERS)?;
        }
        self.repo
            .find_by_id(principal.tenant_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }
}

pub struct UpdateUser<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> UpdateUser<'a, R> {
    /// Managers edit anyone's profile, users edit their own, and only admins touch role or
    /// activation.
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: &UserPatch,
    ) -> ServiceResult<User> {
        if id != principal.user_id {
            require_roles(principal, MANAGERS)?;
        }
        if patch.touches_privileged_fields() && !principal.is_admin() {
            return Err(ServiceError::forbidden(
                "Only administrators can change roles or activation",
            ));
        }
        if id == principal.user_id && patch.is_active == Some(false) {
            return Err(ServiceError::validation("Cannot deactivate your own account"));
        }
        self.repo
            .update(principal.tenant_id, id, patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }
}

pub struct DeactivateUser<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> DeactivateUser<'a, R> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<User> {
        if !principal.is_admin() {
            return Err(ServiceError::insufficient_permissions());
        }
        if id == principal.user_id {
            return Err(ServiceError::validation("Cannot deactivate your own account"));
        }
        let patch = UserPatch {
            is_active: Some(false),
            ..UserPatch::default()
        };
        self.repo
            .update(principal.tenant_id, id, &patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }
}

pub struct AvailableDentists<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> AvailableDentists<'a, R> {
    pub async fn execute(&self, principal: &Principal) -> ServiceResult<Vec<User>> {
        Ok(self.repo.available_dentists(principal.tenant_id).await?)
    }
}
