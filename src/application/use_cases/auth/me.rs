use crate::application::access::Principal;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::user_repository::UserRepository;
use crate::domain::users::User;

pub struct GetMe<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> GetMe<'a, R> {
    pub async fn execute(&self, principal: &Principal) -> ServiceResult<User> {
        self.repo
            .find_by_id(principal.tenant_id, principal.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }
}
