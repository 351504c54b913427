use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::user_repository::UserRepository;
use crate::application::use_cases::users::create_user::{CreateUser, StaffRegistration};
use crate::domain::tenants::Tenant;
use crate::domain::users::{StaffRole, User};

/// Self-service sign-up of a staff member into an existing clinic.
pub struct Register<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> Register<'a, R> {
    pub async fn execute(&self, tenant: &Tenant, req: &StaffRegistration) -> ServiceResult<User> {
        if matches!(req.role, StaffRole::Admin | StaffRole::Manager) {
            return Err(ServiceError::forbidden(
                "This role cannot be self-assigned during registration",
            ));
        }
        CreateUser { repo: self.repo }.register(tenant, req).await
    }
}
