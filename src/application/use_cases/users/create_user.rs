use chrono::NaiveDate;

use crate::application::access::{MANAGERS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::user_repository::{NewUser, UserRepository};
use crate::application::services::validation::{normalize_email, required};
use crate::application::services::{password_policy, passwords};
use crate::domain::tenants::{Tenant, has_capacity};
use crate::domain::users::{Gender, StaffRole, User};

#[derive(Debug, Clone)]
pub struct StaffRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub contact_number: String,
    pub role: StaffRole,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub employee_id: Option<String>,
    pub work_schedule: Option<serde_json::Value>,
}

impl StaffRegistration {
    /// Validates the registration and hashes its password.
    pub fn into_new_user(self) -> ServiceResult<NewUser> {
        required("First name", &self.first_name)?;
        required("Last name", &self.last_name)?;
        required("Contact number", &self.contact_number)?;
        let email = normalize_email(&self.email)?;
        password_policy::validate(&self.password).map_err(ServiceError::Validation)?;
        let password_hash = passwords::hash_password(&self.password)?;
        Ok(NewUser {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email,
            password_hash,
            contact_number: self.contact_number.trim().to_string(),
            role: self.role,
            gender: self.gender,
            date_of_birth: self.date_of_birth,
            specialization: self.specialization,
            license_number: self.license_number,
            employee_id: self.employee_id,
            work_schedule: self
                .work_schedule
                .unwrap_or_else(|| serde_json::json!({})),
        })
    }
}

pub struct CreateUser<'a, R: UserRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: UserRepository + ?Sized> CreateUser<'a, R> {
    /// Staff creation by an administrator or manager. Only admins may create admins.
    pub async fn execute(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        req: &StaffRegistration,
    ) -> ServiceResult<User> {
        require_roles(principal, MANAGERS)?;
        if req.role == StaffRole::Admin && !principal.is_admin() {
            return Err(ServiceError::insufficient_permissions());
        }
        self.register(tenant, req).await
    }

    /// Seat check, e-mail uniqueness and insertion shared by every way a user is created.
    pub async fn register(&self, tenant: &Tenant, req: &StaffRegistration) -> ServiceResult<User> {
        let active = self.repo.count_active(tenant.id).await?;
        if !has_capacity(active, tenant.max_users) {
            return Err(ServiceError::forbidden("User limit reached for current plan"));
        }
        let new_user = req.clone().into_new_user()?;
        if self
            .repo
            .find_by_email(tenant.id, &new_user.email)
            .await?
            .is_some()
        {
            return Err(ServiceError::conflict("Email already registered"));
        }
        let user = self.repo.create(tenant.id, &new_user).await?;
        tracing::info!(tenant_id = %tenant.id, user_id = %user.id, role = %user.role, "user_created");
        Ok(user)
    }
}
