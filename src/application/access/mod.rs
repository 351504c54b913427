use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::domain::users::{Permission, StaffRole};

/// The authenticated staff member a request acts as.
/// The presentation layer builds it from a validated access token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub email: String,
    pub role: StaffRole,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == StaffRole::Admin
    }
}

/// Passes when the principal holds one of `roles`. Admin always passes.
pub fn require_roles(principal: &Principal, roles: &[StaffRole]) -> Result<(), ServiceError> {
    if principal.is_admin() || roles.contains(&principal.role) {
        Ok(())
    } else {
        Err(ServiceError::insufficient_permissions())
    }
}

pub fn require_permission(principal: &Principal, permission: Permission) -> Result<(), ServiceError> {
    if principal.role.has_permission(permission) {
        Ok(())
    } else {
        Err(ServiceError::insufficient_permissions())
    }
}

pub const CLINICAL_STAFF: &[StaffRole] = &[
    StaffRole::Dentist,
    StaffRole::Hygienist,
    StaffRole::Assistant,
    StaffRole::Receptionist,
];
pub const SCHEDULERS: &[StaffRole] = &[
    StaffRole::Dentist,
    StaffRole::Receptionist,
    StaffRole::Hygienist,
];
pub const DENTISTS: &[StaffRole] = &[StaffRole::Dentist];
pub const MANAGERS: &[StaffRole] = &[StaffRole::Manager];
pub const BILLING_STAFF: &[StaffRole] = &[StaffRole::Manager, StaffRole::Receptionist];
pub const CHART_WRITERS: &[StaffRole] = &[
    StaffRole::Dentist,
    StaffRole::Hygienist,
    StaffRole::Assistant,
];
pub const ADMIN_ONLY: &[StaffRole] = &[];
