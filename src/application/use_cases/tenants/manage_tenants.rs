use uuid::Uuid;

use crate::application::access::{ADMIN_ONLY, MANAGERS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::Page;
use crate::application::ports::tenant_repository::{TenantPatch, TenantRepository};
use crate::application::services::validation::normalize_email;
use crate::domain::tenants::{Tenant, TenantStatus};

fn own_tenant(principal: &Principal, id: Uuid) -> ServiceResult<()> {
    if principal.tenant_id == id {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Access denied to this tenant"))
    }
}

pub(crate) async fn load<R: TenantRepository + ?Sized>(repo: &R, id: Uuid) -> ServiceResult<Tenant> {
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Tenant"))
}

pub struct ListTenants<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> ListTenants<'a, R> {
    pub async fn execute(&self, principal: &Principal, page: Page) -> ServiceResult<Vec<Tenant>> {
        require_roles(principal, ADMIN_ONLY)?;
        Ok(self.repo.list(page).await?)
    }
}

pub struct ListPublicTenants<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> ListPublicTenants<'a, R> {
    pub async fn execute(&self) -> ServiceResult<Vec<Tenant>> {
        Ok(self.repo.list_active().await?)
    }
}

pub struct GetTenant<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> GetTenant<'a, R> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<Tenant> {
        own_tenant(principal, id)?;
        load(self.repo, id).await
    }
}

pub struct UpdateTenant<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> UpdateTenant<'a, R> {
    /// A tier change re-applies that tier's limits and feature flags.
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: &TenantPatch,
    ) -> ServiceResult<Tenant> {
        require_roles(principal, MANAGERS)?;
        own_tenant(principal, id)?;
        let current = load(self.repo, id).await?;
        let mut patch = patch.clone();
        if let Some(name) = patch.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::validation("Name is required"));
            }
            if self.repo.name_or_slug_taken(name, "", Some(id)).await? {
                return Err(ServiceError::conflict("Tenant with this name already exists"));
            }
            patch.name = Some(name.to_string());
        }
        if let Some(email) = patch.contact_email.as_deref() {
            patch.contact_email = Some(normalize_email(email)?);
        }
        if let Some(tier) = patch.tier.filter(|t| *t != current.tier) {
            let f = tier.features();
            patch.max_users = Some(f.max_users);
            patch.max_patients = Some(f.max_patients);
            patch.max_storage_gb = Some(f.max_storage_gb);
            patch.max_api_calls_per_month = Some(f.max_api_calls_per_month);
            patch.enabled_features = Some(tier.enabled_features());
            tracing::info!(tenant_id = %id, from = %current.tier, to = %tier, "tenant_tier_changed");
        }
        self.repo
            .update(id, &patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tenant"))
    }
}

pub struct DeactivateTenant<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> DeactivateTenant<'a, R> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<()> {
        require_roles(principal, ADMIN_ONLY)?;
        own_tenant(principal, id)?;
        if !self.repo.set_status(id, TenantStatus::Deactivated).await? {
            return Err(ServiceError::not_found("Tenant"));
        }
        tracing::warn!(tenant_id = %id, by = %principal.user_id, "tenant_deactivated");
        Ok(())
    }
}
