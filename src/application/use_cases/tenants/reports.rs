use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::Principal;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::tenant_repository::{TenantRepository, TenantStats};
use crate::application::use_cases::tenants::manage_tenants::load;
use crate::domain::tenants::{LoginEligibility, PaymentStatus, Tenant, TenantStatus, has_capacity};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    pub tenant_id: Uuid,
    pub users: i64,
    pub max_users: i32,
    pub patients: i64,
    pub max_patients: i32,
    pub storage_gb: f64,
    pub max_storage_gb: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenantHealth {
    pub tenant_id: Uuid,
    pub status: TenantStatus,
    pub payment_status: PaymentStatus,
    pub login_allowed: bool,
    pub login_message: Option<&'static str>,
    pub trial_days_remaining: i64,
    pub user_limit_reached: bool,
    pub patient_limit_reached: bool,
    pub usage: UsageReport,
}

fn same_tenant(principal: &Principal, id: Uuid) -> ServiceResult<()> {
    if principal.tenant_id == id {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Access denied to this tenant"))
    }
}

async fn usage_of<R: TenantRepository + ?Sized>(repo: &R, tenant: &Tenant) -> ServiceResult<UsageReport> {
    let usage = repo.usage(tenant.id).await?;
    Ok(UsageReport {
        tenant_id: tenant.id,
        users: usage.active_users,
        max_users: tenant.max_users,
        patients: usage.patients,
        max_patients: tenant.max_patients,
        storage_gb: usage.storage_bytes as f64 / BYTES_PER_GB,
        max_storage_gb: tenant.max_storage_gb,
    })
}

pub struct GetTenantStats<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> GetTenantStats<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<TenantStats> {
        same_tenant(principal, id)?;
        load(self.repo, id).await?;
        Ok(self.repo.stats(id, now).await?)
    }
}

pub struct GetTenantUsage<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> GetTenantUsage<'a, R> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<UsageReport> {
        same_tenant(principal, id)?;
        let tenant = load(self.repo, id).await?;
        usage_of(self.repo, &tenant).await
    }
}

pub struct CheckTenantHealth<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> CheckTenantHealth<'a, R> {
    pub async fn execute(&self, tenant: &Tenant, now: DateTime<Utc>) -> ServiceResult<TenantHealth> {
        let usage = usage_of(self.repo, tenant).await?;
        let (login_allowed, login_message) = match tenant.login_eligibility(now) {
            LoginEligibility::Allowed => (true, None),
            LoginEligibility::Denied { message, .. } => (false, Some(message)),
        };
        Ok(TenantHealth {
            tenant_id: tenant.id,
            status: tenant.status,
            payment_status: tenant.payment_status,
            login_allowed,
            login_message,
            trial_days_remaining: tenant.trial_days_remaining(now),
            user_limit_reached: !has_capacity(usage.users, tenant.max_users),
            patient_limit_reached: !has_capacity(usage.patients, tenant.max_patients),
            usage,
        })
    }
}
