use chrono::{DateTime, Duration, Utc};

use crate::application::access::{MANAGERS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::tenant_repository::{NewTenant, TenantRepository};
use crate::application::services::validation::{normalize_email, normalize_slug, required};
use crate::application::use_cases::users::create_user::StaffRegistration;
use crate::domain::tenants::{BillingCycle, PaymentStatus, Tenant, TenantTier};
use crate::domain::users::{StaffRole, User};

#[derive(Debug, Clone)]
pub struct TenantDetails {
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub tier: TenantTier,
    pub billing_cycle: BillingCycle,
}

const TAKEN: &str = "Tenant with this name or slug already exists";

/// Builds the row for a new clinic on `details.tier`, with limits and feature flags taken from
/// the tier. Trials start now and run for the tier's trial length.
fn new_tenant(details: &TenantDetails, now: DateTime<Utc>) -> ServiceResult<NewTenant> {
    required("Name", &details.name)?;
    let slug = normalize_slug(&details.slug)?;
    let contact_email = normalize_email(&details.contact_email)?;
    let features = details.tier.features();
    let (payment_status, trial_ends_at) = match features.trial_days {
        Some(days) => (PaymentStatus::Trial, Some(now + Duration::days(days))),
        None => (PaymentStatus::Pending, None),
    };
    Ok(NewTenant {
        name: details.name.trim().to_string(),
        slug,
        contact_email,
        contact_phone: details.contact_phone.clone(),
        address: details.address.clone(),
        tier: details.tier,
        payment_status,
        billing_cycle: details.billing_cycle,
        max_users: features.max_users,
        max_patients: features.max_patients,
        max_storage_gb: features.max_storage_gb,
        max_api_calls_per_month: features.max_api_calls_per_month,
        enabled_features: details.tier.enabled_features(),
        trial_ends_at,
    })
}

/// Public sign-up: a trial clinic plus its first administrator.
pub struct RegisterTenant<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> RegisterTenant<'a, R> {
    pub async fn execute(
        &self,
        details: &TenantDetails,
        admin: &StaffRegistration,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Tenant, User)> {
        let details = TenantDetails {
            tier: TenantTier::Trial,
            ..details.clone()
        };
        let tenant = new_tenant(&details, now)?;
        let admin = StaffRegistration {
            role: StaffRole::Admin,
            ..admin.clone()
        }
        .into_new_user()?;
        if self
            .repo
            .name_or_slug_taken(&tenant.name, &tenant.slug, None)
            .await?
        {
            return Err(ServiceError::conflict(TAKEN));
        }
        let (tenant, user) = self.repo.create_with_admin(&tenant, &admin).await?;
        tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, admin_id = %user.id, "tenant_registered");
        Ok((tenant, user))
    }
}

pub struct CreateTenant<'a, R: TenantRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TenantRepository + ?Sized> CreateTenant<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        details: &TenantDetails,
        now: DateTime<Utc>,
    ) -> ServiceResult<Tenant> {
        require_roles(principal, MANAGERS)?;
        let tenant = new_tenant(details, now)?;
        if self
            .repo
            .name_or_slug_taken(&tenant.name, &tenant.slug, None)
            .await?
        {
            return Err(ServiceError::conflict(TAKEN));
        }
        let tenant = self.repo.create(&tenant).await?;
        tracing::info!(tenant_id = %tenant.id, created_by = %principal.user_id, "tenant_created");
        Ok(tenant)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::application::use_cases::users::create_user::tests::registration;

    pub(crate) fn details(name: &str, slug: &str) -> TenantDetails {
        TenantDetails {
            name: name.into(),
            slug: slug.into(),
            contact_email: "front@clinic.test".into(),
            contact_phone: None,
            address: None,
            tier: TenantTier::Enterprise,
            billing_cycle: BillingCycle::Monthly,
        }
    }

    #[tokio::test]
    async fn registration_starts_a_trial_with_an_admin() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let (tenant, admin) = RegisterTenant { repo: &store }
            .execute(
                &details("Pearl Dental", "Pearl-Dental"),
                &registration("owner@pearl.test"),
                now,
            )
            .await
            .unwrap();
        assert_eq!(tenant.slug, "pearl-dental");
        assert_eq!(tenant.tier, TenantTier::Trial);
        assert_eq!(tenant.payment_status, PaymentStatus::Trial);
        assert_eq!(tenant.max_users, 5);
        assert_eq!(tenant.trial_ends_at, Some(now + Duration::days(30)));
        assert_eq!(admin.role, StaffRole::Admin);
        assert_eq!(admin.tenant_id, tenant.id);
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts() {
        let store = MemoryStore::default();
        let uc = RegisterTenant { repo: &store };
        uc.execute(&details("One", "same-slug"), &registration("a@x.test"), Utc::now())
            .await
            .unwrap();
        let err = uc
            .execute(&details("Two", "same-slug"), &registration("b@x.test"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn created_paid_tier_is_pending_with_tier_limits() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let admin = store.seed_user(tenant.id, "admin@clinic.test", StaffRole::Admin);
        let created = CreateTenant { repo: &store }
            .execute(&store.principal_for(&admin), &details("Big Chain", "big-chain"), Utc::now())
            .await
            .unwrap();
        assert_eq!(created.payment_status, PaymentStatus::Pending);
        assert_eq!(created.max_patients, -1);
        assert!(created.trial_ends_at.is_none());
        assert_eq!(created.enabled_features["white_labeling"], serde_json::json!(true));
    }
}
