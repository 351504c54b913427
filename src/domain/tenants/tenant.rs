use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::tier::TenantTier;

text_enum!(PaymentStatus {
    Active => "active",
    Suspended => "suspended",
    Trial => "trial",
    Cancelled => "cancelled",
    Pending => "pending",
    GracePeriod => "grace_period",
});

text_enum!(TenantStatus {
    Active => "active",
    Suspended => "suspended",
    Deactivated => "deactivated",
});

text_enum!(BillingCycle {
    Monthly => "monthly",
    Quarterly => "quarterly",
    Annually => "annually",
});

#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub tier: TenantTier,
    pub payment_status: PaymentStatus,
    pub status: TenantStatus,
    pub billing_cycle: BillingCycle,
    pub subscription_id: Option<String>,
    pub max_users: i32,
    pub max_patients: i32,
    pub max_storage_gb: i32,
    pub max_api_calls_per_month: i32,
    pub enabled_features: serde_json::Value,
    pub settings: serde_json::Value,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub activation_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a tenant currently refuses logins. The HTTP layer picks the status code from the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    Gone,
    Forbidden,
    PaymentRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginEligibility {
    Allowed,
    Denied {
        kind: DenialKind,
        message: &'static str,
    },
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    pub fn trial_days_remaining(&self, now: DateTime<Utc>) -> i64 {
        match (self.payment_status, self.trial_ends_at) {
            (PaymentStatus::Trial, Some(ends)) => (ends - now).num_days().max(0),
            _ => 0,
        }
    }

    pub fn login_eligibility(&self, now: DateTime<Utc>) -> LoginEligibility {
        if !self.is_active() {
            return LoginEligibility::Denied {
                kind: DenialKind::Forbidden,
                message: "Tenant is not active",
            };
        }
        match self.payment_status {
            PaymentStatus::Cancelled => LoginEligibility::Denied {
                kind: DenialKind::Gone,
                message: "This clinic account has been cancelled. Please contact support.",
            },
            PaymentStatus::Suspended => LoginEligibility::Denied {
                kind: DenialKind::Forbidden,
                message: "This clinic account has been suspended. Please contact support.",
            },
            PaymentStatus::Trial if self.trial_ends_at.is_some_and(|t| t < now) => {
                LoginEligibility::Denied {
                    kind: DenialKind::PaymentRequired,
                    message: "Your trial period has ended. Please upgrade to continue using our services.",
                }
            }
            PaymentStatus::GracePeriod if self.grace_period_ends_at.is_some_and(|t| t < now) => {
                LoginEligibility::Denied {
                    kind: DenialKind::PaymentRequired,
                    message: "Grace period has expired. Please update your payment method to continue.",
                }
            }
            _ => LoginEligibility::Allowed,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_tenant() -> Tenant {
        let now = Utc::now();
        let features = TenantTier::Trial.features();
        Tenant {
            id: Uuid::new_v4(),
            name: "Bright Smiles".into(),
            slug: "bright-smiles".into(),
            contact_email: "office@brightsmiles.test".into(),
            contact_phone: None,
            address: None,
            tier: TenantTier::Trial,
            payment_status: PaymentStatus::Trial,
            status: TenantStatus::Active,
            billing_cycle: BillingCycle::Monthly,
            subscription_id: None,
            max_users: features.max_users,
            max_patients: features.max_patients,
            max_storage_gb: features.max_storage_gb,
            max_api_calls_per_month: features.max_api_calls_per_month,
            enabled_features: TenantTier::Trial.enabled_features(),
            settings: serde_json::json!({}),
            trial_ends_at: Some(now + Duration::days(30)),
            subscription_ends_at: None,
            grace_period_ends_at: None,
            activation_date: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn running_trial_can_log_in() {
        let t = sample_tenant();
        assert_eq!(t.login_eligibility(Utc::now()), LoginEligibility::Allowed);
        assert!(t.trial_days_remaining(Utc::now()) >= 29);
    }

    #[test]
    fn expired_trial_requires_payment() {
        let mut t = sample_tenant();
        t.trial_ends_at = Some(Utc::now() - Duration::days(1));
        match t.login_eligibility(Utc::now()) {
            LoginEligibility::Denied { kind, .. } => assert_eq!(kind, DenialKind::PaymentRequired),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(t.trial_days_remaining(Utc::now()), 0);
    }

    #[test]
    fn cancelled_and_suspended_are_refused() {
        let mut t = sample_tenant();
        t.payment_status = PaymentStatus::Cancelled;
        assert!(matches!(
            t.login_eligibility(Utc::now()),
            LoginEligibility::Denied { kind: DenialKind::Gone, .. }
        ));
        t.payment_status = PaymentStatus::Suspended;
        assert!(matches!(
            t.login_eligibility(Utc::now()),
            LoginEligibility::Denied { kind: DenialKind::Forbidden, .. }
        ));
    }

    #[test]
    fn grace_period_expiry() {
        let mut t = sample_tenant();
        t.payment_status = PaymentStatus::GracePeriod;
        t.grace_period_ends_at = Some(Utc::now() + Duration::days(3));
        assert_eq!(t.login_eligibility(Utc::now()), LoginEligibility::Allowed);
        t.grace_period_ends_at = Some(Utc::now() - Duration::hours(1));
        assert!(matches!(
            t.login_eligibility(Utc::now()),
            LoginEligibility::Denied { kind: DenialKind::PaymentRequired, .. }
        ));
    }

    #[test]
    fn pending_and_active_payment_allowed() {
        let mut t = sample_tenant();
        t.payment_status = PaymentStatus::Pending;
        assert_eq!(t.login_eligibility(Utc::now()), LoginEligibility::Allowed);
        t.payment_status = PaymentStatus::Active;
        assert_eq!(t.login_eligibility(Utc::now()), LoginEligibility::Allowed);
    }

    #[test]
    fn deactivated_tenant_is_refused_first() {
        let mut t = sample_tenant();
        t.status = TenantStatus::Deactivated;
        t.payment_status = PaymentStatus::Active;
        assert_eq!(
            t.login_eligibility(Utc::now()),
            LoginEligibility::Denied {
                kind: DenialKind::Forbidden,
                message: "Tenant is not active"
            }
        );
    }
}
