pub mod tenant;
pub mod tier;

pub use tenant::{BillingCycle, DenialKind, LoginEligibility, PaymentStatus, Tenant, TenantStatus};
pub use tier::{TenantTier, TierFeatures, UNLIMITED, has_capacity};
