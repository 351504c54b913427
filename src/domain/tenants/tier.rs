text_enum!(TenantTier {
    Trial => "trial",
    Basic => "basic",
    Professional => "professional",
    Enterprise => "enterprise",
});

/// Limits and feature set attached to a subscription tier. `-1` means unlimited.
#[derive(Debug, Clone, PartialEq)]
pub struct TierFeatures {
    pub max_users: i32,
    pub max_patients: i32,
    pub max_storage_gb: i32,
    pub max_api_calls_per_month: i32,
    pub features: Vec<&'static str>,
    pub support_level: &'static str,
    pub trial_days: Option<i64>,
    pub price: i32,
}

pub const UNLIMITED: i32 = -1;

impl TenantTier {
    pub fn features(&self) -> TierFeatures {
        match self {
            TenantTier::Trial => TierFeatures {
                max_users: 5,
                max_patients: 100,
                max_storage_gb: 1,
                max_api_calls_per_month: 1000,
                features: vec!["basic_appointments", "patient_management", "email_support"],
                support_level: "email_only",
                trial_days: Some(30),
                price: 0,
            },
            TenantTier::Basic => TierFeatures {
                max_users: 10,
                max_patients: 1000,
                max_storage_gb: 10,
                max_api_calls_per_month: 10000,
                features: vec![
                    "basic_appointments",
                    "patient_management",
                    "basic_reporting",
                    "email_reminders",
                    "business_hours_support",
                ],
                support_level: "business_hours",
                trial_days: None,
                price: 99,
            },
            TenantTier::Professional => TierFeatures {
                max_users: 25,
                max_patients: 5000,
                max_storage_gb: 50,
                max_api_calls_per_month: 50000,
                features: vec![
                    "advanced_appointments",
                    "patient_management",
                    "advanced_reporting",
                    "api_access",
                    "custom_forms",
                    "priority_support",
                    "sms_reminders",
                ],
                support_level: "priority",
                trial_days: None,
                price: 299,
            },
            TenantTier::Enterprise => TierFeatures {
                max_users: 100,
                max_patients: UNLIMITED,
                max_storage_gb: 100,
                max_api_calls_per_month: 200000,
                features: vec![
                    "all_features",
                    "custom_integrations",
                    "dedicated_support",
                    "white_labeling",
                    "advanced_analytics",
                    "custom_workflows",
                    "sla_guarantee",
                ],
                support_level: "dedicated",
                trial_days: None,
                price: 799,
            },
        }
    }

    /// Feature flags stored on the tenant row when the tier is applied.
    pub fn enabled_features(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .features()
            .features
            .into_iter()
            .map(|f| (f.to_string(), serde_json::Value::Bool(true)))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// True while `current` is still below `max`; an unlimited max always has room.
pub fn has_capacity(current: i64, max: i32) -> bool {
    max == UNLIMITED || current < i64::from(max)
}
