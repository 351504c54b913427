use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub const DEFAULT_VALIDITY_DAYS: i64 = 30;
pub const EXPIRY_WARNING_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct Prescription {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub treatment_id: Option<Uuid>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    pub quantity: Option<String>,
    pub refills: i32,
    pub is_dispensed: bool,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub fn default_expiry(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(DEFAULT_VALIDITY_DAYS)
}

impl Prescription {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_dispensed && !self.is_expired(now)
    }

    pub fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.expires_at <= now + Duration::days(EXPIRY_WARNING_DAYS)
    }

    pub fn dispense(&mut self, now: DateTime<Utc>) -> Result<(), &'static str> {
        if self.is_dispensed {
            return Err("Prescription already dispensed");
        }
        if self.is_expired(now) {
            return Err("Prescription has expired");
        }
        self.is_dispensed = true;
        self.dispensed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpiryReport {
    pub expired: Vec<Prescription>,
    pub expiring_soon: Vec<Prescription>,
}

/// Splits undispensed prescriptions into already expired and expiring within the warning window.
pub fn expiry_report(prescriptions: Vec<Prescription>, now: DateTime<Utc>) -> ExpiryReport {
    let mut report = ExpiryReport::default();
    for p in prescriptions.into_iter().filter(|p| !p.is_dispensed) {
        if p.is_expired(now) {
            report.expired.push(p);
        } else if p.expires_soon(now) {
            report.expiring_soon.push(p);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rx(expires_in_days: i64, dispensed: bool) -> Prescription {
        let now = Utc::now();
        Prescription {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            dentist_id: Uuid::new_v4(),
            treatment_id: None,
            medication_name: "Amoxicillin".into(),
            dosage: "500mg".into(),
            frequency: "3x daily".into(),
            duration: "7 days".into(),
            instructions: None,
            quantity: Some("21".into()),
            refills: 0,
            is_dispensed: dispensed,
            dispensed_at: None,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::days(expires_in_days),
        }
    }

    #[test]
    fn default_validity_is_thirty_days() {
        let now = Utc::now();
        assert_eq!(default_expiry(now) - now, Duration::days(30));
    }

    #[test]
    fn active_means_not_dispensed_and_not_expired() {
        let now = Utc::now();
        assert!(rx(5, false).is_active(now));
        assert!(!rx(5, true).is_active(now));
        assert!(!rx(-1, false).is_active(now));
    }

    #[test]
    fn dispense_twice_fails() {
        let mut p = rx(10, false);
        let now = Utc::now();
        assert!(p.dispense(now).is_ok());
        assert_eq!(p.dispense(now), Err("Prescription already dispensed"));
    }

    #[test]
    fn expired_cannot_be_dispensed() {
        let mut p = rx(-2, false);
        assert_eq!(p.dispense(Utc::now()), Err("Prescription has expired"));
    }

    #[test]
    fn expiry_report_buckets() {
        let now = Utc::now();
        let report = expiry_report(vec![rx(-3, false), rx(3, false), rx(20, false), rx(2, true)], now);
        assert_eq!(report.expired.len(), 1);
        assert_eq!(report.expiring_soon.len(), 1);
    }
}
