use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::application::access::{DENTISTS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::audit_repository::{AuditRepository, record_quietly};
use crate::application::ports::patient_repository::PatientRepository;
use crate::application::ports::prescription_repository::{
    NewPrescription, PrescriptionQuery, PrescriptionRepository,
};
use crate::application::services::validation::required;
use crate::domain::audit::{AuditAction, AuditEntry};
use crate::domain::prescriptions::{
    EXPIRY_WARNING_DAYS, ExpiryReport, Prescription, default_expiry, expiry_report,
};

const ENTITY: &str = "prescription";

async fn load<R: PrescriptionRepository + ?Sized>(
    repo: &R,
    tenant_id: Uuid,
    id: Uuid,
) -> ServiceResult<Prescription> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Prescription"))
}

fn audit(principal: &Principal, action: AuditAction, id: Uuid) -> AuditEntry {
    AuditEntry {
        user_id: principal.user_id,
        action,
        entity_type: ENTITY,
        entity_id: id,
        details: None,
        ip_address: None,
        user_agent: None,
    }
}

#[derive(Debug, Clone)]
pub struct PrescriptionRequest {
    pub patient_id: Uuid,
    pub treatment_id: Option<Uuid>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    pub quantity: Option<String>,
    pub refills: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

fn check_request(req: &PrescriptionRequest) -> ServiceResult<()> {
    required("Medication name", &req.medication_name)?;
    required("Dosage", &req.dosage)?;
    required("Frequency", &req.frequency)?;
    required("Duration", &req.duration)?;
    if req.refills < 0 {
        return Err(ServiceError::validation("Refills cannot be negative"));
    }
    Ok(())
}

pub struct CreatePrescription<'a, R, P>
where
    R: PrescriptionRepository + ?Sized,
    P: PatientRepository + ?Sized,
{
    pub prescriptions: &'a R,
    pub patients: &'a P,
}

impl<'a, R, P> CreatePrescription<'a, R, P>
where
    R: PrescriptionRepository + ?Sized,
    P: PatientRepository + ?Sized,
{
    /// The prescribing dentist is the caller. Without an explicit expiry the default validity applies.
    pub async fn execute(
        &self,
        principal: &Principal,
        req: &PrescriptionRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<Prescription> {
        require_roles(principal, DENTISTS)?;
        check_request(req)?;
        self.patients
            .find_by_id(principal.tenant_id, req.patient_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Patient"))?;
        let expires_at = req.expires_at.unwrap_or_else(|| default_expiry(now));
        if expires_at <= now {
            return Err(ServiceError::validation("Expiry must be in the future"));
        }
        let created = self
            .prescriptions
            .create(
                principal.tenant_id,
                &NewPrescription {
                    patient_id: req.patient_id,
                    dentist_id: principal.user_id,
                    treatment_id: req.treatment_id,
                    medication_name: req.medication_name.trim().to_string(),
                    dosage: req.dosage.trim().to_string(),
                    frequency: req.frequency.trim().to_string(),
                    duration: req.duration.trim().to_string(),
                    instructions: req.instructions.clone(),
                    quantity: req.quantity.clone(),
                    refills: req.refills,
                    expires_at,
                },
            )
            .await?;
        Ok(created)
    }
}

pub struct ListPrescriptions<'a, R: PrescriptionRepository + ?Sized> {
    pub prescriptions: &'a R,
}

impl<'a, R: PrescriptionRepository + ?Sized> ListPrescriptions<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        patient_id: Option<Uuid>,
        active_only: bool,
        page: crate::application::ports::Page,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Prescription>> {
        let query = PrescriptionQuery {
            patient_id,
            active_at: active_only.then_some(now),
            page,
        };
        Ok(self.prescriptions.list(principal.tenant_id, &query).await?)
    }
}

pub struct GetPrescription<'a, R: PrescriptionRepository + ?Sized> {
    pub prescriptions: &'a R,
}

impl<'a, R: PrescriptionRepository + ?Sized> GetPrescription<'a, R> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<Prescription> {
        load(self.prescriptions, principal.tenant_id, id).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrescriptionChanges {
    pub medication_name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
    pub quantity: Option<String>,
    pub refills: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct UpdatePrescription<'a, R: PrescriptionRepository + ?Sized> {
    pub prescriptions: &'a R,
}

impl<'a, R: PrescriptionRepository + ?Sized> UpdatePrescription<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: &PrescriptionChanges,
        now: DateTime<Utc>,
    ) -> ServiceResult<Prescription> {
        require_roles(principal, DENTISTS)?;
        let mut p = load(self.prescriptions, principal.tenant_id, id).await?;
        if p.is_dispensed {
            return Err(ServiceError::validation("Cannot update dispensed prescription"));
        }
        for (field, value, target) in [
            ("Medication name", &changes.medication_name, &mut p.medication_name),
            ("Dosage", &changes.dosage, &mut p.dosage),
            ("Frequency", &changes.frequency, &mut p.frequency),
            ("Duration", &changes.duration, &mut p.duration),
        ] {
            if let Some(v) = value {
                required(field, v)?;
                *target = v.trim().to_string();
            }
        }
        if changes.instructions.is_some() {
            p.instructions = changes.instructions.clone();
        }
        if changes.quantity.is_some() {
            p.quantity = changes.quantity.clone();
        }
        if let Some(refills) = changes.refills {
            if refills < 0 {
                return Err(ServiceError::validation("Refills cannot be negative"));
            }
            p.refills = refills;
        }
        if let Some(expires_at) = changes.expires_at {
            p.expires_at = expires_at;
        }
        p.updated_at = now;
        Ok(self.prescriptions.save(principal.tenant_id, &p).await?)
    }
}

pub struct DispensePrescription<'a, R, A>
where
    R: PrescriptionRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub prescriptions: &'a R,
    pub audit: &'a A,
}

impl<'a, R, A> DispensePrescription<'a, R, A>
where
    R: PrescriptionRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<Prescription> {
        let mut p = load(self.prescriptions, principal.tenant_id, id).await?;
        p.dispense(now).map_err(ServiceError::validation)?;
        let saved = self.prescriptions.save(principal.tenant_id, &p).await?;
        record_quietly(
            self.audit,
            principal.tenant_id,
            audit(principal, AuditAction::Dispensed, id),
        )
        .await;
        Ok(saved)
    }
}

pub struct ExpiryCheck<'a, R: PrescriptionRepository + ?Sized> {
    pub prescriptions: &'a R,
}

impl<'a, R: PrescriptionRepository + ?Sized> ExpiryCheck<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> ServiceResult<ExpiryReport> {
        let candidates = self
            .prescriptions
            .undispensed_expiring_before(
                principal.tenant_id,
                now + Duration::days(EXPIRY_WARNING_DAYS),
            )
            .await?;
        Ok(expiry_report(candidates, now))
    }
}

pub struct DeletePrescription<'a, R, A>
where
    R: PrescriptionRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub prescriptions: &'a R,
    pub audit: &'a A,
}

impl<'a, R, A> DeletePrescription<'a, R, A>
where
    R: PrescriptionRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<()> {
        require_roles(principal, DENTISTS)?;
        if !self.prescriptions.delete(principal.tenant_id, id).await? {
            return Err(ServiceError::not_found("Prescription"));
        }
        record_quietly(
            self.audit,
            principal.tenant_id,
            audit(principal, AuditAction::Deleted, id),
        )
        .await;
        Ok(())
    }
}
