use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{ADMIN_ONLY, CLINICAL_STAFF, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::audit_repository::{AuditRepository, record_quietly};
use crate::application::ports::patient_repository::{NewPatient, PatientPatch, PatientRepository};
use crate::application::services::validation::{normalize_email, required};
use crate::domain::audit::{AuditAction, AuditEntry};
use crate::domain::patients::{Patient, PatientStatus};
use crate::domain::tenants::{Tenant, has_capacity};

const EMAIL_TAKEN: &str = "Patient with this email already exists";

pub(crate) async fn load_patient<R: PatientRepository + ?Sized>(
    repo: &R,
    tenant_id: Uuid,
    id: Uuid,
) -> ServiceResult<Patient> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Patient"))
}

fn check_birth_date(dob: chrono::NaiveDate, now: DateTime<Utc>) -> ServiceResult<()> {
    if dob > now.date_naive() {
        return Err(ServiceError::validation("Date of birth cannot be in the future"));
    }
    Ok(())
}

pub struct CreatePatient<'a, R: PatientRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: PatientRepository + ?Sized> CreatePatient<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        patient: &NewPatient,
        now: DateTime<Utc>,
    ) -> ServiceResult<Patient> {
        require_roles(principal, CLINICAL_STAFF)?;
        required("First name", &patient.first_name)?;
        required("Last name", &patient.last_name)?;
        required("Contact number", &patient.contact_number)?;
        check_birth_date(patient.date_of_birth, now)?;

        let count = self.repo.count(tenant.id).await?;
        if !has_capacity(count, tenant.max_patients) {
            return Err(ServiceError::forbidden("Patient limit reached for current plan"));
        }
        let mut patient = patient.clone();
        patient.created_by = principal.user_id;
        if let Some(email) = patient.email.as_deref().filter(|e| !e.trim().is_empty()) {
            let email = normalize_email(email)?;
            if self.repo.find_by_email(tenant.id, &email).await?.is_some() {
                return Err(ServiceError::conflict(EMAIL_TAKEN));
            }
            patient.email = Some(email);
        } else {
            patient.email = None;
        }
        let created = self.repo.create(tenant.id, &patient).await?;
        tracing::info!(tenant_id = %tenant.id, patient_id = %created.id, "patient_created");
        Ok(created)
    }
}

pub struct GetPatient<'a, R: PatientRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: PatientRepository + ?Sized> GetPatient<'a, R> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<Patient> {
        load_patient(self.repo, principal.tenant_id, id).await
    }
}

pub struct UpdatePatient<'a, R: PatientRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: PatientRepository + ?Sized> UpdatePatient<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: &PatientPatch,
        now: DateTime<Utc>,
    ) -> ServiceResult<Patient> {
        require_roles(principal, CLINICAL_STAFF)?;
        let current = load_patient(self.repo, principal.tenant_id, id).await?;
        let mut patch = patch.clone();
        if let Some(dob) = patch.date_of_birth {
            check_birth_date(dob, now)?;
        }
        if let Some(email) = patch.email.as_deref() {
            let email = normalize_email(email)?;
            if current.email.as_deref() != Some(email.as_str())
                && self
                    .repo
                    .find_by_email(principal.tenant_id, &email)
                    .await?
                    .is_some_and(|other| other.id != id)
            {
                return Err(ServiceError::conflict(EMAIL_TAKEN));
            }
            patch.email = Some(email);
        }
        self.repo
            .update(principal.tenant_id, id, &patch, principal.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Patient"))
    }
}

/// Soft delete: the patient is marked inactive and the change audited.
pub struct DeletePatient<'a, R, A>
where
    R: PatientRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub repo: &'a R,
    pub audit: &'a A,
}

impl<'a, R, A> DeletePatient<'a, R, A>
where
    R: PatientRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<()> {
        require_roles(principal, ADMIN_ONLY)?;
        let patch = PatientPatch {
            status: Some(PatientStatus::Inactive),
            ..PatientPatch::default()
        };
        self.repo
            .update(principal.tenant_id, id, &patch, principal.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Patient"))?;
        record_quietly(
            self.audit,
            principal.tenant_id,
            AuditEntry {
                user_id: principal.user_id,
                action: AuditAction::Deleted,
                entity_type: "patient",
                entity_id: id,
                details: Some(serde_json::json!({ "status": "inactive" })),
                ip_address: None,
                user_agent: None,
            },
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::{MemoryStore, new_patient};
    use crate::domain::users::StaffRole;

    #[tokio::test]
    async fn patient_limit_applies() {
        let store = MemoryStore::default();
        let mut tenant = store.seed_tenant();
        tenant.max_patients = 1;
        let user = store.seed_user(tenant.id, "r@clinic.test", StaffRole::Receptionist);
        let uc = CreatePatient { repo: &store };
        let principal = store.principal_for(&user);
        uc.execute(&principal, &tenant, &new_patient("Ana", None), Utc::now())
            .await
            .unwrap();
        let err = uc
            .execute(&principal, &tenant, &new_patient("Bo", None), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(m) if m == "Patient limit reached for current plan"));
    }

    #[tokio::test]
    async fn unlimited_plan_never_blocks() {
        let store = MemoryStore::default();
        let mut tenant = store.seed_tenant();
        tenant.max_patients = -1;
        let user = store.seed_user(tenant.id, "r@clinic.test", StaffRole::Receptionist);
        let uc = CreatePatient { repo: &store };
        for name in ["A", "B", "C"] {
            uc.execute(&store.principal_for(&user), &tenant, &new_patient(name, None), Utc::now())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn email_is_unique_per_clinic() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let user = store.seed_user(tenant.id, "r@clinic.test", StaffRole::Receptionist);
        let uc = CreatePatient { repo: &store };
        let principal = store.principal_for(&user);
        uc.execute(&principal, &tenant, &new_patient("Ana", Some("ana@mail.test")), Utc::now())
            .await
            .unwrap();
        let err = uc
            .execute(&principal, &tenant, &new_patient("Ann", Some("ANA@mail.test")), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(m) if m == EMAIL_TAKEN));
    }

    #[tokio::test]
    async fn manager_cannot_register_patients() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let manager = store.seed_user(tenant.id, "m@clinic.test", StaffRole::Manager);
        let err = CreatePatient { repo: &store }
            .execute(&store.principal_for(&manager), &tenant, &new_patient("Ana", None), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_marks_inactive_and_audits() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let admin = store.seed_user(tenant.id, "a@clinic.test", StaffRole::Admin);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", admin.id);
        DeletePatient {
            repo: &store,
            audit: &store,
        }
        .execute(&store.principal_for(&admin), patient.id)
        .await
        .unwrap();
        assert_eq!(
            store.patient(patient.id).map(|p| p.status),
            Some(PatientStatus::Inactive)
        );
        assert_eq!(store.audit_entries(tenant.id).len(), 1);
    }
}
