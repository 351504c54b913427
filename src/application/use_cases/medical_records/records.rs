use chrono::Utc;
use uuid::Uuid;

use crate::application::access::{CHART_WRITERS, DENTISTS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::audit_repository::{AuditRepository, record_quietly};
use crate::application::ports::medical_file_store::MedicalFileStore;
use crate::application::ports::medical_record_repository::{
    MedicalRecordQuery, MedicalRecordRepository, NewMedicalRecord,
};
use crate::application::ports::patient_repository::PatientRepository;
use crate::application::services::validation::required;
use crate::domain::audit::{AuditAction, AuditEntry};
use crate::domain::medical_records::{MedicalRecord, RecordType};

pub(crate) const ENTITY: &str = "medical_record";

pub(crate) fn audit_entry(principal: &Principal, action: AuditAction, id: Uuid) -> AuditEntry {
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

pub(crate) async fn load_record<R: MedicalRecordRepository + ?Sized>(
    repo: &R,
    tenant_id: Uuid,
    id: Uuid,
) -> ServiceResult<MedicalRecord> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Medical record"))
}

pub(crate) async fn ensure_patient<P: PatientRepository + ?Sized>(
    patients: &P,
    tenant_id: Uuid,
    patient_id: Uuid,
) -> ServiceResult<()> {
    patients
        .find_by_id(tenant_id, patient_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Patient"))
        .map(|_| ())
}

#[derive(Debug, Clone)]
pub struct RecordRequest {
    pub patient_id: Uuid,
    pub record_type: RecordType,
    pub title: String,
    pub description: Option<String>,
    pub clinical_data: Option<serde_json::Value>,
    pub tags: Option<serde_json::Value>,
    pub record_date: Option<chrono::DateTime<Utc>>,
}

pub struct CreateRecord<'a, R, P>
where
    R: MedicalRecordRepository + ?Sized,
    P: PatientRepository + ?Sized,
{
    pub records: &'a R,
    pub patients: &'a P,
}

impl<'a, R, P> CreateRecord<'a, R, P>
where
    R: MedicalRecordRepository + ?Sized,
    P: PatientRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        req: &RecordRequest,
    ) -> ServiceResult<MedicalRecord> {
        require_roles(principal, CHART_WRITERS)?;
        required("Title", &req.title)?;
        ensure_patient(self.patients, principal.tenant_id, req.patient_id).await?;
        Ok(self
            .records
            .create(
                principal.tenant_id,
                &NewMedicalRecord {
                    id: Uuid::new_v4(),
                    patient_id: req.patient_id,
                    created_by: principal.user_id,
                    record_type: req.record_type,
                    title: req.title.trim().to_string(),
                    description: req.description.clone(),
                    file: None,
                    clinical_data: req.clinical_data.clone(),
                    tags: req.tags.clone(),
                    record_date: req.record_date,
                },
            )
            .await?)
    }
}

pub struct ListRecords<'a, R: MedicalRecordRepository + ?Sized> {
    pub records: &'a R,
}

impl<'a, R: MedicalRecordRepository + ?Sized> ListRecords<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        query: &MedicalRecordQuery,
    ) -> ServiceResult<Vec<MedicalRecord>> {
        Ok(self.records.list(principal.tenant_id, query).await?)
    }
}

pub struct GetRecord<'a, R, A>
where
    R: MedicalRecordRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub records: &'a R,
    pub audit: &'a A,
}

impl<'a, R, A> GetRecord<'a, R, A>
where
    R: MedicalRecordRepository + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<MedicalRecord> {
        let record = load_record(self.records, principal.tenant_id, id).await?;
        record_quietly(
            self.audit,
            principal.tenant_id,
            audit_entry(principal, AuditAction::Viewed, id),
        )
        .await;
        Ok(record)
    }
}

pub struct DeleteRecord<'a, R, F, A>
where
    R: MedicalRecordRepository + ?Sized,
    F: MedicalFileStore + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub records: &'a R,
    pub files: &'a F,
    pub audit: &'a A,
}

impl<'a, R, F, A> DeleteRecord<'a, R, F, A>
where
    R: MedicalRecordRepository + ?Sized,
    F: MedicalFileStore + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<()> {
        require_roles(principal, DENTISTS)?;
        let record = load_record(self.records, principal.tenant_id, id).await?;
        if let Some(path) = record.file_path.as_deref() {
            self.files.secure_delete(path).await?;
        }
        self.records.delete(principal.tenant_id, id).await?;
        record_quietly(
            self.audit,
            principal.tenant_id,
            audit_entry(principal, AuditAction::Deleted, id),
        )
        .await;
        tracing::info!(tenant_id = %principal.tenant_id, record_id = %id, "medical_record_deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::domain::users::StaffRole;

    fn note(patient_id: Uuid) -> RecordRequest {
        RecordRequest {
            patient_id,
            record_type: RecordType::ClinicalNote,
            title: "Post-op check".into(),
            description: None,
            clinical_data: Some(serde_json::json!({"bleeding": false})),
            tags: None,
            record_date: None,
        }
    }

    #[tokio::test]
    async fn receptionist_cannot_chart() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let desk = store.seed_user(tenant.id, "desk@clinic.test", StaffRole::Receptionist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", desk.id);
        let err = CreateRecord {
            records: &store,
            patients: &store,
        }
        .execute(&store.principal_for(&desk), &note(patient.id))
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn viewing_is_audited() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let hygienist = store.seed_user(tenant.id, "h@clinic.test", StaffRole::Hygienist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", hygienist.id);
        let principal = store.principal_for(&hygienist);
        let record = CreateRecord {
            records: &store,
            patients: &store,
        }
        .execute(&principal, &note(patient.id))
        .await
        .unwrap();
        assert!(!record.has_file());
        GetRecord {
            records: &store,
            audit: &store,
        }
        .execute(&principal, record.id)
        .await
        .unwrap();
        let entries = store.audit_entries(tenant.id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Viewed);
        assert_eq!(entries[0].entity_type, ENTITY);
    }
}
