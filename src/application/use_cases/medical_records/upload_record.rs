use uuid::Uuid;

use crate::application::access::{CHART_WRITERS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::audit_repository::{AuditRepository, record_quietly};
use crate::application::ports::medical_file_store::MedicalFileStore;
use crate::application::ports::medical_record_repository::{
    MedicalRecordRepository, NewMedicalRecord, StoredFileMeta,
};
use crate::application::ports::patient_repository::PatientRepository;
use crate::application::services::checksum::sha256_hex;
use crate::application::services::validation::required;
use crate::application::use_cases::medical_records::records::{
    RecordRequest, audit_entry, ensure_patient, load_record,
};
use crate::domain::audit::AuditAction;
use crate::domain::medical_records::{ALLOWED_EXTENSIONS, MedicalRecord, normalized_extension};

pub struct UploadRecord<'a, R, P, F>
where
    R: MedicalRecordRepository + ?Sized,
    P: PatientRepository + ?Sized,
    F: MedicalFileStore + ?Sized,
{
    pub records: &'a R,
    pub patients: &'a P,
    pub files: &'a F,
    pub max_bytes: usize,
}

impl<'a, R, P, F> UploadRecord<'a, R, P, F>
where
    R: MedicalRecordRepository + ?Sized,
    P: PatientRepository + ?Sized,
    F: MedicalFileStore + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        req: &RecordRequest,
        file_name: &str,
        bytes: &[u8],
    ) -> ServiceResult<MedicalRecord> {
        require_roles(principal, CHART_WRITERS)?;
        required("Title", &req.title)?;
        if bytes.is_empty() {
            return Err(ServiceError::validation("Uploaded file is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(ServiceError::PayloadTooLarge(format!(
                "File exceeds the maximum size of {} bytes",
                self.max_bytes
            )));
        }
        let extension = normalized_extension(file_name).ok_or_else(|| {
            ServiceError::validation(format!(
                "File type not allowed. Allowed types: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;
        ensure_patient(self.patients, principal.tenant_id, req.patient_id).await?;

        let record_id = Uuid::new_v4();
        let stored = self
            .files
            .store(principal.tenant_id, record_id, &extension, bytes)
            .await?;
        let mime_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let created = self
            .records
            .create(
                principal.tenant_id,
                &NewMedicalRecord {
                    id: record_id,
                    patient_id: req.patient_id,
                    created_by: principal.user_id,
                    record_type: req.record_type,
                    title: req.title.trim().to_string(),
                    description: req.description.clone(),
                    file: Some(StoredFileMeta {
                        file_path: stored.relative_path.clone(),
                        file_name: file_name.to_string(),
                        file_size: stored.size,
                        mime_type,
                        checksum: stored.checksum,
                    }),
                    clinical_data: req.clinical_data.clone(),
                    tags: req.tags.clone(),
                    record_date: req.record_date,
                },
            )
            .await;
        match created {
            Ok(record) => {
                tracing::info!(
                    tenant_id = %principal.tenant_id,
                    record_id = %record.id,
                    size = stored.size,
                    "medical_record_uploaded"
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = self.files.secure_delete(&stored.relative_path).await {
                    tracing::warn!(error = ?cleanup, path = %stored.relative_path, "orphan_file_cleanup_failed");
                }
                Err(e.into())
            }
        }
    }
}

/// Decrypted file contents ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct RecordDownload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub struct DownloadRecord<'a, R, F, A>
where
    R: MedicalRecordRepository + ?Sized,
    F: MedicalFileStore + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub records: &'a R,
    pub files: &'a F,
    pub audit: &'a A,
}

impl<'a, R, F, A> DownloadRecord<'a, R, F, A>
where
    R: MedicalRecordRepository + ?Sized,
    F: MedicalFileStore + ?Sized,
    A: AuditRepository + ?Sized,
{
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<RecordDownload> {
        let record = load_record(self.records, principal.tenant_id, id).await?;
        let path = record
            .file_path
            .as_deref()
            .ok_or_else(|| ServiceError::NotFound("No file attached to this record".into()))?;
        let bytes = self.files.load(path).await?;
        let digest = sha256_hex(&bytes);
        if record.checksum.as_deref().is_some_and(|c| c != digest) {
            tracing::error!(record_id = %id, "medical_record_checksum_mismatch");
            return Err(anyhow::anyhow!("checksum mismatch for record {id}").into());
        }
        record_quietly(
            self.audit,
            principal.tenant_id,
            audit_entry(principal, AuditAction::Exported, id),
        )
        .await;
        Ok(RecordDownload {
            file_name: record.file_name.unwrap_or_else(|| format!("{id}")),
            mime_type: record
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".into()),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::application::use_cases::medical_records::records::DeleteRecord;
    use crate::domain::medical_records::RecordType;
    use crate::domain::users::StaffRole;

    fn request(patient_id: Uuid) -> RecordRequest {
        RecordRequest {
            patient_id,
            record_type: RecordType::Radiograph,
            title: "Bitewing".into(),
            description: None,
            clinical_data: None,
            tags: None,
            record_date: None,
        }
    }

    fn setup(store: &MemoryStore) -> (Principal, Uuid) {
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", dentist.id);
        (store.principal_for(&dentist), patient.id)
    }

    fn uploader(store: &MemoryStore) -> UploadRecord<'_, MemoryStore, MemoryStore, MemoryStore> {
        UploadRecord {
            records: store,
            patients: store,
            files: store,
            max_bytes: 16,
        }
    }

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let record = uploader(&store)
            .execute(&principal, &request(patient_id), "bw.PNG", b"\x89PNG-data")
            .await
            .unwrap();
        assert_eq!(record.mime_type.as_deref(), Some("image/png"));
        assert_eq!(record.file_size, Some(9));
        assert_eq!(record.checksum, Some(sha256_hex(b"\x89PNG-data")));
        let download = DownloadRecord {
            records: &store,
            files: &store,
            audit: &store,
        }
        .execute(&principal, record.id)
        .await
        .unwrap();
        assert_eq!(download.bytes, b"\x89PNG-data");
        assert_eq!(download.file_name, "bw.PNG");
        assert_eq!(
            store.audit_entries(principal.tenant_id)[0].action,
            AuditAction::Exported
        );
    }

    #[tokio::test]
    async fn rejects_bad_extension_and_oversize() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let err = uploader(&store)
            .execute(&principal, &request(patient_id), "run.sh", b"echo")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = uploader(&store)
            .execute(&principal, &request(patient_id), "big.pdf", &[0u8; 17])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PayloadTooLarge(_)));
        let err = uploader(&store)
            .execute(&principal, &request(patient_id), "empty.pdf", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn tampered_file_fails_checksum() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let record = uploader(&store)
            .execute(&principal, &request(patient_id), "note.txt", b"original")
            .await
            .unwrap();
        store.overwrite_file(record.file_path.as_deref().unwrap(), b"tampered");
        let err = DownloadRecord {
            records: &store,
            files: &store,
            audit: &store,
        }
        .execute(&principal, record.id)
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[tokio::test]
    async fn delete_removes_the_file() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let record = uploader(&store)
            .execute(&principal, &request(patient_id), "note.txt", b"original")
            .await
            .unwrap();
        let path = record.file_path.clone().unwrap();
        DeleteRecord {
            records: &store,
            files: &store,
            audit: &store,
        }
        .execute(&principal, record.id)
        .await
        .unwrap();
        assert!(!store.has_file(&path));
        assert_eq!(
            store.audit_entries(principal.tenant_id)[0].action,
            AuditAction::Deleted
        );
    }
}
