use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::medical_records::{MedicalRecord, RecordType};

#[derive(Debug, Clone)]
pub struct StoredFileMeta {
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct NewMedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub created_by: Uuid,
    pub record_type: RecordType,
    pub title: String,
    pub description: Option<String>,
    pub file: Option<StoredFileMeta>,
    pub clinical_data: Option<serde_json::Value>,
    pub tags: Option<serde_json::Value>,
    pub record_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct MedicalRecordQuery {
    pub patient_id: Option<Uuid>,
    pub record_type: Option<RecordType>,
    pub page: Page,
}

#[async_trait]
pub trait MedicalRecordRepository: Send + Sync {
    async fn create(
        &self,
        tenant_id: Uuid,
        record: &NewMedicalRecord,
    ) -> anyhow::Result<MedicalRecord>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid)
    -> anyhow::Result<Option<MedicalRecord>>;
    async fn list(
        &self,
        tenant_id: Uuid,
        query: &MedicalRecordQuery,
    ) -> anyhow::Result<Vec<MedicalRecord>>;
    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}
