use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::medical_record_repository::{
    MedicalRecordQuery, MedicalRecordRepository, NewMedicalRecord,
};
use crate::domain::medical_records::MedicalRecord;
use crate::infrastructure::db::{PgPool, begin_tenant_tx, text_col};

const RECORD_COLUMNS: &str = r#"id, tenant_id, patient_id, created_by, record_type, title,
    description, file_path, file_name, file_size, mime_type, checksum, clinical_data, tags,
    record_date, created_at, updated_at"#;

pub struct SqlxMedicalRecordRepository {
    pub pool: PgPool,
}

impl SqlxMedicalRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_record(r: &PgRow) -> anyhow::Result<MedicalRecord> {
    Ok(MedicalRecord {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        patient_id: r.get("patient_id"),
        created_by: r.get("created_by"),
        record_type: text_col(r, "record_type")?,
        title: r.get("title"),
        description: r.get("description"),
        file_path: r.get("file_path"),
        file_name: r.get("file_name"),
        file_size: r.get("file_size"),
        mime_type: r.get("mime_type"),
        checksum: r.get("checksum"),
        clinical_data: r.get("clinical_data"),
        tags: r.get("tags"),
        record_date: r.get("record_date"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

#[async_trait]
impl MedicalRecordRepository for SqlxMedicalRecordRepository {
    async fn create(
        &self,
        tenant_id: Uuid,
        rec: &NewMedicalRecord,
    ) -> anyhow::Result<MedicalRecord> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"INSERT INTO medical_records (id, tenant_id, patient_id, created_by, record_type,
                   title, description, file_path, file_name, file_size, mime_type, checksum,
                   clinical_data, tags, record_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                       COALESCE($15, now()))
               RETURNING {RECORD_COLUMNS}"#
        );
        let file = rec.file.as_ref();
        let row = sqlx::query(&sql)
            .bind(rec.id)
            .bind(tenant_id)
            .bind(rec.patient_id)
            .bind(rec.created_by)
            .bind(rec.record_type.as_str())
            .bind(&rec.title)
            .bind(&rec.description)
            .bind(file.map(|f| f.file_path.as_str()))
            .bind(file.map(|f| f.file_name.as_str()))
            .bind(file.map(|f| f.file_size))
            .bind(file.map(|f| f.mime_type.as_str()))
            .bind(file.map(|f| f.checksum.as_str()))
            .bind(&rec.clinical_data)
            .bind(&rec.tags)
            .bind(rec.record_date)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        map_record(&row)
    }

    async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<MedicalRecord>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM medical_records WHERE tenant_id = $1 AND id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_record).transpose()
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        q: &MedicalRecordQuery,
    ) -> anyhow::Result<Vec<MedicalRecord>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {RECORD_COLUMNS} FROM medical_records
               WHERE tenant_id = $1
                 AND ($2::uuid IS NULL OR patient_id = $2)
                 AND ($3::text IS NULL OR record_type = $3)
               ORDER BY record_date DESC
               OFFSET $4 LIMIT $5"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(q.patient_id)
            .bind(q.record_type.map(|t| t.as_str()))
            .bind(q.page.skip)
            .bind(q.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_record).collect()
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let res = sqlx::query("DELETE FROM medical_records WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }
}
