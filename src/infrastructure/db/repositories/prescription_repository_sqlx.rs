use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::prescription_repository::{
    NewPrescription, PrescriptionQuery, PrescriptionRepository,
};
use crate::domain::prescriptions::Prescription;
use crate::infrastructure::db::{PgPool, begin_tenant_tx};

const PRESCRIPTION_COLUMNS: &str = r#"id, tenant_id, patient_id, dentist_id, treatment_id,
    medication_name, dosage, frequency, duration, instructions, quantity, refills, is_dispensed,
    dispensed_at, created_at, updated_at, expires_at"#;

pub struct SqlxPrescriptionRepository {
    pub pool: PgPool,
}

impl SqlxPrescriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_prescription(r: &PgRow) -> Prescription {
    Prescription {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        patient_id: r.get("patient_id"),
        dentist_id: r.get("dentist_id"),
        treatment_id: r.get("treatment_id"),
        medication_name: r.get("medication_name"),
        dosage: r.get("dosage"),
        frequency: r.get("frequency"),
        duration: r.get("duration"),
        instructions: r.get("instructions"),
        quantity: r.get("quantity"),
        refills: r.get("refills"),
        is_dispensed: r.get("is_dispensed"),
        dispensed_at: r.get("dispensed_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        expires_at: r.get("expires_at"),
    }
}

#[async_trait]
impl PrescriptionRepository for SqlxPrescriptionRepository {
    async fn create(&self, tenant_id: Uuid, p: &NewPrescription) -> anyhow::Result<Prescription> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"INSERT INTO prescriptions (tenant_id, patient_id, dentist_id, treatment_id,
                   medication_name, dosage, frequency, duration, instructions, quantity,
                   refills, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING {PRESCRIPTION_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(p.patient_id)
            .bind(p.dentist_id)
            .bind(p.treatment_id)
            .bind(&p.medication_name)
            .bind(&p.dosage)
            .bind(&p.frequency)
            .bind(&p.duration)
            .bind(&p.instructions)
            .bind(&p.quantity)
            .bind(p.refills)
            .bind(p.expires_at)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(map_prescription(&row))
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Prescription>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE tenant_id = $1 AND id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.as_ref().map(map_prescription))
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        q: &PrescriptionQuery,
    ) -> anyhow::Result<Vec<Prescription>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
               WHERE tenant_id = $1
                 AND ($2::uuid IS NULL OR patient_id = $2)
                 AND ($3::timestamptz IS NULL OR (NOT is_dispensed AND expires_at > $3))
               ORDER BY created_at DESC
               OFFSET $4 LIMIT $5"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(q.patient_id)
            .bind(q.active_at)
            .bind(q.page.skip)
            .bind(q.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows.iter().map(map_prescription).collect())
    }

    async fn undispensed_expiring_before(
        &self,
        tenant_id: Uuid,
        before: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Prescription>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
               WHERE tenant_id = $1 AND NOT is_dispensed AND expires_at <= $2
               ORDER BY expires_at"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(before)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows.iter().map(map_prescription).collect())
    }

    async fn save(&self, tenant_id: Uuid, p: &Prescription) -> anyhow::Result<Prescription> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE prescriptions SET
                   medication_name = $3, dosage = $4, frequency = $5, duration = $6,
                   instructions = $7, quantity = $8, refills = $9, is_dispensed = $10,
                   dispensed_at = $11, expires_at = $12, updated_at = $13
               WHERE tenant_id = $1 AND id = $2
               RETURNING {PRESCRIPTION_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(p.id)
            .bind(&p.medication_name)
            .bind(&p.dosage)
            .bind(&p.frequency)
            .bind(&p.duration)
            .bind(&p.instructions)
            .bind(&p.quantity)
            .bind(p.refills)
            .bind(p.is_dispensed)
            .bind(p.dispensed_at)
            .bind(p.expires_at)
            .bind(p.updated_at)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(map_prescription(&row))
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let res = sqlx::query("DELETE FROM prescriptions WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }
}
