use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::treatment_repository::{
    NewTreatment, NewTreatmentItem, TreatmentQuery, TreatmentRepository,
};
use crate::domain::treatments::{Treatment, TreatmentItem};
use crate::infrastructure::db::{PgPool, begin_tenant_tx, text_col};

const TREATMENT_COLUMNS: &str = r#"id, tenant_id, patient_id, dentist_id, consultation_id,
    appointment_id, name, description, status, priority, teeth_involved, quadrants,
    progress_notes, current_stage, total_stages, estimated_cost::float8 AS estimated_cost,
    actual_cost::float8 AS actual_cost, created_at, updated_at, started_at, completed_at"#;

const ITEM_COLUMNS: &str = r#"id, tenant_id, treatment_id, service_id, quantity,
    unit_price::float8 AS unit_price, status, tooth_number, surface, notes, created_at,
    completed_at"#;

pub struct SqlxTreatmentRepository {
    pub pool: PgPool,
}

impl SqlxTreatmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_treatment(r: &PgRow) -> anyhow::Result<Treatment> {
    Ok(Treatment {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        patient_id: r.get("patient_id"),
        dentist_id: r.get("dentist_id"),
        consultation_id: r.get("consultation_id"),
        appointment_id: r.get("appointment_id"),
        name: r.get("name"),
        description: r.get("description"),
        status: text_col(r, "status")?,
        priority: text_col(r, "priority")?,
        teeth_involved: r.get("teeth_involved"),
        quadrants: r.get("quadrants"),
        progress_notes: r.get("progress_notes"),
        current_stage: r.get("current_stage"),
        total_stages: r.get("total_stages"),
        estimated_cost: r.get("estimated_cost"),
        actual_cost: r.get("actual_cost"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        started_at: r.get("started_at"),
        completed_at: r.get("completed_at"),
    })
}

fn map_item(r: &PgRow) -> anyhow::Result<TreatmentItem> {
    Ok(TreatmentItem {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        treatment_id: r.get("treatment_id"),
        service_id: r.get("service_id"),
        quantity: r.get("quantity"),
        unit_price: r.get("unit_price"),
        status: text_col(r, "status")?,
        tooth_number: r.get("tooth_number"),
        surface: r.get("surface"),
        notes: r.get("notes"),
        created_at: r.get("created_at"),
        completed_at: r.get("completed_at"),
    })
}

#[async_trait]
impl TreatmentRepository for SqlxTreatmentRepository {
    async fn create(&self, tenant_id: Uuid, t: &NewTreatment) -> anyhow::Result<Treatment> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"INSERT INTO treatments (tenant_id, patient_id, dentist_id, consultation_id,
                   appointment_id, name, description, status, priority, teeth_involved,
                   quadrants, progress_notes, total_stages, estimated_cost)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 'planned', $8, $9, $10, '[]'::jsonb, $11,
                       $12::numeric)
               RETURNING {TREATMENT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(t.patient_id)
            .bind(t.dentist_id)
            .bind(t.consultation_id)
            .bind(t.appointment_id)
            .bind(&t.name)
            .bind(&t.description)
            .bind(t.priority.as_str())
            .bind(&t.teeth_involved)
            .bind(&t.quadrants)
            .bind(t.total_stages)
            .bind(t.estimated_cost)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        map_treatment(&row)
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Treatment>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            "SELECT {TREATMENT_COLUMNS} FROM treatments WHERE tenant_id = $1 AND id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_treatment).transpose()
    }

    async fn list(&self, tenant_id: Uuid, q: &TreatmentQuery) -> anyhow::Result<Vec<Treatment>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {TREATMENT_COLUMNS} FROM treatments
               WHERE tenant_id = $1
                 AND ($2::uuid IS NULL OR patient_id = $2)
                 AND ($3::uuid IS NULL OR dentist_id = $3)
                 AND ($4::text IS NULL OR status = $4)
               ORDER BY created_at DESC
               OFFSET $5 LIMIT $6"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(q.patient_id)
            .bind(q.dentist_id)
            .bind(q.status.map(|s| s.as_str()))
            .bind(q.page.skip)
            .bind(q.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_treatment).collect()
    }

    async fn save(&self, tenant_id: Uuid, t: &Treatment) -> anyhow::Result<Treatment> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE treatments SET
                   name = $3, description = $4, status = $5, priority = $6,
                   teeth_involved = $7, quadrants = $8, progress_notes = $9,
                   current_stage = $10, total_stages = $11, estimated_cost = $12::numeric,
                   actual_cost = $13::numeric, started_at = $14, completed_at = $15,
                   updated_at = $16
               WHERE tenant_id = $1 AND id = $2
               RETURNING {TREATMENT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(t.id)
            .bind(&t.name)
            .bind(&t.description)
            .bind(t.status.as_str())
            .bind(t.priority.as_str())
            .bind(&t.teeth_involved)
            .bind(&t.quadrants)
            .bind(&t.progress_notes)
            .bind(&t.current_stage)
            .bind(t.total_stages)
            .bind(t.estimated_cost)
            .bind(t.actual_cost)
            .bind(t.started_at)
            .bind(t.completed_at)
            .bind(t.updated_at)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        map_treatment(&row)
    }

    async fn add_item(
        &self,
        tenant_id: Uuid,
        item: &NewTreatmentItem,
    ) -> anyhow::Result<TreatmentItem> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"INSERT INTO treatment_items (tenant_id, treatment_id, service_id, quantity,
                   unit_price, status, tooth_number, surface, notes)
               VALUES ($1, $2, $3, $4, $5::numeric, 'planned', $6, $7, $8)
               RETURNING {ITEM_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(item.treatment_id)
            .bind(item.service_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(&item.tooth_number)
            .bind(&item.surface)
            .bind(&item.notes)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        map_item(&row)
    }

    async fn items(
        &self,
        tenant_id: Uuid,
        treatment_id: Uuid,
    ) -> anyhow::Result<Vec<TreatmentItem>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {ITEM_COLUMNS} FROM treatment_items
               WHERE tenant_id = $1 AND treatment_id = $2
               ORDER BY created_at"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(treatment_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_item).collect()
    }
}
