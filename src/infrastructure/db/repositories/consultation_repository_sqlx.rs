use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::consultation_repository::{
    ConsultationQuery, ConsultationRepository, NewConsultation,
};
use crate::domain::consultations::Consultation;
use crate::infrastructure::db::{PgPool, begin_tenant_tx};

const CONSULTATION_COLUMNS: &str = r#"id, tenant_id, appointment_id, patient_id, dentist_id,
    chief_complaint, medical_history_review, dental_history_review, extraoral_findings,
    intraoral_findings, periodontal_assessment, occlusion_assessment, diagnosis, treatment_plan,
    recommendations, consultation_fee::float8 AS consultation_fee, next_appointment_date,
    created_at, updated_at"#;

pub struct SqlxConsultationRepository {
    pub pool: PgPool,
}

impl SqlxConsultationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_consultation(r: &PgRow) -> Consultation {
    Consultation {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        appointment_id: r.get("appointment_id"),
        patient_id: r.get("patient_id"),
        dentist_id: r.get("dentist_id"),
        chief_complaint: r.get("chief_complaint"),
        medical_history_review: r.get("medical_history_review"),
        dental_history_review: r.get("dental_history_review"),
        extraoral_findings: r.get("extraoral_findings"),
        intraoral_findings: r.get("intraoral_findings"),
        periodontal_assessment: r.get("periodontal_assessment"),
        occlusion_assessment: r.get("occlusion_assessment"),
        diagnosis: r.get("diagnosis"),
        treatment_plan: r.get("treatment_plan"),
        recommendations: r.get("recommendations"),
        consultation_fee: r.get("consultation_fee"),
        next_appointment_date: r.get("next_appointment_date"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

#[async_trait]
impl ConsultationRepository for SqlxConsultationRepository {
    async fn create(&self, tenant_id: Uuid, c: &NewConsultation) -> anyhow::Result<Consultation> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"INSERT INTO consultations (tenant_id, appointment_id, patient_id, dentist_id,
                   chief_complaint, medical_history_review, dental_history_review,
                   extraoral_findings, intraoral_findings, periodontal_assessment,
                   occlusion_assessment, diagnosis, treatment_plan, recommendations,
                   consultation_fee, next_appointment_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                       $15::numeric, $16)
               RETURNING {CONSULTATION_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(c.appointment_id)
            .bind(c.patient_id)
            .bind(c.dentist_id)
            .bind(&c.chief_complaint)
            .bind(&c.medical_history_review)
            .bind(&c.dental_history_review)
            .bind(&c.extraoral_findings)
            .bind(&c.intraoral_findings)
            .bind(&c.periodontal_assessment)
            .bind(&c.occlusion_assessment)
            .bind(&c.diagnosis)
            .bind(&c.treatment_plan)
            .bind(&c.recommendations)
            .bind(c.consultation_fee)
            .bind(c.next_appointment_date)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(map_consultation(&row))
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Consultation>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            "SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE tenant_id = $1 AND id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.as_ref().map(map_consultation))
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        q: &ConsultationQuery,
    ) -> anyhow::Result<Vec<Consultation>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {CONSULTATION_COLUMNS} FROM consultations
               WHERE tenant_id = $1
                 AND ($2::uuid IS NULL OR patient_id = $2)
                 AND ($3::uuid IS NULL OR dentist_id = $3)
               ORDER BY created_at DESC
               OFFSET $4 LIMIT $5"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(q.patient_id)
            .bind(q.dentist_id)
            .bind(q.page.skip)
            .bind(q.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows.iter().map(map_consultation).collect())
    }

    async fn save(&self, tenant_id: Uuid, c: &Consultation) -> anyhow::Result<Consultation> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE consultations SET
                   appointment_id = $3, chief_complaint = $4, medical_history_review = $5,
                   dental_history_review = $6, extraoral_findings = $7,
                   intraoral_findings = $8, periodontal_assessment = $9,
                   occlusion_assessment = $10, diagnosis = $11, treatment_plan = $12,
                   recommendations = $13, consultation_fee = $14::numeric,
                   next_appointment_date = $15, updated_at = $16
               WHERE tenant_id = $1 AND id = $2
               RETURNING {CONSULTATION_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(c.id)
            .bind(c.appointment_id)
            .bind(&c.chief_complaint)
            .bind(&c.medical_history_review)
            .bind(&c.dental_history_review)
            .bind(&c.extraoral_findings)
            .bind(&c.intraoral_findings)
            .bind(&c.periodontal_assessment)
            .bind(&c.occlusion_assessment)
            .bind(&c.diagnosis)
            .bind(&c.treatment_plan)
            .bind(&c.recommendations)
            .bind(c.consultation_fee)
            .bind(c.next_appointment_date)
            .bind(c.updated_at)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(map_consultation(&row))
    }
}
