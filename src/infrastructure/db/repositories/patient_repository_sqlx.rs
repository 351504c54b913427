use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::patient_repository::{
    DentistAssignment, NewPatient, PatientPatch, PatientQuery, PatientRepository,
};
use crate::domain::patients::{AssignmentCount, Patient};
use crate::infrastructure::crypto;
use crate::infrastructure::db::{PgPool, begin_tenant_tx, like_pattern, text_col};

const PATIENT_COLUMNS: &str = r#"id, tenant_id, first_name, last_name, date_of_birth, gender,
    contact_number, email, address, emergency_contact_name, emergency_contact_phone,
    medical_history, dental_history, insurance_info, status, preferences, created_by, updated_by,
    created_at, updated_at, last_visit_at, assigned_dentist_id, assigned_at, assignment_reason"#;

/// Patient rows; `insurance_info` is sealed with the file encryption key before it is written.
pub struct SqlxPatientRepository {
    pub pool: PgPool,
    encryption_key: String,
}

impl SqlxPatientRepository {
    pub fn new(pool: PgPool, encryption_key: impl Into<String>) -> Self {
        Self {
            pool,
            encryption_key: encryption_key.into(),
        }
    }

    fn seal(&self, info: Option<&serde_json::Value>) -> anyhow::Result<Option<String>> {
        info.map(|v| crypto::encrypt_json(&self.encryption_key, v))
            .transpose()
    }

    fn map_patient(&self, r: &PgRow) -> anyhow::Result<Patient> {
        let sealed: Option<String> = r.get("insurance_info");
        let insurance_info = sealed
            .map(|s| crypto::decrypt_json(&self.encryption_key, &s))
            .transpose()?;
        Ok(Patient {
            id: r.get("id"),
            tenant_id: r.get("tenant_id"),
            first_name: r.get("first_name"),
            last_name: r.get("last_name"),
            date_of_birth: r.get("date_of_birth"),
            gender: text_col(r, "gender")?,
            contact_number: r.get("contact_number"),
            email: r.get("email"),
            address: r.get("address"),
            emergency_contact_name: r.get("emergency_contact_name"),
            emergency_contact_phone: r.get("emergency_contact_phone"),
            medical_history: r.get("medical_history"),
            dental_history: r.get("dental_history"),
            insurance_info,
            status: text_col(r, "status")?,
            preferences: r.get("preferences"),
            created_by: r.get("created_by"),
            updated_by: r.get("updated_by"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
            last_visit_at: r.get("last_visit_at"),
            assigned_dentist_id: r.get("assigned_dentist_id"),
            assigned_at: r.get("assigned_at"),
            assignment_reason: r.get("assignment_reason"),
        })
    }
}

#[async_trait]
impl PatientRepository for SqlxPatientRepository {
    async fn create(&self, tenant_id: Uuid, p: &NewPatient) -> anyhow::Result<Patient> {
        let insurance = self.seal(p.insurance_info.as_ref())?;
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"INSERT INTO patients (tenant_id, first_name, last_name, date_of_birth, gender,
                   contact_number, email, address, emergency_contact_name,
                   emergency_contact_phone, medical_history, dental_history, insurance_info,
                   preferences, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, lower($7), $8, $9, $10, $11, $12, $13, $14, $15)
               RETURNING {PATIENT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(&p.first_name)
            .bind(&p.last_name)
            .bind(p.date_of_birth)
            .bind(p.gender.as_str())
            .bind(&p.contact_number)
            .bind(&p.email)
            .bind(&p.address)
            .bind(&p.emergency_contact_name)
            .bind(&p.emergency_contact_phone)
            .bind(&p.medical_history)
            .bind(&p.dental_history)
            .bind(insurance)
            .bind(&p.preferences)
            .bind(p.created_by)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        self.map_patient(&row)
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Patient>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql =
            format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(|r| self.map_patient(r)).transpose()
    }

    async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> anyhow::Result<Option<Patient>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE tenant_id = $1 AND email = lower($2)"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(|r| self.map_patient(r)).transpose()
    }

    async fn search(&self, tenant_id: Uuid, q: &PatientQuery) -> anyhow::Result<Vec<Patient>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {PATIENT_COLUMNS} FROM patients
               WHERE tenant_id = $1
                 AND ($2::text IS NULL
                      OR first_name ILIKE $2 OR last_name ILIKE $2
                      OR email ILIKE $2 OR contact_number ILIKE $2)
                 AND ($3::text IS NULL OR status = $3)
                 AND ($4::text IS NULL OR gender = $4)
                 AND ($5::date IS NULL OR date_of_birth >= $5)
                 AND ($6::date IS NULL OR date_of_birth <= $6)
               ORDER BY last_name, first_name
               OFFSET $7 LIMIT $8"#
        );
        let pattern = q
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(pattern)
            .bind(q.status.map(|s| s.as_str()))
            .bind(q.gender.map(|g| g.as_str()))
            .bind(q.born_on_or_after)
            .bind(q.born_on_or_before)
            .bind(q.page.skip)
            .bind(q.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(|r| self.map_patient(r)).collect()
    }

    async fn count(&self, tenant_id: Uuid) -> anyhow::Result<i64> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let row = sqlx::query("SELECT COUNT(*) AS n FROM patients WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.get("n"))
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: &PatientPatch,
        updated_by: Uuid,
    ) -> anyhow::Result<Option<Patient>> {
        let insurance = self.seal(patch.insurance_info.as_ref())?;
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE patients SET
                   first_name = COALESCE($3, first_name),
                   last_name = COALESCE($4, last_name),
                   date_of_birth = COALESCE($5, date_of_birth),
                   gender = COALESCE($6, gender),
                   contact_number = COALESCE($7, contact_number),
                   email = COALESCE(lower($8), email),
                   address = COALESCE($9, address),
                   emergency_contact_name = COALESCE($10, emergency_contact_name),
                   emergency_contact_phone = COALESCE($11, emergency_contact_phone),
                   medical_history = COALESCE($12, medical_history),
                   dental_history = COALESCE($13, dental_history),
                   insurance_info = COALESCE($14, insurance_info),
                   status = COALESCE($15, status),
                   preferences = COALESCE($16, preferences),
                   updated_by = $17,
                   updated_at = now()
               WHERE tenant_id = $1 AND id = $2
               RETURNING {PATIENT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(&patch.first_name)
            .bind(&patch.last_name)
            .bind(patch.date_of_birth)
            .bind(patch.gender.map(|g| g.as_str()))
            .bind(&patch.contact_number)
            .bind(&patch.email)
            .bind(&patch.address)
            .bind(&patch.emergency_contact_name)
            .bind(&patch.emergency_contact_phone)
            .bind(&patch.medical_history)
            .bind(&patch.dental_history)
            .bind(insurance)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(&patch.preferences)
            .bind(updated_by)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(|r| self.map_patient(r)).transpose()
    }

    async fn set_assigned_dentist(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
        a: &DentistAssignment,
    ) -> anyhow::Result<Option<Patient>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE patients SET
                   assigned_dentist_id = $3,
                   assigned_at = CASE WHEN $3::uuid IS NULL THEN NULL ELSE $5 END,
                   assignment_reason = CASE WHEN $3::uuid IS NULL THEN NULL ELSE $6 END,
                   updated_by = $7,
                   updated_at = $5
               WHERE tenant_id = $1 AND id = $2
                 AND assigned_dentist_id IS NOT DISTINCT FROM $4
               RETURNING {PATIENT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(patient_id)
            .bind(a.dentist_id)
            .bind(a.expected)
            .bind(a.at)
            .bind(&a.reason)
            .bind(a.assigned_by)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(|r| self.map_patient(r)).transpose()
    }

    async fn assigned_to(
        &self,
        tenant_id: Uuid,
        dentist_id: Uuid,
        page: Page,
    ) -> anyhow::Result<Vec<Patient>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {PATIENT_COLUMNS} FROM patients
               WHERE tenant_id = $1 AND assigned_dentist_id = $2
               ORDER BY last_name, first_name
               OFFSET $3 LIMIT $4"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(dentist_id)
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(|r| self.map_patient(r)).collect()
    }

    async fn assignment_counts(&self, tenant_id: Uuid) -> anyhow::Result<Vec<AssignmentCount>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let rows = sqlx::query(
            r#"SELECT assigned_dentist_id, COUNT(*) AS n FROM patients
               WHERE tenant_id = $1 AND assigned_dentist_id IS NOT NULL AND status = 'active'
               GROUP BY assigned_dentist_id"#,
        )
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows
            .iter()
            .map(|r| AssignmentCount {
                dentist_id: r.get("assigned_dentist_id"),
                patients: r.get("n"),
            })
            .collect())
    }

    async fn touch_last_visit(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        sqlx::query("UPDATE patients SET last_visit_at = $3 WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
