use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::appointment_repository::{
    AppointmentQuery, AppointmentRepository, NewAppointment, SlotWrite,
};
use crate::domain::appointments::{Appointment, AppointmentStatus, conflict_window};
use crate::infrastructure::db::{PgPool, begin_tenant_tx, text_col};

const APPOINTMENT_COLUMNS: &str = r#"id, tenant_id, patient_id, dentist_id, appointment_date,
    duration_minutes, appointment_type, status, reason, notes, created_by, created_at, updated_at,
    confirmed_at, completed_at, cancelled_at, cancellation_reason"#;

pub struct SqlxAppointmentRepository {
    pub pool: PgPool,
}

impl SqlxAppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_appointment(r: &PgRow) -> anyhow::Result<Appointment> {
    Ok(Appointment {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        patient_id: r.get("patient_id"),
        dentist_id: r.get("dentist_id"),
        appointment_date: r.get("appointment_date"),
        duration_minutes: r.get("duration_minutes"),
        appointment_type: text_col(r, "appointment_type")?,
        status: text_col(r, "status")?,
        reason: r.get("reason"),
        notes: r.get("notes"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        confirmed_at: r.get("confirmed_at"),
        completed_at: r.get("completed_at"),
        cancelled_at: r.get("cancelled_at"),
        cancellation_reason: r.get("cancellation_reason"),
    })
}

fn status_texts(statuses: &[AppointmentStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Takes the dentist's calendar lock for the rest of the transaction, then looks for a blocking
/// booking that collides with `start`.
async fn lock_and_find_conflict(
    conn: &mut sqlx::PgConnection,
    tenant_id: Uuid,
    dentist_id: Uuid,
    start: DateTime<Utc>,
    duration_minutes: i32,
    exclude: Option<Uuid>,
) -> anyhow::Result<Option<Appointment>> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("appointments:{tenant_id}:{dentist_id}"))
        .execute(&mut *conn)
        .await?;
    let (from, to) = conflict_window(start, duration_minutes);
    let sql = format!(
        r#"SELECT {APPOINTMENT_COLUMNS} FROM appointments
           WHERE tenant_id = $1 AND dentist_id = $2
             AND status = ANY($3)
             AND appointment_date >= $4 AND appointment_date <= $5
             AND ($6::uuid IS NULL OR id <> $6)
           ORDER BY appointment_date
           LIMIT 1"#
    );
    let row = sqlx::query(&sql)
        .bind(tenant_id)
        .bind(dentist_id)
        .bind(status_texts(&AppointmentStatus::BLOCKING))
        .bind(from)
        .bind(to)
        .bind(exclude)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_appointment).transpose()
}

async fn update_in_tx(
    conn: &mut sqlx::PgConnection,
    tenant_id: Uuid,
    a: &Appointment,
) -> anyhow::Result<Appointment> {
    let sql = format!(
        r#"UPDATE appointments SET
               patient_id = $3, dentist_id = $4, appointment_date = $5,
               duration_minutes = $6, appointment_type = $7, status = $8, reason = $9,
               notes = $10, confirmed_at = $11, completed_at = $12, cancelled_at = $13,
               cancellation_reason = $14, updated_at = $15
           WHERE tenant_id = $1 AND id = $2
           RETURNING {APPOINTMENT_COLUMNS}"#
    );
    let row = sqlx::query(&sql)
        .bind(tenant_id)
        .bind(a.id)
        .bind(a.patient_id)
        .bind(a.dentist_id)
        .bind(a.appointment_date)
        .bind(a.duration_minutes)
        .bind(a.appointment_type.as_str())
        .bind(a.status.as_str())
        .bind(&a.reason)
        .bind(&a.notes)
        .bind(a.confirmed_at)
        .bind(a.completed_at)
        .bind(a.cancelled_at)
        .bind(&a.cancellation_reason)
        .bind(a.updated_at)
        .fetch_one(&mut *conn)
        .await?;
    map_appointment(&row)
}

#[async_trait]
impl AppointmentRepository for SqlxAppointmentRepository {
    async fn create(&self, tenant_id: Uuid, a: &NewAppointment) -> anyhow::Result<SlotWrite> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        if let Some(other) = lock_and_find_conflict(
            &mut tx,
            tenant_id,
            a.dentist_id,
            a.appointment_date,
            a.duration_minutes,
            None,
        )
        .await?
        {
            return Ok(SlotWrite::Conflict(other));
        }
        let sql = format!(
            r#"INSERT INTO appointments (tenant_id, patient_id, dentist_id, appointment_date,
                   duration_minutes, appointment_type, status, reason, notes, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, 'scheduled', $7, $8, $9)
               RETURNING {APPOINTMENT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(a.patient_id)
            .bind(a.dentist_id)
            .bind(a.appointment_date)
            .bind(a.duration_minutes)
            .bind(a.appointment_type.as_str())
            .bind(&a.reason)
            .bind(&a.notes)
            .bind(a.created_by)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(SlotWrite::Written(map_appointment(&row)?))
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Appointment>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE tenant_id = $1 AND id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_appointment).transpose()
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        q: &AppointmentQuery,
    ) -> anyhow::Result<Vec<Appointment>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {APPOINTMENT_COLUMNS} FROM appointments
               WHERE tenant_id = $1
                 AND ($2::uuid IS NULL OR patient_id = $2)
                 AND ($3::uuid IS NULL OR dentist_id = $3)
                 AND ($4::text IS NULL OR status = $4)
                 AND ($5::timestamptz IS NULL OR appointment_date >= $5)
                 AND ($6::timestamptz IS NULL OR appointment_date <= $6)
               ORDER BY appointment_date
               OFFSET $7 LIMIT $8"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(q.patient_id)
            .bind(q.dentist_id)
            .bind(q.status.map(|s| s.as_str()))
            .bind(q.date_from)
            .bind(q.date_to)
            .bind(q.page.skip)
            .bind(q.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_appointment).collect()
    }

    async fn for_dentist_between(
        &self,
        tenant_id: Uuid,
        dentist_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> anyhow::Result<Vec<Appointment>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {APPOINTMENT_COLUMNS} FROM appointments
               WHERE tenant_id = $1 AND dentist_id = $2
                 AND status = ANY($3)
                 AND appointment_date >= $4 AND appointment_date < $5
               ORDER BY appointment_date"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(dentist_id)
            .bind(status_texts(statuses))
            .bind(from)
            .bind(to)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_appointment).collect()
    }

    async fn upcoming(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Appointment>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {APPOINTMENT_COLUMNS} FROM appointments
               WHERE tenant_id = $1
                 AND status = ANY($2)
                 AND appointment_date >= $3 AND appointment_date <= $4
               ORDER BY appointment_date"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(status_texts(&AppointmentStatus::UPCOMING))
            .bind(from)
            .bind(to)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_appointment).collect()
    }

    async fn reschedule(&self, tenant_id: Uuid, a: &Appointment) -> anyhow::Result<SlotWrite> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        if let Some(other) = lock_and_find_conflict(
            &mut tx,
            tenant_id,
            a.dentist_id,
            a.appointment_date,
            a.duration_minutes,
            Some(a.id),
        )
        .await?
        {
            return Ok(SlotWrite::Conflict(other));
        }
        let saved = update_in_tx(&mut tx, tenant_id, a).await?;
        tx.commit().await?;
        Ok(SlotWrite::Written(saved))
    }

    async fn save(&self, tenant_id: Uuid, a: &Appointment) -> anyhow::Result<Appointment> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let saved = update_in_tx(&mut tx, tenant_id, a).await?;
        tx.commit().await?;
        Ok(saved)
    }
}
