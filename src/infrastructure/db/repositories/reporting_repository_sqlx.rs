use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::application::ports::reporting_repository::{
    AppointmentsOverview, DashboardStats, MonthlyRevenue, ReportingRepository,
};
use crate::infrastructure::db::{PgPool, begin_tenant_tx};

pub struct SqlxReportingRepository {
    pub pool: PgPool,
}

impl SqlxReportingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportingRepository for SqlxReportingRepository {
    async fn dashboard_stats(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DashboardStats> {
        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let today_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(now);
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let row = sqlx::query(
            r#"SELECT
                   (SELECT COUNT(*) FROM patients
                     WHERE tenant_id = $1 AND status = 'active') AS total_patients,
                   (SELECT COUNT(*) FROM appointments
                     WHERE tenant_id = $1 AND appointment_date >= $2) AS total_appointments,
                   (SELECT COUNT(*) FROM invoices
                     WHERE tenant_id = $1 AND issue_date >= $2) AS total_invoices,
                   (SELECT COALESCE(SUM(total_amount), 0)::float8 FROM invoices
                     WHERE tenant_id = $1 AND status = 'paid' AND paid_date >= $3)
                     AS monthly_revenue,
                   (SELECT COUNT(*) FROM appointments
                     WHERE tenant_id = $1 AND status IN ('scheduled', 'confirmed')
                       AND appointment_date >= $4) AS pending_appointments,
                   (SELECT COUNT(*) FROM invoices
                     WHERE tenant_id = $1 AND status IN ('sent', 'partial')
                       AND due_date < $5) AS overdue_invoices"#,
        )
        .bind(tenant_id)
        .bind(now - Duration::days(30))
        .bind(month_start)
        .bind(today_start)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(DashboardStats {
            total_patients: row.get("total_patients"),
            total_appointments: row.get("total_appointments"),
            total_invoices: row.get("total_invoices"),
            monthly_revenue: row.get("monthly_revenue"),
            pending_appointments: row.get("pending_appointments"),
            overdue_invoices: row.get("overdue_invoices"),
        })
    }

    async fn appointments_overview(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> anyhow::Result<AppointmentsOverview> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let by_status = sqlx::query(
            r#"SELECT status AS label, COUNT(*) AS n FROM appointments
               WHERE tenant_id = $1 AND appointment_date >= $2
               GROUP BY status ORDER BY status"#,
        )
        .bind(tenant_id)
        .bind(since)
        .fetch_all(&mut *tx)
        .await?;
        let by_type = sqlx::query(
            r#"SELECT appointment_type AS label, COUNT(*) AS n FROM appointments
               WHERE tenant_id = $1 AND appointment_date >= $2
               GROUP BY appointment_type ORDER BY appointment_type"#,
        )
        .bind(tenant_id)
        .bind(since)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        let pairs = |rows: Vec<sqlx::postgres::PgRow>| -> Vec<(String, i64)> {
            rows.iter().map(|r| (r.get("label"), r.get("n"))).collect()
        };
        let by_status = pairs(by_status);
        Ok(AppointmentsOverview {
            total: by_status.iter().map(|(_, n)| n).sum(),
            by_status,
            by_type: pairs(by_type),
        })
    }

    async fn revenue_by_month(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MonthlyRevenue>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let rows = sqlx::query(
            r#"SELECT to_char(paid_date AT TIME ZONE 'UTC', 'YYYY-MM') AS month,
                      SUM(total_amount)::float8 AS revenue,
                      COUNT(*) AS invoices_paid
               FROM invoices
               WHERE tenant_id = $1 AND status = 'paid' AND paid_date >= $2
               GROUP BY 1
               ORDER BY 1"#,
        )
        .bind(tenant_id)
        .bind(since)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows
            .iter()
            .map(|r| MonthlyRevenue {
                month: r.get("month"),
                revenue: r.get("revenue"),
                invoices_paid: r.get("invoices_paid"),
            })
            .collect())
    }
}
