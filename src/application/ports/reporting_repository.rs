use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    pub total_patients: i64,
    pub total_appointments: i64,
    pub total_invoices: i64,
    pub monthly_revenue: f64,
    pub pending_appointments: i64,
    pub overdue_invoices: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentsOverview {
    pub total: i64,
    pub by_status: Vec<(String, i64)>,
    pub by_type: Vec<(String, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`.
    pub month: String,
    pub revenue: f64,
    pub invoices_paid: i64,
}

#[async_trait]
pub trait ReportingRepository: Send + Sync {
    async fn dashboard_stats(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DashboardStats>;
    async fn appointments_overview(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> anyhow::Result<AppointmentsOverview>;
    async fn revenue_by_month(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MonthlyRevenue>>;
}
