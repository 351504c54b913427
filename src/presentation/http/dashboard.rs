use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::application::ports::reporting_repository::{DashboardStats, MonthlyRevenue};
use crate::application::use_cases::dashboard::overview::{
    AppointmentsOverviewQuery, DEFAULT_OVERVIEW_DAYS, DEFAULT_REVENUE_MONTHS,
    DashboardStatsQuery, RevenueOverview,
};
use crate::bootstrap::app_context::AppContext;
use crate::infrastructure::cache::tenant_key;
use crate::presentation::http::appointments::AppointmentResponse;
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardStatsResponse {
    pub total_patients: i64,
    pub total_appointments: i64,
    pub total_invoices: i64,
    pub monthly_revenue: f64,
    pub pending_appointments: i64,
    pub overdue_invoices: i64,
}

impl From<DashboardStats> for DashboardStatsResponse {
    fn from(s: DashboardStats) -> Self {
        Self {
            total_patients: s.total_patients,
            total_appointments: s.total_appointments,
            total_invoices: s.total_invoices,
            monthly_revenue: s.monthly_revenue,
            pending_appointments: s.pending_appointments,
            overdue_invoices: s.overdue_invoices,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AppointmentsOverviewResponse {
    pub period_days: i64,
    pub total_appointments: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub upcoming: Vec<AppointmentResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyRevenueResponse {
    pub month: String,
    pub revenue: f64,
    pub invoices_paid: i64,
}

impl From<MonthlyRevenue> for MonthlyRevenueResponse {
    fn from(m: MonthlyRevenue) -> Self {
        Self {
            month: m.month,
            revenue: m.revenue,
            invoices_paid: m.invoices_paid,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevenueOverviewResponse {
    pub months: u32,
    pub total_revenue: f64,
    pub monthly: Vec<MonthlyRevenueResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OverviewQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RevenueQuery {
    pub months: Option<u32>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/dashboard/appointments-overview", get(appointments_overview))
        .route("/dashboard/revenue-overview", get(revenue_overview))
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/dashboard/stats", tag = "Dashboard",
    responses((status = 200, body = DashboardStatsResponse)))]
pub async fn dashboard_stats(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<Json<DashboardStatsResponse>> {
    let key = tenant_key(current.principal.tenant_id, "dashboard", "stats");
    let cache = ctx.cache();
    if let Some(hit) = cache.get_json(&key).await {
        if let Ok(stats) = serde_json::from_value::<DashboardStatsResponse>(hit) {
            return Ok(Json(stats));
        }
    }

    let repo = ctx.reporting_repo();
    let uc = DashboardStatsQuery {
        reporting: repo.as_ref(),
    };
    let stats = DashboardStatsResponse::from(uc.execute(&current.principal, Utc::now()).await?);
    if let Ok(value) = serde_json::to_value(&stats) {
        cache
            .set_json(&key, &value, ctx.cfg.cache_default_ttl_secs)
            .await;
    }
    Ok(Json(stats))
}

#[utoipa::path(get, path = "/api/v2/dashboard/appointments-overview", tag = "Dashboard", params(OverviewQuery),
    responses((status = 200, body = AppointmentsOverviewResponse)))]
pub async fn appointments_overview(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<OverviewQuery>,
) -> ApiResult<Json<AppointmentsOverviewResponse>> {
    let reporting = ctx.reporting_repo();
    let appointments = ctx.appointment_repo();
    let uc = AppointmentsOverviewQuery {
        reporting: reporting.as_ref(),
        appointments: appointments.as_ref(),
    };
    let dash = uc
        .execute(
            &current.principal,
            q.days.unwrap_or(DEFAULT_OVERVIEW_DAYS),
            Utc::now(),
        )
        .await?;
    Ok(Json(AppointmentsOverviewResponse {
        period_days: dash.period_days,
        total_appointments: dash.overview.total,
        by_status: dash.overview.by_status.into_iter().collect(),
        by_type: dash.overview.by_type.into_iter().collect(),
        upcoming: dash.upcoming.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(get, path = "/api/v2/dashboard/revenue-overview", tag = "Dashboard", params(RevenueQuery),
    responses((status = 200, body = RevenueOverviewResponse), (status = 403)))]
pub async fn revenue_overview(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<RevenueQuery>,
) -> ApiResult<Json<RevenueOverviewResponse>> {
    let repo = ctx.reporting_repo();
    let uc = RevenueOverview {
        reporting: repo.as_ref(),
    };
    let months = q.months.unwrap_or(DEFAULT_REVENUE_MONTHS);
    let rows = uc.execute(&current.principal, months, Utc::now()).await?;
    let total: f64 = rows.iter().map(|m| m.revenue).sum();
    Ok(Json(RevenueOverviewResponse {
        months,
        total_revenue: crate::domain::money::round_cents(total),
        monthly: rows.into_iter().map(Into::into).collect(),
    }))
}
