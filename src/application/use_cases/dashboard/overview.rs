use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

use crate::application::access::{MANAGERS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::appointment_repository::AppointmentRepository;
use crate::application::ports::reporting_repository::{
    AppointmentsOverview, DashboardStats, MonthlyRevenue, ReportingRepository,
};
use crate::domain::appointments::Appointment;

pub const DEFAULT_OVERVIEW_DAYS: i64 = 30;
pub const DEFAULT_REVENUE_MONTHS: u32 = 6;
const UPCOMING_PREVIEW: usize = 5;

pub struct DashboardStatsQuery<'a, R: ReportingRepository + ?Sized> {
    pub reporting: &'a R,
}

impl<'a, R: ReportingRepository + ?Sized> DashboardStatsQuery<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> ServiceResult<DashboardStats> {
        Ok(self.reporting.dashboard_stats(principal.tenant_id, now).await?)
    }
}

#[derive(Debug, Clone)]
pub struct AppointmentsDashboard {
    pub period_days: i64,
    pub overview: AppointmentsOverview,
    pub upcoming: Vec<Appointment>,
}

pub struct AppointmentsOverviewQuery<'a, R, A>
where
    R: ReportingRepository + ?Sized,
    A: AppointmentRepository + ?Sized,
{
    pub reporting: &'a R,
    pub appointments: &'a A,
}

impl<'a, R, A> AppointmentsOverviewQuery<'a, R, A>
where
    R: ReportingRepository + ?Sized,
    A: AppointmentRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        days: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<AppointmentsDashboard> {
        if !(1..=365).contains(&days) {
            return Err(ServiceError::validation("days must be between 1 and 365"));
        }
        let overview = self
            .reporting
            .appointments_overview(principal.tenant_id, now - Duration::days(days))
            .await?;
        let mut upcoming = self
            .appointments
            .upcoming(principal.tenant_id, now, now + Duration::days(365))
            .await?;
        upcoming.truncate(UPCOMING_PREVIEW);
        Ok(AppointmentsDashboard {
            period_days: days,
            overview,
            upcoming,
        })
    }
}

/// First day of the month `months - 1` months before `now`, so the window covers `months`
/// calendar months including the current one.
pub fn revenue_window_start(now: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?;
    let start = first.checked_sub_months(Months::new(months.saturating_sub(1)))?;
    Some(start.and_hms_opt(0, 0, 0)?.and_utc())
}

pub struct RevenueOverview<'a, R: ReportingRepository + ?Sized> {
    pub reporting: &'a R,
}

impl<'a, R: ReportingRepository + ?Sized> RevenueOverview<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        months: u32,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<MonthlyRevenue>> {
        require_roles(principal, MANAGERS)?;
        if !(1..=24).contains(&months) {
            return Err(ServiceError::validation("months must be between 1 and 24"));
        }
        let since = revenue_window_start(now, months)
            .ok_or_else(|| ServiceError::validation("Invalid revenue window"))?;
        Ok(self
            .reporting
            .revenue_by_month(principal.tenant_id, since)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::access::tests::principal;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::domain::users::StaffRole;
    use chrono::TimeZone;

    #[test]
    fn window_starts_on_first_of_month() {
        let now = Utc.with_ymd_and_hms(2030, 3, 17, 15, 0, 0).unwrap();
        assert_eq!(
            revenue_window_start(now, 6),
            Some(Utc.with_ymd_and_hms(2029, 10, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            revenue_window_start(now, 1),
            Some(Utc.with_ymd_and_hms(2030, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn revenue_is_for_managers() {
        let store = MemoryStore::default();
        let uc = RevenueOverview { reporting: &store };
        let err = uc
            .execute(&principal(StaffRole::Dentist), 6, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(
            uc.execute(&principal(StaffRole::Manager), 25, Utc::now())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn overview_days_are_bounded() {
        let store = MemoryStore::default();
        let uc = AppointmentsOverviewQuery {
            reporting: &store,
            appointments: &store,
        };
        let p = principal(StaffRole::Receptionist);
        assert!(uc.execute(&p, 0, Utc::now()).await.is_err());
        assert!(uc.execute(&p, 366, Utc::now()).await.is_err());
        assert_eq!(uc.execute(&p, 30, Utc::now()).await.unwrap().period_days, 30);
    }
}
