use chrono::NaiveDate;

use crate::application::access::Principal;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::Page;
use crate::application::ports::patient_repository::{PatientQuery, PatientRepository};
use crate::domain::patients::{Patient, PatientStatus, birth_date_bounds};
use crate::domain::users::Gender;

#[derive(Debug, Clone, Default)]
pub struct PatientFilters {
    pub search: Option<String>,
    pub status: Option<PatientStatus>,
    pub gender: Option<Gender>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub page: Page,
}

pub struct SearchPatients<'a, R: PatientRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: PatientRepository + ?Sized> SearchPatients<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        filters: &PatientFilters,
        today: NaiveDate,
    ) -> ServiceResult<Vec<Patient>> {
        if let (Some(min), Some(max)) = (filters.min_age, filters.max_age) {
            if min > max {
                return Err(ServiceError::validation("min_age cannot exceed max_age"));
            }
        }
        let (born_on_or_after, born_on_or_before) =
            birth_date_bounds(today, filters.min_age, filters.max_age);
        let query = PatientQuery {
            search: filters
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            status: filters.status,
            gender: filters.gender,
            born_on_or_after,
            born_on_or_before,
            page: filters.page,
        };
        Ok(self.repo.search(principal.tenant_id, &query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::domain::users::StaffRole;

    #[tokio::test]
    async fn inverted_age_range_is_rejected() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let user = store.seed_user(tenant.id, "r@clinic.test", StaffRole::Receptionist);
        let filters = PatientFilters {
            min_age: Some(60),
            max_age: Some(20),
            ..PatientFilters::default()
        };
        let err = SearchPatients { repo: &store }
            .execute(&store.principal_for(&user), &filters, chrono::Utc::now().date_naive())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn search_matches_name_case_insensitively() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let user = store.seed_user(tenant.id, "r@clinic.test", StaffRole::Receptionist);
        store.seed_patient(tenant.id, "Lena", "Okafor", user.id);
        store.seed_patient(tenant.id, "Marco", "Ricci", user.id);
        let filters = PatientFilters {
            search: Some("  okaf ".into()),
            ..PatientFilters::default()
        };
        let found = SearchPatients { repo: &store }
            .execute(&store.principal_for(&user), &filters, chrono::Utc::now().date_naive())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_name, "Okafor");
    }
}
