use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{DENTISTS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::patient_repository::PatientRepository;
use crate::application::ports::treatment_repository::{
    NewTreatment, TreatmentQuery, TreatmentRepository,
};
use crate::application::ports::user_repository::UserRepository;
use crate::application::services::validation::required;
use crate::domain::treatments::{Treatment, TreatmentItem, TreatmentPriority, items_cost};

pub(crate) async fn load_treatment<T: TreatmentRepository + ?Sized>(
    repo: &T,
    tenant_id: Uuid,
    id: Uuid,
) -> ServiceResult<Treatment> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Treatment"))
}

pub struct CreateTreatment<'a, T, P, U>
where
    T: TreatmentRepository + ?Sized,
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    pub treatments: &'a T,
    pub patients: &'a P,
    pub users: &'a U,
}

impl<'a, T, P, U> CreateTreatment<'a, T, P, U>
where
    T: TreatmentRepository + ?Sized,
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        treatment: &NewTreatment,
    ) -> ServiceResult<Treatment> {
        require_roles(principal, DENTISTS)?;
        let tenant_id = principal.tenant_id;
        required("Name", &treatment.name)?;
        if treatment.total_stages < 1 {
            return Err(ServiceError::validation("Total stages must be at least 1"));
        }
        self.patients
            .find_by_id(tenant_id, treatment.patient_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Patient"))?;
        self.users
            .find_by_id(tenant_id, treatment.dentist_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Dentist"))?;
        Ok(self.treatments.create(tenant_id, treatment).await?)
    }
}

pub struct ListTreatments<'a, T: TreatmentRepository + ?Sized> {
    pub treatments: &'a T,
}

impl<'a, T: TreatmentRepository + ?Sized> ListTreatments<'a, T> {
    pub async fn execute(
        &self,
        principal: &Principal,
        query: &TreatmentQuery,
    ) -> ServiceResult<Vec<Treatment>> {
        Ok(self.treatments.list(principal.tenant_id, query).await?)
    }
}

pub struct GetTreatment<'a, T: TreatmentRepository + ?Sized> {
    pub treatments: &'a T,
}

impl<'a, T: TreatmentRepository + ?Sized> GetTreatment<'a, T> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<(Treatment, Vec<TreatmentItem>)> {
        let treatment = load_treatment(self.treatments, principal.tenant_id, id).await?;
        let items = self.treatments.items(principal.tenant_id, id).await?;
        Ok((treatment, items))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreatmentChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TreatmentPriority>,
    pub teeth_involved: Option<serde_json::Value>,
    pub quadrants: Option<serde_json::Value>,
    pub total_stages: Option<i32>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
}

pub struct UpdateTreatment<'a, T: TreatmentRepository + ?Sized> {
    pub treatments: &'a T,
}

impl<'a, T: TreatmentRepository + ?Sized> UpdateTreatment<'a, T> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: &TreatmentChanges,
        now: DateTime<Utc>,
    ) -> ServiceResult<Treatment> {
        require_roles(principal, DENTISTS)?;
        let mut t = load_treatment(self.treatments, principal.tenant_id, id).await?;
        if let Some(name) = changes.name.as_deref() {
            required("Name", name)?;
            t.name = name.trim().to_string();
        }
        if changes.description.is_some() {
            t.description = changes.description.clone();
        }
        if let Some(p) = changes.priority {
            t.priority = p;
        }
        if changes.teeth_involved.is_some() {
            t.teeth_involved = changes.teeth_involved.clone();
        }
        if changes.quadrants.is_some() {
            t.quadrants = changes.quadrants.clone();
        }
        if let Some(stages) = changes.total_stages {
            if stages < 1 {
                return Err(ServiceError::validation("Total stages must be at least 1"));
            }
            t.total_stages = stages;
        }
        if changes.estimated_cost.is_some() {
            t.estimated_cost = changes.estimated_cost;
        }
        if changes.actual_cost.is_some() {
            t.actual_cost = changes.actual_cost;
        }
        t.updated_at = now;
        Ok(self.treatments.save(principal.tenant_id, &t).await?)
    }
}

pub struct TreatmentCost<'a, T: TreatmentRepository + ?Sized> {
    pub treatments: &'a T,
}

impl<'a, T: TreatmentRepository + ?Sized> TreatmentCost<'a, T> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<f64> {
        let (_, items) = GetTreatment {
            treatments: self.treatments,
        }
        .execute(principal, id)
        .await?;
        Ok(items_cost(&items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::{MemoryStore, new_treatment};
    use crate::domain::users::StaffRole;

    #[tokio::test]
    async fn hygienist_cannot_plan_treatment() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let hygienist = store.seed_user(tenant.id, "h@clinic.test", StaffRole::Hygienist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", hygienist.id);
        let err = CreateTreatment {
            treatments: &store,
            patients: &store,
            users: &store,
        }
        .execute(
            &store.principal_for(&hygienist),
            &new_treatment(patient.id, hygienist.id),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let err = CreateTreatment {
            treatments: &store,
            patients: &store,
            users: &store,
        }
        .execute(
            &store.principal_for(&dentist),
            &new_treatment(Uuid::new_v4(), dentist.id),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
