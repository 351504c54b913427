use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{MANAGERS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::catalog_repository::{
    CatalogRepository, CategorySummary, NewService, ServiceQuery,
};
use crate::application::services::validation::required;
use crate::domain::catalog::{DentalService, ServiceCategory, ServiceStatus};
use crate::domain::money::round_cents;

fn check_pricing(base_price: f64, tax_rate: f64, duration_minutes: i32) -> ServiceResult<()> {
    if base_price < 0.0 {
        return Err(ServiceError::validation("Base price cannot be negative"));
    }
    if !(0.0..=100.0).contains(&tax_rate) {
        return Err(ServiceError::validation("Tax rate must be between 0 and 100"));
    }
    if duration_minutes <= 0 {
        return Err(ServiceError::validation("Duration must be positive"));
    }
    Ok(())
}

pub struct CreateService<'a, R: CatalogRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: CatalogRepository + ?Sized> CreateService<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        service: &NewService,
    ) -> ServiceResult<DentalService> {
        require_roles(principal, MANAGERS)?;
        required("Code", &service.code)?;
        required("Name", &service.name)?;
        check_pricing(service.base_price, service.tax_rate, service.duration_minutes)?;
        let mut service = service.clone();
        service.code = service.code.trim().to_uppercase();
        service.base_price = round_cents(service.base_price);
        if self
            .repo
            .find_by_code(principal.tenant_id, &service.code)
            .await?
            .is_some()
        {
            return Err(ServiceError::conflict("Service with this code already exists"));
        }
        Ok(self.repo.create(principal.tenant_id, &service).await?)
    }
}

pub struct ListServices<'a, R: CatalogRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: CatalogRepository + ?Sized> ListServices<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        query: &ServiceQuery,
    ) -> ServiceResult<Vec<DentalService>> {
        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(ServiceError::validation("min_price cannot exceed max_price"));
            }
        }
        Ok(self.repo.list(principal.tenant_id, query).await?)
    }
}

pub struct GetService<'a, R: CatalogRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: CatalogRepository + ?Sized> GetService<'a, R> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<DentalService> {
        self.repo
            .find_by_id(principal.tenant_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Service"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceChanges {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ServiceCategory>,
    pub base_price: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub status: Option<ServiceStatus>,
    pub is_taxable: Option<bool>,
    pub tax_rate: Option<f64>,
    pub requirements: Option<serde_json::Value>,
    pub materials: Option<serde_json::Value>,
}

pub struct UpdateService<'a, R: CatalogRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: CatalogRepository + ?Sized> UpdateService<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: &ServiceChanges,
        now: DateTime<Utc>,
    ) -> ServiceResult<DentalService> {
        require_roles(principal, MANAGERS)?;
        let tenant_id = principal.tenant_id;
        let mut service = self
            .repo
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Service"))?;
        if let Some(code) = changes.code.as_deref() {
            let code = code.trim().to_uppercase();
            if code != service.code
                && self.repo.find_by_code(tenant_id, &code).await?.is_some()
            {
                return Err(ServiceError::conflict("Service with this code already exists"));
            }
            service.code = code;
        }
        if let Some(name) = changes.name.as_deref() {
            required("Name", name)?;
            service.name = name.trim().to_string();
        }
        if changes.description.is_some() {
            service.description = changes.description.clone();
        }
        if let Some(c) = changes.category {
            service.category = c;
        }
        if let Some(p) = changes.base_price {
            service.base_price = round_cents(p);
        }
        if let Some(d) = changes.duration_minutes {
            service.duration_minutes = d;
        }
        if let Some(s) = changes.status {
            service.status = s;
        }
        if let Some(t) = changes.is_taxable {
            service.is_taxable = t;
        }
        if let Some(r) = changes.tax_rate {
            service.tax_rate = r;
        }
        if changes.requirements.is_some() {
            service.requirements = changes.requirements.clone();
        }
        if changes.materials.is_some() {
            service.materials = changes.materials.clone();
        }
        check_pricing(service.base_price, service.tax_rate, service.duration_minutes)?;
        service.updated_at = now;
        Ok(self.repo.save(tenant_id, &service).await?)
    }
}

pub struct DeactivateService<'a, R: CatalogRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: CatalogRepository + ?Sized> DeactivateService<'a, R> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<DentalService> {
        UpdateService { repo: self.repo }
            .execute(
                principal,
                id,
                &ServiceChanges {
                    status: Some(ServiceStatus::Inactive),
                    ..ServiceChanges::default()
                },
                now,
            )
            .await
    }
}

pub struct CategoriesSummary<'a, R: CatalogRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: CatalogRepository + ?Sized> CategoriesSummary<'a, R> {
    pub async fn execute(&self, principal: &Principal) -> ServiceResult<Vec<CategorySummary>> {
        Ok(self.repo.category_summary(principal.tenant_id).await?)
    }
}
