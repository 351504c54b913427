use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{CHART_WRITERS, DENTISTS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::catalog_repository::CatalogRepository;
use crate::application::ports::treatment_repository::{NewTreatmentItem, TreatmentRepository};
use crate::application::services::validation::required;
use crate::application::use_cases::treatments::plan_treatment::load_treatment;
use crate::domain::treatments::{Treatment, TreatmentItem, TreatmentStatus, items_cost};

pub struct UpdateTreatmentStatus<'a, T: TreatmentRepository + ?Sized> {
    pub treatments: &'a T,
}

impl<'a, T: TreatmentRepository + ?Sized> UpdateTreatmentStatus<'a, T> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        status: TreatmentStatus,
        now: DateTime<Utc>,
    ) -> ServiceResult<Treatment> {
        require_roles(principal, DENTISTS)?;
        let mut t = load_treatment(self.treatments, principal.tenant_id, id).await?;
        t.apply_status(status, now);
        Ok(self.treatments.save(principal.tenant_id, &t).await?)
    }
}

pub struct AddProgressNote<'a, T: TreatmentRepository + ?Sized> {
    pub treatments: &'a T,
}

impl<'a, T: TreatmentRepository + ?Sized> AddProgressNote<'a, T> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        note: &str,
        stage: Option<&str>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Treatment> {
        require_roles(principal, CHART_WRITERS)?;
        required("Note", note)?;
        let mut t = load_treatment(self.treatments, principal.tenant_id, id).await?;
        t.add_progress_note(note.trim(), stage, principal.user_id, now);
        Ok(self.treatments.save(principal.tenant_id, &t).await?)
    }
}

#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub service_id: Uuid,
    pub quantity: i32,
    pub tooth_number: Option<String>,
    pub surface: Option<String>,
    pub notes: Option<String>,
}

pub struct AddTreatmentItem<'a, T, C>
where
    T: TreatmentRepository + ?Sized,
    C: CatalogRepository + ?Sized,
{
    pub treatments: &'a T,
    pub catalog: &'a C,
}

impl<'a, T, C> AddTreatmentItem<'a, T, C>
where
    T: TreatmentRepository + ?Sized,
    C: CatalogRepository + ?Sized,
{
    /// Prices the item from the catalog and refreshes the treatment's estimated cost.
    pub async fn execute(
        &self,
        principal: &Principal,
        treatment_id: Uuid,
        req: &ItemRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<TreatmentItem> {
        require_roles(principal, DENTISTS)?;
        let tenant_id = principal.tenant_id;
        if req.quantity < 1 {
            return Err(ServiceError::validation("Quantity must be at least 1"));
        }
        let mut treatment = load_treatment(self.treatments, tenant_id, treatment_id).await?;
        let service = self
            .catalog
            .find_by_id(tenant_id, req.service_id)
            .await?
            .filter(|s| s.is_active())
            .ok_or_else(|| ServiceError::validation("Service not found or inactive"))?;
        let item = self
            .treatments
            .add_item(
                tenant_id,
                &NewTreatmentItem {
                    treatment_id,
                    service_id: service.id,
                    quantity: req.quantity,
                    unit_price: service.base_price,
                    tooth_number: req.tooth_number.clone(),
                    surface: req.surface.clone(),
                    notes: req.notes.clone(),
                },
            )
            .await?;
        let items = self.treatments.items(tenant_id, treatment_id).await?;
        treatment.estimated_cost = Some(items_cost(&items));
        treatment.updated_at = now;
        self.treatments.save(tenant_id, &treatment).await?;
        Ok(item)
    }
}
