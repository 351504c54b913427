use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{DENTISTS, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::appointment_repository::AppointmentRepository;
use crate::application::ports::consultation_repository::{
    ConsultationQuery, ConsultationRepository, NewConsultation,
};
use crate::application::ports::patient_repository::PatientRepository;
use crate::application::ports::user_repository::UserRepository;
use crate::domain::consultations::Consultation;
use crate::domain::patients::PatientStatus;

fn list_or_empty(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Null => serde_json::Value::Array(Vec::new()),
        other => other.clone(),
    }
}

pub struct CreateConsultation<'a, C, P, U, A>
where
    C: ConsultationRepository + ?Sized,
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    A: AppointmentRepository + ?Sized,
{
    pub consultations: &'a C,
    pub patients: &'a P,
    pub users: &'a U,
    pub appointments: &'a A,
}

impl<'a, C, P, U, A> CreateConsultation<'a, C, P, U, A>
where
    C: ConsultationRepository + ?Sized,
    P: PatientRepository + ?Sized,
    U: UserRepository + ?Sized,
    A: AppointmentRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        consultation: &NewConsultation,
    ) -> ServiceResult<Consultation> {
        require_roles(principal, DENTISTS)?;
        let tenant_id = principal.tenant_id;
        self.patients
            .find_by_id(tenant_id, consultation.patient_id)
            .await?
            .filter(|p| p.status == PatientStatus::Active)
            .ok_or_else(|| ServiceError::validation("Patient not found or inactive"))?;
        self.users
            .find_by_id(tenant_id, consultation.dentist_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::validation("Dentist not found or inactive"))?;
        if let Some(appointment_id) = consultation.appointment_id {
            self.appointments
                .find_by_id(tenant_id, appointment_id)
                .await?
                .ok_or_else(|| ServiceError::validation("Appointment not found"))?;
        }
        if consultation.consultation_fee.is_some_and(|f| f < 0.0) {
            return Err(ServiceError::validation("Consultation fee cannot be negative"));
        }
        let mut consultation = consultation.clone();
        consultation.diagnosis = list_or_empty(&consultation.diagnosis);
        consultation.treatment_plan = list_or_empty(&consultation.treatment_plan);
        Ok(self.consultations.create(tenant_id, &consultation).await?)
    }
}

pub struct ListConsultations<'a, C: ConsultationRepository + ?Sized> {
    pub consultations: &'a C,
}

impl<'a, C: ConsultationRepository + ?Sized> ListConsultations<'a, C> {
    pub async fn execute(
        &self,
        principal: &Principal,
        query: &ConsultationQuery,
    ) -> ServiceResult<Vec<Consultation>> {
        Ok(self.consultations.list(principal.tenant_id, query).await?)
    }
}

pub struct GetConsultation<'a, C: ConsultationRepository + ?Sized> {
    pub consultations: &'a C,
}

impl<'a, C: ConsultationRepository + ?Sized> GetConsultation<'a, C> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<Consultation> {
        self.consultations
            .find_by_id(principal.tenant_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Consultation"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsultationChanges {
    pub chief_complaint: Option<String>,
    pub medical_history_review: Option<serde_json::Value>,
    pub dental_history_review: Option<serde_json::Value>,
    pub extraoral_findings: Option<String>,
    pub intraoral_findings: Option<String>,
    pub periodontal_assessment: Option<String>,
    pub occlusion_assessment: Option<String>,
    pub diagnosis: Option<serde_json::Value>,
    pub treatment_plan: Option<serde_json::Value>,
    pub recommendations: Option<String>,
    pub consultation_fee: Option<f64>,
    pub next_appointment_date: Option<DateTime<Utc>>,
}

pub struct UpdateConsultation<'a, C: ConsultationRepository + ?Sized> {
    pub consultations: &'a C,
}

impl<'a, C: ConsultationRepository + ?Sized> UpdateConsultation<'a, C> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: &ConsultationChanges,
        now: DateTime<Utc>,
    ) -> ServiceResult<Consultation> {
        require_roles(principal, DENTISTS)?;
        let mut c = GetConsultation {
            consultations: self.consultations,
        }
        .execute(principal, id)
        .await?;
        macro_rules! take {
            ($($field:ident),+) => {
                $(if let Some(v) = changes.$field.clone() { c.$field = Some(v); })+
            };
        }
        take!(
            chief_complaint,
            medical_history_review,
            dental_history_review,
            extraoral_findings,
            intraoral_findings,
            periodontal_assessment,
            occlusion_assessment,
            recommendations,
            consultation_fee,
            next_appointment_date
        );
        if let Some(d) = &changes.diagnosis {
            c.diagnosis = list_or_empty(d);
        }
        if let Some(p) = &changes.treatment_plan {
            c.treatment_plan = list_or_empty(p);
        }
        c.updated_at = now;
        Ok(self.consultations.save(principal.tenant_id, &c).await?)
    }
}

pub struct AddDiagnosis<'a, C: ConsultationRepository + ?Sized> {
    pub consultations: &'a C,
}

impl<'a, C: ConsultationRepository + ?Sized> AddDiagnosis<'a, C> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        entry: serde_json::Value,
        now: DateTime<Utc>,
    ) -> ServiceResult<Consultation> {
        require_roles(principal, DENTISTS)?;
        let mut c = GetConsultation {
            consultations: self.consultations,
        }
        .execute(principal, id)
        .await?;
        c.push_diagnosis(entry);
        c.updated_at = now;
        Ok(self.consultations.save(principal.tenant_id, &c).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::{MemoryStore, new_consultation};
    use crate::domain::users::StaffRole;
    use serde_json::json;

    #[tokio::test]
    async fn inactive_patient_cannot_be_seen() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", dentist.id);
        store.set_patient_status(patient.id, PatientStatus::Inactive);
        let err = CreateConsultation {
            consultations: &store,
            patients: &store,
            users: &store,
            appointments: &store,
        }
        .execute(&store.principal_for(&dentist), &new_consultation(patient.id, dentist.id))
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(m) if m == "Patient not found or inactive"));
    }

    #[tokio::test]
    async fn unknown_appointment_is_rejected() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", dentist.id);
        let mut req = new_consultation(patient.id, dentist.id);
        req.appointment_id = Some(Uuid::new_v4());
        let err = CreateConsultation {
            consultations: &store,
            patients: &store,
            users: &store,
            appointments: &store,
        }
        .execute(&store.principal_for(&dentist), &req)
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(m) if m == "Appointment not found"));
    }

    #[tokio::test]
    async fn diagnoses_accumulate() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let dentist = store.seed_user(tenant.id, "d@clinic.test", StaffRole::Dentist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", dentist.id);
        let principal = store.principal_for(&dentist);
        let created = CreateConsultation {
            consultations: &store,
            patients: &store,
            users: &store,
            appointments: &store,
        }
        .execute(&principal, &new_consultation(patient.id, dentist.id))
        .await
        .unwrap();
        assert_eq!(created.diagnosis, json!([]));
        let uc = AddDiagnosis { consultations: &store };
        uc.execute(&principal, created.id, json!({"code": "K02.1"}), Utc::now())
            .await
            .unwrap();
        let c = uc
            .execute(&principal, created.id, json!({"code": "K05.1"}), Utc::now())
            .await
            .unwrap();
        assert_eq!(c.diagnosis, json!([{"code": "K02.1"}, {"code": "K05.1"}]));
    }
}
