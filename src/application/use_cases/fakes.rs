//! In-memory implementation of every repository port, used by the use case tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use serde_json::json;
use uuid::Uuid;

use crate::application::access::Principal;
use crate::application::ports::Page;
use crate::application::ports::appointment_repository::{
    AppointmentQuery, AppointmentRepository, NewAppointment, SlotWrite,
};
use crate::application::ports::audit_repository::{AuditQuery, AuditRepository};
use crate::application::ports::auth_repository::{AuthRepository, NewLoginAttempt, NewSession};
use crate::application::ports::catalog_repository::{
    CatalogRepository, CategorySummary, NewService, ServiceQuery,
};
use crate::application::ports::consultation_repository::{
    ConsultationQuery, ConsultationRepository, NewConsultation,
};
use crate::application::ports::invoice_repository::{
    InvoiceEdit, InvoiceQuery, InvoiceRepository, InvoiceSummary, NewInvoice, NewPayment,
    PaymentRecord,
};
use crate::application::ports::medical_file_store::{MedicalFileStore, StoredFile};
use crate::application::ports::medical_record_repository::{
    MedicalRecordQuery, MedicalRecordRepository, NewMedicalRecord,
};
use crate::application::ports::patient_repository::{
    DentistAssignment, NewPatient, PatientPatch, PatientQuery, PatientRepository,
};
use crate::application::ports::prescription_repository::{
    NewPrescription, PrescriptionQuery, PrescriptionRepository,
};
use crate::application::ports::reporting_repository::{
    AppointmentsOverview, DashboardStats, MonthlyRevenue, ReportingRepository,
};
use crate::application::ports::tenant_repository::{
    NewTenant, TenantPatch, TenantRepository, TenantStats, TenantUsage,
};
use crate::application::ports::treatment_repository::{
    NewTreatment, NewTreatmentItem, TreatmentQuery, TreatmentRepository,
};
use crate::application::ports::user_repository::{
    NewUser, UserPatch, UserQuery, UserRepository,
};
use crate::application::services::checksum::sha256_hex;
use crate::application::services::passwords::hash_password;
use crate::domain::appointments::{
    Appointment, AppointmentStatus, AppointmentType, conflict_window,
};
use crate::domain::audit::{AuditEntry, AuditLog};
use crate::domain::auth::{LoginAttempt, PasswordResetToken, RefreshSession};
use crate::domain::billing::{
    Invoice, InvoiceItem, InvoiceStatus, Payment, format_invoice_number,
};
use crate::domain::catalog::{DentalService, ServiceCategory, ServiceStatus};
use crate::domain::consultations::Consultation;
use crate::domain::medical_records::MedicalRecord;
use crate::domain::money::round_cents;
use crate::domain::patients::{AssignmentCount, Patient, PatientStatus};
use crate::domain::prescriptions::Prescription;
use crate::domain::tenants::{
    BillingCycle, PaymentStatus, Tenant, TenantStatus, TenantTier,
};
use crate::domain::treatments::{
    ItemStatus, Treatment, TreatmentItem, TreatmentPriority, TreatmentStatus,
};
use crate::domain::users::{Gender, StaffRole, User};

pub const SEED_PASSWORD: &str = "Molar7Crown";

static SEED_HASH: Lazy<String> =
    Lazy::new(|| hash_password(SEED_PASSWORD).expect("hash seed password"));

#[derive(Default)]
struct Inner {
    tenants: Vec<Tenant>,
    users: Vec<User>,
    sessions: Vec<RefreshSession>,
    attempts: Vec<LoginAttempt>,
    reset_tokens: Vec<PasswordResetToken>,
    patients: Vec<Patient>,
    appointments: Vec<Appointment>,
    services: Vec<DentalService>,
    consultations: Vec<Consultation>,
    treatments: Vec<Treatment>,
    treatment_items: Vec<TreatmentItem>,
    invoices: Vec<Invoice>,
    invoice_items: Vec<InvoiceItem>,
    payments: Vec<Payment>,
    prescriptions: Vec<Prescription>,
    records: Vec<MedicalRecord>,
    audit: Vec<AuditLog>,
    files: HashMap<String, Vec<u8>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn paged<T: Clone>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items
        .skip(page.skip as usize)
        .take(page.limit as usize)
        .collect()
}


fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .unwrap_or(now)
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn seed_tenant(&self) -> Tenant {
        let now = Utc::now();
        let mut inner = self.lock();
        let n = inner.tenants.len() + 1;
        let tier = TenantTier::Basic;
        let limits = tier.features();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: format!("Clinic {n}"),
            slug: format!("clinic-{n}"),
            contact_email: format!("office{n}@clinic.test"),
            contact_phone: None,
            address: None,
            tier,
            payment_status: PaymentStatus::Active,
            status: TenantStatus::Active,
            billing_cycle: BillingCycle::Monthly,
            subscription_id: None,
            max_users: limits.max_users,
            max_patients: limits.max_patients,
            max_storage_gb: limits.max_storage_gb,
            max_api_calls_per_month: limits.max_api_calls_per_month,
            enabled_features: tier.enabled_features(),
            settings: json!({}),
            trial_ends_at: None,
            subscription_ends_at: None,
            grace_period_ends_at: None,
            activation_date: Some(now),
            created_at: now,
            updated_at: now,
        };
        inner.tenants.push(tenant.clone());
        tenant
    }

    pub fn seed_user(&self, tenant_id: Uuid, email: &str, role: StaffRole) -> User {
        let user = build_user(
            tenant_id,
            &NewUser {
                first_name: "Sam".into(),
                last_name: "Molar".into(),
                email: email.to_lowercase(),
                password_hash: SEED_HASH.clone(),
                contact_number: "+1 555 0101".into(),
                role,
                gender: Gender::Other,
                date_of_birth: None,
                specialization: None,
                license_number: None,
                employee_id: None,
                work_schedule: json!({}),
            },
        );
        self.lock().users.push(user.clone());
        user
    }

    pub fn principal_for(&self, user: &User) -> Principal {
        Principal {
            user_id: user.id,
            tenant_id: user.tenant_id,
            session_id: Uuid::new_v4(),
            email: user.email.clone(),
            role: user.role,
        }
    }

    pub fn deactivate_user(&self, id: Uuid) {
        if let Some(u) = self.lock().users.iter_mut().find(|u| u.id == id) {
            u.is_active = false;
        }
    }

    pub fn seed_session(&self, tenant_id: Uuid, user_id: Uuid) -> RefreshSession {
        let now = Utc::now();
        let session = RefreshSession {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            session_id: Uuid::new_v4(),
            expires_at: now + Duration::days(7),
            is_revoked: false,
            revoked_at: None,
            user_agent: None,
            ip_address: None,
            created_at: now,
        };
        self.lock().sessions.push(session.clone());
        session
    }

    pub fn session(&self, id: Uuid) -> Option<RefreshSession> {
        self.lock().sessions.iter().find(|s| s.id == id).cloned()
    }

    pub fn attempts(&self, tenant_id: Uuid) -> Vec<LoginAttempt> {
        self.lock()
            .attempts
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn tenant(&self, id: Uuid) -> Option<Tenant> {
        self.lock().tenants.iter().find(|t| t.id == id).cloned()
    }

    pub fn seed_patient(
        &self,
        tenant_id: Uuid,
        first_name: &str,
        last_name: &str,
        created_by: Uuid,
    ) -> Patient {
        let mut p = new_patient(first_name, None);
        p.last_name = last_name.into();
        p.created_by = created_by;
        let patient = build_patient(tenant_id, &p);
        self.lock().patients.push(patient.clone());
        patient
    }

    pub fn patient(&self, id: Uuid) -> Option<Patient> {
        self.lock().patients.iter().find(|p| p.id == id).cloned()
    }

    pub fn set_patient_status(&self, id: Uuid, status: PatientStatus) {
        if let Some(p) = self.lock().patients.iter_mut().find(|p| p.id == id) {
            p.status = status;
        }
    }

    pub fn audit_entries(&self, tenant_id: Uuid) -> Vec<AuditLog> {
        self.lock()
            .audit
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Scheduled 30 minute consultation.
    pub fn seed_appointment(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
        dentist_id: Uuid,
        start: DateTime<Utc>,
    ) -> Appointment {
        let appt = build_appointment(
            tenant_id,
            &NewAppointment {
                patient_id,
                dentist_id,
                appointment_date: start,
                duration_minutes: 30,
                appointment_type: AppointmentType::Consultation,
                reason: None,
                notes: None,
                created_by: dentist_id,
            },
        );
        self.lock().appointments.push(appt.clone());
        appt
    }

    pub fn seed_service(&self, tenant_id: Uuid, code: &str, price: f64) -> DentalService {
        let service = build_service(tenant_id, &new_service(code, price));
        self.lock().services.push(service.clone());
        service
    }

    pub fn set_service_status(&self, id: Uuid, status: ServiceStatus) {
        if let Some(s) = self.lock().services.iter_mut().find(|s| s.id == id) {
            s.status = status;
        }
    }

    pub fn seed_treatment(&self, tenant_id: Uuid, patient_id: Uuid, dentist_id: Uuid) -> Treatment {
        let t = build_treatment(tenant_id, &new_treatment(patient_id, dentist_id));
        self.lock().treatments.push(t.clone());
        t
    }

    pub fn treatment(&self, id: Uuid) -> Option<Treatment> {
        self.lock().treatments.iter().find(|t| t.id == id).cloned()
    }

    pub fn overwrite_file(&self, relative_path: &str, bytes: &[u8]) {
        self.lock()
            .files
            .insert(relative_path.to_string(), bytes.to_vec());
    }

    pub fn has_file(&self, relative_path: &str) -> bool {
        self.lock().files.contains_key(relative_path)
    }
}

pub fn new_patient(first_name: &str, email: Option<&str>) -> NewPatient {
    NewPatient {
        first_name: first_name.into(),
        last_name: "Tester".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1988, 6, 14).unwrap(),
        gender: Gender::Female,
        contact_number: "+1 555 0199".into(),
        email: email.map(str::to_string),
        address: "12 Enamel Street".into(),
        emergency_contact_name: None,
        emergency_contact_phone: None,
        medical_history: json!({}),
        dental_history: json!({}),
        insurance_info: None,
        preferences: json!({}),
        created_by: Uuid::nil(),
    }
}

pub fn new_service(code: &str, price: f64) -> NewService {
    NewService {
        code: code.into(),
        name: format!("Service {code}"),
        description: None,
        category: ServiceCategory::Preventive,
        base_price: price,
        duration_minutes: 30,
        is_taxable: false,
        tax_rate: 0.0,
        requirements: None,
        materials: None,
    }
}

pub fn new_consultation(patient_id: Uuid, dentist_id: Uuid) -> NewConsultation {
    NewConsultation {
        appointment_id: None,
        patient_id,
        dentist_id,
        chief_complaint: Some("Sensitivity on lower left".into()),
        medical_history_review: None,
        dental_history_review: None,
        extraoral_findings: None,
        intraoral_findings: None,
        periodontal_assessment: None,
        occlusion_assessment: None,
        diagnosis: serde_json::Value::Null,
        treatment_plan: serde_json::Value::Null,
        recommendations: None,
        consultation_fee: Some(75.0),
        next_appointment_date: None,
    }
}

pub fn new_treatment(patient_id: Uuid, dentist_id: Uuid) -> NewTreatment {
    NewTreatment {
        patient_id,
        dentist_id,
        consultation_id: None,
        appointment_id: None,
        name: "Crown 14".into(),
        description: None,
        priority: TreatmentPriority::Routine,
        teeth_involved: Some(json!(["14"])),
        quadrants: None,
        total_stages: 2,
        estimated_cost: None,
    }
}

fn build_tenant(t: &NewTenant) -> Tenant {
    let now = Utc::now();
    Tenant {
        id: Uuid::new_v4(),
        name: t.name.clone(),
        slug: t.slug.clone(),
        contact_email: t.contact_email.clone(),
        contact_phone: t.contact_phone.clone(),
        address: t.address.clone(),
        tier: t.tier,
        payment_status: t.payment_status,
        status: TenantStatus::Active,
        billing_cycle: t.billing_cycle,
        subscription_id: None,
        max_users: t.max_users,
        max_patients: t.max_patients,
        max_storage_gb: t.max_storage_gb,
        max_api_calls_per_month: t.max_api_calls_per_month,
        enabled_features: t.enabled_features.clone(),
        settings: json!({}),
        trial_ends_at: t.trial_ends_at,
        subscription_ends_at: None,
        grace_period_ends_at: None,
        activation_date: Some(now),
        created_at: now,
        updated_at: now,
    }
}

fn build_user(tenant_id: Uuid, u: &NewUser) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        tenant_id,
        first_name: u.first_name.clone(),
        last_name: u.last_name.clone(),
        email: u.email.clone(),
        password_hash: u.password_hash.clone(),
        contact_number: u.contact_number.clone(),
        role: u.role,
        gender: u.gender,
        date_of_birth: u.date_of_birth,
        specialization: u.specialization.clone(),
        license_number: u.license_number.clone(),
        employee_id: u.employee_id.clone(),
        work_schedule: u.work_schedule.clone(),
        is_available: true,
        is_active: true,
        is_verified: false,
        settings: json!({}),
        created_at: now,
        updated_at: now,
        last_login_at: None,
    }
}

fn build_patient(tenant_id: Uuid, p: &NewPatient) -> Patient {
    let now = Utc::now();
    Patient {
        id: Uuid::new_v4(),
        tenant_id,
        first_name: p.first_name.clone(),
        last_name: p.last_name.clone(),
        date_of_birth: p.date_of_birth,
        gender: p.gender,
        contact_number: p.contact_number.clone(),
        email: p.email.clone(),
        address: p.address.clone(),
        emergency_contact_name: p.emergency_contact_name.clone(),
        emergency_contact_phone: p.emergency_contact_phone.clone(),
        medical_history: p.medical_history.clone(),
        dental_history: p.dental_history.clone(),
        insurance_info: p.insurance_info.clone(),
        status: PatientStatus::Active,
        preferences: p.preferences.clone(),
        created_by: p.created_by,
        updated_by: None,
        created_at: now,
        updated_at: now,
        last_visit_at: None,
        assigned_dentist_id: None,
        assigned_at: None,
        assignment_reason: None,
    }
}

fn build_appointment(tenant_id: Uuid, a: &NewAppointment) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        tenant_id,
        patient_id: a.patient_id,
        dentist_id: a.dentist_id,
        appointment_date: a.appointment_date,
        duration_minutes: a.duration_minutes,
        appointment_type: a.appointment_type,
        status: AppointmentStatus::Scheduled,
        reason: a.reason.clone(),
        notes: a.notes.clone(),
        created_by: a.created_by,
        created_at: now,
        updated_at: now,
        confirmed_at: None,
        completed_at: None,
        cancelled_at: None,
        cancellation_reason: None,
    }
}

fn slot_conflict(
    appointments: &[Appointment],
    tenant_id: Uuid,
    dentist_id: Uuid,
    start: DateTime<Utc>,
    duration_minutes: i32,
    exclude: Option<Uuid>,
) -> Option<Appointment> {
    let (from, to) = conflict_window(start, duration_minutes);
    appointments
        .iter()
        .find(|a| {
            a.tenant_id == tenant_id
                && a.dentist_id == dentist_id
                && Some(a.id) != exclude
                && AppointmentStatus::BLOCKING.contains(&a.status)
                && a.appointment_date >= from
                && a.appointment_date <= to
        })
        .cloned()
}

fn build_service(tenant_id: Uuid, s: &NewService) -> DentalService {
    let now = Utc::now();
    DentalService {
        id: Uuid::new_v4(),
        tenant_id,
        code: s.code.clone(),
        name: s.name.clone(),
        description: s.description.clone(),
        category: s.category,
        base_price: s.base_price,
        duration_minutes: s.duration_minutes,
        status: ServiceStatus::Active,
        is_taxable: s.is_taxable,
        tax_rate: s.tax_rate,
        requirements: s.requirements.clone(),
        materials: s.materials.clone(),
        created_at: now,
        updated_at: now,
    }
}

fn build_treatment(tenant_id: Uuid, t: &NewTreatment) -> Treatment {
    let now = Utc::now();
    Treatment {
        id: Uuid::new_v4(),
        tenant_id,
        patient_id: t.patient_id,
        dentist_id: t.dentist_id,
        consultation_id: t.consultation_id,
        appointment_id: t.appointment_id,
        name: t.name.clone(),
        description: t.description.clone(),
        status: TreatmentStatus::Planned,
        priority: t.priority,
        teeth_involved: t.teeth_involved.clone(),
        quadrants: t.quadrants.clone(),
        progress_notes: json!([]),
        current_stage: None,
        total_stages: t.total_stages,
        estimated_cost: t.estimated_cost,
        actual_cost: None,
        created_at: now,
        updated_at: now,
        started_at: None,
        completed_at: None,
    }
}

fn replace<T: Clone>(items: &mut [T], value: &T, same: impl Fn(&T) -> bool) -> anyhow::Result<T> {
    let slot = items
        .iter_mut()
        .find(|i| same(i))
        .ok_or_else(|| anyhow::anyhow!("row not found"))?;
    *slot = value.clone();
    Ok(value.clone())
}

#[async_trait]
impl TenantRepository for MemoryStore {
    async fn create(&self, tenant: &NewTenant) -> anyhow::Result<Tenant> {
        let t = build_tenant(tenant);
        self.lock().tenants.push(t.clone());
        Ok(t)
    }

    async fn create_with_admin(
        &self,
        tenant: &NewTenant,
        admin: &NewUser,
    ) -> anyhow::Result<(Tenant, User)> {
        let t = build_tenant(tenant);
        let u = build_user(t.id, admin);
        let mut inner = self.lock();
        inner.tenants.push(t.clone());
        inner.users.push(u.clone());
        Ok((t, u))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Tenant>> {
        Ok(self.tenant(id))
    }

    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<Tenant>> {
        Ok(self.lock().tenants.iter().find(|t| t.slug == slug).cloned())
    }

    async fn name_or_slug_taken(
        &self,
        name: &str,
        slug: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        Ok(self.lock().tenants.iter().any(|t| {
            Some(t.id) != except && (t.name == name || (!slug.is_empty() && t.slug == slug))
        }))
    }

    async fn list(&self, page: Page) -> anyhow::Result<Vec<Tenant>> {
        Ok(paged(self.lock().tenants.iter().cloned(), page))
    }

    async fn list_active(&self) -> anyhow::Result<Vec<Tenant>> {
        Ok(self
            .lock()
            .tenants
            .iter()
            .filter(|t| t.is_active())
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, patch: &TenantPatch) -> anyhow::Result<Option<Tenant>> {
        let mut inner = self.lock();
        let Some(t) = inner.tenants.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(v) = &patch.name {
            t.name = v.clone();
        }
        if let Some(v) = &patch.contact_email {
            t.contact_email = v.clone();
        }
        if patch.contact_phone.is_some() {
            t.contact_phone = patch.contact_phone.clone();
        }
        if patch.address.is_some() {
            t.address = patch.address.clone();
        }
        if let Some(v) = patch.tier {
            t.tier = v;
        }
        if let Some(v) = patch.billing_cycle {
            t.billing_cycle = v;
        }
        if let Some(v) = &patch.settings {
            t.settings = v.clone();
        }
        if let Some(v) = patch.max_users {
            t.max_users = v;
        }
        if let Some(v) = patch.max_patients {
            t.max_patients = v;
        }
        if let Some(v) = patch.max_storage_gb {
            t.max_storage_gb = v;
        }
        if let Some(v) = patch.max_api_calls_per_month {
            t.max_api_calls_per_month = v;
        }
        if let Some(v) = &patch.enabled_features {
            t.enabled_features = v.clone();
        }
        t.updated_at = Utc::now();
        Ok(Some(t.clone()))
    }

    async fn set_status(&self, id: Uuid, status: TenantStatus) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        match inner.tenants.iter_mut().find(|t| t.id == id) {
            Some(t) => {
                t.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn stats(&self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<TenantStats> {
        let inner = self.lock();
        let since = month_start(now);
        Ok(TenantStats {
            users: inner.users.iter().filter(|u| u.tenant_id == id).count() as i64,
            patients: inner.patients.iter().filter(|p| p.tenant_id == id).count() as i64,
            appointments: inner.appointments.iter().filter(|a| a.tenant_id == id).count() as i64,
            invoices: inner.invoices.iter().filter(|i| i.tenant_id == id).count() as i64,
            monthly_revenue: round_cents(
                inner
                    .invoices
                    .iter()
                    .filter(|i| {
                        i.tenant_id == id
                            && i.status == InvoiceStatus::Paid
                            && i.paid_date.is_some_and(|d| d >= since)
                    })
                    .map(|i| i.total_amount)
                    .sum(),
            ),
            active_patients: inner
                .patients
                .iter()
                .filter(|p| p.tenant_id == id && p.status == PatientStatus::Active)
                .count() as i64,
        })
    }

    async fn usage(&self, id: Uuid) -> anyhow::Result<TenantUsage> {
        let inner = self.lock();
        Ok(TenantUsage {
            active_users: inner
                .users
                .iter()
                .filter(|u| u.tenant_id == id && u.is_active)
                .count() as i64,
            patients: inner
                .patients
                .iter()
                .filter(|p| p.tenant_id == id && p.status == PatientStatus::Active)
                .count() as i64,
            storage_bytes: inner
                .records
                .iter()
                .filter(|r| r.tenant_id == id)
                .filter_map(|r| r.file_size)
                .sum(),
        })
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, tenant_id: Uuid, user: &NewUser) -> anyhow::Result<User> {
        let u = build_user(tenant_id, user);
        self.lock().users.push(u.clone());
        Ok(u)
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.tenant_id == tenant_id && u.id == id)
            .cloned())
    }

    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> anyhow::Result<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.tenant_id == tenant_id && u.email == email)
            .cloned())
    }

    async fn list(&self, tenant_id: Uuid, query: &UserQuery) -> anyhow::Result<Vec<User>> {
        let inner = self.lock();
        Ok(paged(
            inner
                .users
                .iter()
                .filter(|u| u.tenant_id == tenant_id)
                .filter(|u| query.role.is_none_or(|r| u.role == r))
                .filter(|u| !query.active_only || u.is_active)
                .cloned(),
            query.page,
        ))
    }

    async fn count_active(&self, tenant_id: Uuid) -> anyhow::Result<i64> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id && u.is_active)
            .count() as i64)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: &UserPatch,
    ) -> anyhow::Result<Option<User>> {
        let mut inner = self.lock();
        let Some(u) = inner
            .users
            .iter_mut()
            .find(|u| u.tenant_id == tenant_id && u.id == id)
        else {
            return Ok(None);
        };
        if let Some(v) = &patch.first_name {
            u.first_name = v.clone();
        }
        if let Some(v) = &patch.last_name {
            u.last_name = v.clone();
        }
        if let Some(v) = &patch.contact_number {
            u.contact_number = v.clone();
        }
        if let Some(v) = patch.gender {
            u.gender = v;
        }
        if patch.date_of_birth.is_some() {
            u.date_of_birth = patch.date_of_birth;
        }
        if patch.specialization.is_some() {
            u.specialization = patch.specialization.clone();
        }
        if patch.license_number.is_some() {
            u.license_number = patch.license_number.clone();
        }
        if patch.employee_id.is_some() {
            u.employee_id = patch.employee_id.clone();
        }
        if let Some(v) = &patch.work_schedule {
            u.work_schedule = v.clone();
        }
        if let Some(v) = patch.is_available {
            u.is_available = v;
        }
        if let Some(v) = patch.role {
            u.role = v;
        }
        if let Some(v) = patch.is_active {
            u.is_active = v;
        }
        u.updated_at = Utc::now();
        Ok(Some(u.clone()))
    }

    async fn set_password(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        match inner
            .users
            .iter_mut()
            .find(|u| u.tenant_id == tenant_id && u.id == id)
        {
            Some(u) => {
                u.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_last_login(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if let Some(u) = self
            .lock()
            .users
            .iter_mut()
            .find(|u| u.tenant_id == tenant_id && u.id == id)
        {
            u.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn available_dentists(&self, tenant_id: Uuid) -> anyhow::Result<Vec<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| {
                u.tenant_id == tenant_id
                    && u.role == StaffRole::Dentist
                    && u.is_active
                    && u.is_available
            })
            .cloned()
            .collect())
    }
}

fn build_session(tenant_id: Uuid, s: &NewSession) -> RefreshSession {
    RefreshSession {
        id: s.id,
        tenant_id,
        user_id: s.user_id,
        session_id: s.session_id,
        expires_at: s.expires_at,
        is_revoked: false,
        revoked_at: None,
        user_agent: s.user_agent.clone(),
        ip_address: s.ip_address.clone(),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl AuthRepository for MemoryStore {
    async fn create_session(
        &self,
        tenant_id: Uuid,
        session: &NewSession,
    ) -> anyhow::Result<RefreshSession> {
        let s = build_session(tenant_id, session);
        self.lock().sessions.push(s.clone());
        Ok(s)
    }

    async fn find_session(
        &self,
        tenant_id: Uuid,
        jti: Uuid,
    ) -> anyhow::Result<Option<RefreshSession>> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| s.tenant_id == tenant_id && s.id == jti)
            .cloned())
    }

    async fn rotate_session(
        &self,
        tenant_id: Uuid,
        old_jti: Uuid,
        next: &NewSession,
    ) -> anyhow::Result<Option<RefreshSession>> {
        let now = Utc::now();
        let mut inner = self.lock();
        let Some(old) = inner
            .sessions
            .iter_mut()
            .find(|s| s.tenant_id == tenant_id && s.id == old_jti && !s.is_revoked)
        else {
            return Ok(None);
        };
        old.is_revoked = true;
        old.revoked_at = Some(now);
        let s = build_session(tenant_id, next);
        inner.sessions.push(s.clone());
        Ok(Some(s))
    }

    async fn revoke_session(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        session_id: Uuid,
    ) -> anyhow::Result<u64> {
        let now = Utc::now();
        let mut revoked = 0;
        for s in self.lock().sessions.iter_mut().filter(|s| {
            s.tenant_id == tenant_id
                && s.user_id == user_id
                && s.session_id == session_id
                && !s.is_revoked
        }) {
            s.is_revoked = true;
            s.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn revoke_all_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        except_session: Option<Uuid>,
    ) -> anyhow::Result<u64> {
        let now = Utc::now();
        let mut revoked = 0;
        for s in self.lock().sessions.iter_mut().filter(|s| {
            s.tenant_id == tenant_id
                && s.user_id == user_id
                && Some(s.session_id) != except_session
                && !s.is_revoked
        }) {
            s.is_revoked = true;
            s.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn list_active_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RefreshSession>> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.user_id == user_id && s.is_usable(now))
            .cloned()
            .collect())
    }

    async fn is_session_active(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .any(|s| s.tenant_id == tenant_id && s.session_id == session_id && s.is_usable(now)))
    }

    async fn record_attempt(
        &self,
        tenant_id: Uuid,
        attempt: &NewLoginAttempt,
    ) -> anyhow::Result<()> {
        self.lock().attempts.push(LoginAttempt {
            id: Uuid::new_v4(),
            tenant_id,
            email: attempt.email.clone(),
            ip_address: attempt.ip_address.clone(),
            user_agent: attempt.user_agent.clone(),
            success: attempt.success,
            failure_reason: attempt.failure_reason.map(str::to_string),
            attempted_at: Utc::now(),
        });
        Ok(())
    }

    async fn count_failures_since(
        &self,
        tenant_id: Uuid,
        email: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .filter(|a| {
                a.tenant_id == tenant_id && a.email == email && !a.success && a.attempted_at > since
            })
            .count() as i64)
    }

    async fn create_reset_token(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.lock().reset_tokens.push(PasswordResetToken {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            token_hash: token_hash.to_string(),
            created_at: Utc::now(),
            expires_at,
            is_used: false,
            used_at: None,
        });
        Ok(())
    }

    async fn find_reset_token(
        &self,
        tenant_id: Uuid,
        token_hash: &str,
    ) -> anyhow::Result<Option<PasswordResetToken>> {
        Ok(self
            .lock()
            .reset_tokens
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.token_hash == token_hash)
            .cloned())
    }

    async fn mark_reset_token_used(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        match inner
            .reset_tokens
            .iter_mut()
            .find(|t| t.tenant_id == tenant_id && t.id == id && !t.is_used)
        {
            Some(t) => {
                t.is_used = true;
                t.used_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PatientRepository for MemoryStore {
    async fn create(&self, tenant_id: Uuid, patient: &NewPatient) -> anyhow::Result<Patient> {
        let p = build_patient(tenant_id, patient);
        self.lock().patients.push(p.clone());
        Ok(p)
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Patient>> {
        Ok(self
            .lock()
            .patients
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.id == id)
            .cloned())
    }

    async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> anyhow::Result<Option<Patient>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .lock()
            .patients
            .iter()
            .find(|p| {
                p.tenant_id == tenant_id
                    && p.email.as_deref().map(str::to_lowercase).as_deref() == Some(email.as_str())
            })
            .cloned())
    }

    async fn search(&self, tenant_id: Uuid, query: &PatientQuery) -> anyhow::Result<Vec<Patient>> {
        let needle = query.search.as_deref().map(|s| s.trim().to_lowercase());
        let inner = self.lock();
        Ok(paged(
            inner
                .patients
                .iter()
                .filter(|p| p.tenant_id == tenant_id)
                .filter(|p| {
                    needle.as_deref().is_none_or(|n| {
                        p.first_name.to_lowercase().contains(n)
                            || p.last_name.to_lowercase().contains(n)
                            || p.contact_number.contains(n)
                            || p.email.as_deref().is_some_and(|e| e.contains(n))
                    })
                })
                .filter(|p| query.status.is_none_or(|s| p.status == s))
                .filter(|p| query.gender.is_none_or(|g| p.gender == g))
                .filter(|p| query.born_on_or_after.is_none_or(|d| p.date_of_birth >= d))
                .filter(|p| query.born_on_or_before.is_none_or(|d| p.date_of_birth <= d))
                .cloned(),
            query.page,
        ))
    }

    async fn count(&self, tenant_id: Uuid) -> anyhow::Result<i64> {
        Ok(self
            .lock()
            .patients
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.status == PatientStatus::Active)
            .count() as i64)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: &PatientPatch,
        updated_by: Uuid,
    ) -> anyhow::Result<Option<Patient>> {
        let mut inner = self.lock();
        let Some(p) = inner
            .patients
            .iter_mut()
            .find(|p| p.tenant_id == tenant_id && p.id == id)
        else {
            return Ok(None);
        };
        if let Some(v) = &patch.first_name {
            p.first_name = v.clone();
        }
        if let Some(v) = &patch.last_name {
            p.last_name = v.clone();
        }
        if let Some(v) = patch.date_of_birth {
            p.date_of_birth = v;
        }
        if let Some(v) = patch.gender {
            p.gender = v;
        }
        if let Some(v) = &patch.contact_number {
            p.contact_number = v.clone();
        }
        if patch.email.is_some() {
            p.email = patch.email.clone();
        }
        if let Some(v) = &patch.address {
            p.address = v.clone();
        }
        if patch.emergency_contact_name.is_some() {
            p.emergency_contact_name = patch.emergency_contact_name.clone();
        }
        if patch.emergency_contact_phone.is_some() {
            p.emergency_contact_phone = patch.emergency_contact_phone.clone();
        }
        if let Some(v) = &patch.medical_history {
            p.medical_history = v.clone();
        }
        if let Some(v) = &patch.dental_history {
            p.dental_history = v.clone();
        }
        if patch.insurance_info.is_some() {
            p.insurance_info = patch.insurance_info.clone();
        }
        if let Some(v) = patch.status {
            p.status = v;
        }
        if let Some(v) = &patch.preferences {
            p.preferences = v.clone();
        }
        p.updated_by = Some(updated_by);
        p.updated_at = Utc::now();
        Ok(Some(p.clone()))
    }

    async fn set_assigned_dentist(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
        assignment: &DentistAssignment,
    ) -> anyhow::Result<Option<Patient>> {
        let mut inner = self.lock();
        Ok(inner
            .patients
            .iter_mut()
            .find(|p| {
                p.tenant_id == tenant_id
                    && p.id == patient_id
                    && p.assigned_dentist_id == assignment.expected
            })
            .map(|p| {
                p.assigned_dentist_id = assignment.dentist_id;
                if assignment.dentist_id.is_some() {
                    p.assigned_at = Some(assignment.at);
                    p.assignment_reason = assignment.reason.clone();
                } else {
                    p.assigned_at = None;
                    p.assignment_reason = None;
                }
                p.updated_by = Some(assignment.assigned_by);
                p.updated_at = assignment.at;
                p.clone()
            }))
    }

    async fn assigned_to(
        &self,
        tenant_id: Uuid,
        dentist_id: Uuid,
        page: Page,
    ) -> anyhow::Result<Vec<Patient>> {
        let inner = self.lock();
        let mut found: Vec<Patient> = inner
            .patients
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.assigned_dentist_id == Some(dentist_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(paged(found.into_iter(), page))
    }

    async fn assignment_counts(&self, tenant_id: Uuid) -> anyhow::Result<Vec<AssignmentCount>> {
        let mut counts: Vec<AssignmentCount> = Vec::new();
        for dentist_id in self
            .lock()
            .patients
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.status == PatientStatus::Active)
            .filter_map(|p| p.assigned_dentist_id)
        {
            match counts.iter_mut().find(|c| c.dentist_id == dentist_id) {
                Some(c) => c.patients += 1,
                None => counts.push(AssignmentCount {
                    dentist_id,
                    patients: 1,
                }),
            }
        }
        Ok(counts)
    }

    async fn touch_last_visit(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if let Some(p) = self
            .lock()
            .patients
            .iter_mut()
            .find(|p| p.tenant_id == tenant_id && p.id == id)
        {
            p.last_visit_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl AppointmentRepository for MemoryStore {
    async fn create(
        &self,
        tenant_id: Uuid,
        appointment: &NewAppointment,
    ) -> anyhow::Result<SlotWrite> {
        let mut inner = self.lock();
        if let Some(other) = slot_conflict(
            &inner.appointments,
            tenant_id,
            appointment.dentist_id,
            appointment.appointment_date,
            appointment.duration_minutes,
            None,
        ) {
            return Ok(SlotWrite::Conflict(other));
        }
        let a = build_appointment(tenant_id, appointment);
        inner.appointments.push(a.clone());
        Ok(SlotWrite::Written(a))
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Appointment>> {
        Ok(self
            .lock()
            .appointments
            .iter()
            .find(|a| a.tenant_id == tenant_id && a.id == id)
            .cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: &AppointmentQuery,
    ) -> anyhow::Result<Vec<Appointment>> {
        let inner = self.lock();
        let mut found: Vec<Appointment> = inner
            .appointments
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .filter(|a| query.patient_id.is_none_or(|id| a.patient_id == id))
            .filter(|a| query.dentist_id.is_none_or(|id| a.dentist_id == id))
            .filter(|a| query.status.is_none_or(|s| a.status == s))
            .filter(|a| query.date_from.is_none_or(|d| a.appointment_date >= d))
            .filter(|a| query.date_to.is_none_or(|d| a.appointment_date <= d))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.appointment_date);
        Ok(paged(found.into_iter(), query.page))
    }

    async fn for_dentist_between(
        &self,
        tenant_id: Uuid,
        dentist_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> anyhow::Result<Vec<Appointment>> {
        Ok(self
            .lock()
            .appointments
            .iter()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && a.dentist_id == dentist_id
                    && statuses.contains(&a.status)
                    && a.appointment_date >= from
                    && a.appointment_date < to
            })
            .cloned()
            .collect())
    }

    async fn upcoming(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Appointment>> {
        let mut found: Vec<Appointment> = self
            .lock()
            .appointments
            .iter()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && AppointmentStatus::UPCOMING.contains(&a.status)
                    && a.appointment_date >= from
                    && a.appointment_date <= to
            })
            .cloned()
            .collect();
        found.sort_by_key(|a| a.appointment_date);
        Ok(found)
    }

    async fn reschedule(
        &self,
        tenant_id: Uuid,
        appointment: &Appointment,
    ) -> anyhow::Result<SlotWrite> {
        let mut inner = self.lock();
        if let Some(other) = slot_conflict(
            &inner.appointments,
            tenant_id,
            appointment.dentist_id,
            appointment.appointment_date,
            appointment.duration_minutes,
            Some(appointment.id),
        ) {
            return Ok(SlotWrite::Conflict(other));
        }
        replace(&mut inner.appointments, appointment, |a| {
            a.tenant_id == tenant_id && a.id == appointment.id
        })
        .map(SlotWrite::Written)
    }

    async fn save(&self, tenant_id: Uuid, appointment: &Appointment) -> anyhow::Result<Appointment> {
        replace(&mut self.lock().appointments, appointment, |a| {
            a.tenant_id == tenant_id && a.id == appointment.id
        })
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn create(&self, tenant_id: Uuid, service: &NewService) -> anyhow::Result<DentalService> {
        let s = build_service(tenant_id, service);
        self.lock().services.push(s.clone());
        Ok(s)
    }

    async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<DentalService>> {
        Ok(self
            .lock()
            .services
            .iter()
            .find(|s| s.tenant_id == tenant_id && s.id == id)
            .cloned())
    }

    async fn find_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> anyhow::Result<Option<DentalService>> {
        Ok(self
            .lock()
            .services
            .iter()
            .find(|s| s.tenant_id == tenant_id && s.code == code)
            .cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: &ServiceQuery,
    ) -> anyhow::Result<Vec<DentalService>> {
        let needle = query.search.as_deref().map(str::to_lowercase);
        let inner = self.lock();
        Ok(paged(
            inner
                .services
                .iter()
                .filter(|s| s.tenant_id == tenant_id)
                .filter(|s| query.category.is_none_or(|c| s.category == c))
                .filter(|s| query.status.is_none_or(|st| s.status == st))
                .filter(|s| query.min_price.is_none_or(|p| s.base_price >= p))
                .filter(|s| query.max_price.is_none_or(|p| s.base_price <= p))
                .filter(|s| {
                    needle.as_deref().is_none_or(|n| {
                        s.name.to_lowercase().contains(n) || s.code.to_lowercase().contains(n)
                    })
                })
                .cloned(),
            query.page,
        ))
    }

    async fn save(&self, tenant_id: Uuid, service: &DentalService) -> anyhow::Result<DentalService> {
        replace(&mut self.lock().services, service, |s| {
            s.tenant_id == tenant_id && s.id == service.id
        })
    }

    async fn category_summary(&self, tenant_id: Uuid) -> anyhow::Result<Vec<CategorySummary>> {
        let inner = self.lock();
        let mut out = Vec::new();
        for category in ServiceCategory::ALL {
            let prices: Vec<f64> = inner
                .services
                .iter()
                .filter(|s| s.tenant_id == tenant_id && s.category == *category && s.is_active())
                .map(|s| s.base_price)
                .collect();
            if prices.is_empty() {
                continue;
            }
            out.push(CategorySummary {
                category: *category,
                count: prices.len() as i64,
                average_price: round_cents(prices.iter().sum::<f64>() / prices.len() as f64),
                min_price: prices.iter().copied().fold(f64::INFINITY, f64::min),
                max_price: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl ConsultationRepository for MemoryStore {
    async fn create(
        &self,
        tenant_id: Uuid,
        c: &NewConsultation,
    ) -> anyhow::Result<Consultation> {
        let now = Utc::now();
        let consultation = Consultation {
            id: Uuid::new_v4(),
            tenant_id,
            appointment_id: c.appointment_id,
            patient_id: c.patient_id,
            dentist_id: c.dentist_id,
            chief_complaint: c.chief_complaint.clone(),
            medical_history_review: c.medical_history_review.clone(),
            dental_history_review: c.dental_history_review.clone(),
            extraoral_findings: c.extraoral_findings.clone(),
            intraoral_findings: c.intraoral_findings.clone(),
            periodontal_assessment: c.periodontal_assessment.clone(),
            occlusion_assessment: c.occlusion_assessment.clone(),
            diagnosis: c.diagnosis.clone(),
            treatment_plan: c.treatment_plan.clone(),
            recommendations: c.recommendations.clone(),
            consultation_fee: c.consultation_fee,
            next_appointment_date: c.next_appointment_date,
            created_at: now,
            updated_at: now,
        };
        self.lock().consultations.push(consultation.clone());
        Ok(consultation)
    }

    async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<Consultation>> {
        Ok(self
            .lock()
            .consultations
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.id == id)
            .cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: &ConsultationQuery,
    ) -> anyhow::Result<Vec<Consultation>> {
        let inner = self.lock();
        Ok(paged(
            inner
                .consultations
                .iter()
                .filter(|c| c.tenant_id == tenant_id)
                .filter(|c| query.patient_id.is_none_or(|id| c.patient_id == id))
                .filter(|c| query.dentist_id.is_none_or(|id| c.dentist_id == id))
                .cloned(),
            query.page,
        ))
    }

    async fn save(
        &self,
        tenant_id: Uuid,
        consultation: &Consultation,
    ) -> anyhow::Result<Consultation> {
        replace(&mut self.lock().consultations, consultation, |c| {
            c.tenant_id == tenant_id && c.id == consultation.id
        })
    }
}

#[async_trait]
impl TreatmentRepository for MemoryStore {
    async fn create(&self, tenant_id: Uuid, treatment: &NewTreatment) -> anyhow::Result<Treatment> {
        let t = build_treatment(tenant_id, treatment);
        self.lock().treatments.push(t.clone());
        Ok(t)
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Treatment>> {
        Ok(self
            .lock()
            .treatments
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.id == id)
            .cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: &TreatmentQuery,
    ) -> anyhow::Result<Vec<Treatment>> {
        let inner = self.lock();
        Ok(paged(
            inner
                .treatments
                .iter()
                .filter(|t| t.tenant_id == tenant_id)
                .filter(|t| query.patient_id.is_none_or(|id| t.patient_id == id))
                .filter(|t| query.dentist_id.is_none_or(|id| t.dentist_id == id))
                .filter(|t| query.status.is_none_or(|s| t.status == s))
                .cloned(),
            query.page,
        ))
    }

    async fn save(&self, tenant_id: Uuid, treatment: &Treatment) -> anyhow::Result<Treatment> {
        replace(&mut self.lock().treatments, treatment, |t| {
            t.tenant_id == tenant_id && t.id == treatment.id
        })
    }

    async fn add_item(
        &self,
        tenant_id: Uuid,
        item: &NewTreatmentItem,
    ) -> anyhow::Result<TreatmentItem> {
        let i = TreatmentItem {
            id: Uuid::new_v4(),
            tenant_id,
            treatment_id: item.treatment_id,
            service_id: item.service_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            status: ItemStatus::Planned,
            tooth_number: item.tooth_number.clone(),
            surface: item.surface.clone(),
            notes: item.notes.clone(),
            created_at: Utc::now(),
            completed_at: None,
        };
        self.lock().treatment_items.push(i.clone());
        Ok(i)
    }

    async fn items(
        &self,
        tenant_id: Uuid,
        treatment_id: Uuid,
    ) -> anyhow::Result<Vec<TreatmentItem>> {
        Ok(self
            .lock()
            .treatment_items
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.treatment_id == treatment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn create(
        &self,
        tenant_id: Uuid,
        invoice: &NewInvoice,
    ) -> anyhow::Result<(Invoice, Vec<InvoiceItem>)> {
        let now = Utc::now();
        let mut inner = self.lock();
        let issue_date = invoice
            .issue_day
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(now);
        let sequence = inner
            .invoices
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.issue_date.date_naive() == invoice.issue_day)
            .count() as i64
            + 1;
        let created = Invoice {
            id: Uuid::new_v4(),
            tenant_id,
            patient_id: invoice.patient_id,
            invoice_number: format_invoice_number(invoice.issue_day, sequence),
            status: InvoiceStatus::Draft,
            subtotal: invoice.totals.subtotal,
            tax_amount: invoice.totals.tax_amount,
            discount_amount: invoice.totals.discount_amount,
            total_amount: invoice.totals.total_amount,
            amount_paid: 0.0,
            balance_due: invoice.totals.balance_due,
            issue_date,
            due_date: invoice.due_date,
            paid_date: None,
            notes: invoice.notes.clone(),
            terms: invoice.terms.clone(),
            created_at: now,
            updated_at: now,
        };
        let items: Vec<InvoiceItem> = invoice
            .items
            .iter()
            .map(|i| InvoiceItem {
                id: Uuid::new_v4(),
                tenant_id,
                invoice_id: created.id,
                treatment_item_id: i.treatment_item_id,
                description: i.description.clone(),
                quantity: i.quantity,
                unit_price: i.unit_price,
                tax_rate: i.tax_rate,
            })
            .collect();
        inner.invoices.push(created.clone());
        inner.invoice_items.extend(items.iter().cloned());
        Ok((created, items))
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Invoice>> {
        Ok(self
            .lock()
            .invoices
            .iter()
            .find(|i| i.tenant_id == tenant_id && i.id == id)
            .cloned())
    }

    async fn items(&self, tenant_id: Uuid, invoice_id: Uuid) -> anyhow::Result<Vec<InvoiceItem>> {
        Ok(self
            .lock()
            .invoice_items
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn payments(&self, tenant_id: Uuid, invoice_id: Uuid) -> anyhow::Result<Vec<Payment>> {
        Ok(self
            .lock()
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn list(&self, tenant_id: Uuid, query: &InvoiceQuery) -> anyhow::Result<Vec<Invoice>> {
        let inner = self.lock();
        Ok(paged(
            inner
                .invoices
                .iter()
                .filter(|i| i.tenant_id == tenant_id)
                .filter(|i| query.patient_id.is_none_or(|id| i.patient_id == id))
                .filter(|i| query.status.is_none_or(|s| i.status == s))
                .cloned(),
            query.page,
        ))
    }

    async fn record_payment(
        &self,
        tenant_id: Uuid,
        payment: &NewPayment,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PaymentRecord> {
        let mut inner = self.lock();
        let Some(invoice) = inner
            .invoices
            .iter_mut()
            .find(|i| i.tenant_id == tenant_id && i.id == payment.invoice_id)
        else {
            return Ok(PaymentRecord::NotFound);
        };
        let outcome = match invoice.apply_payment(payment.amount, now) {
            Ok(outcome) => outcome,
            Err(reason) => return Ok(PaymentRecord::Rejected(reason)),
        };
        invoice.amount_paid = outcome.amount_paid;
        invoice.balance_due = outcome.balance_due;
        invoice.status = outcome.status;
        invoice.paid_date = outcome.paid_date;
        invoice.updated_at = now;
        let recorded = Payment {
            id: Uuid::new_v4(),
            tenant_id,
            invoice_id: payment.invoice_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            reference_number: payment.reference_number.clone(),
            notes: payment.notes.clone(),
            is_confirmed: true,
            payment_date: now,
            created_at: now,
        };
        inner.payments.push(recorded.clone());
        Ok(PaymentRecord::Recorded {
            payment: recorded,
            outcome,
        })
    }

    async fn update_draft(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        edit: &InvoiceEdit,
    ) -> anyhow::Result<Option<Invoice>> {
        let mut inner = self.lock();
        Ok(inner
            .invoices
            .iter_mut()
            .find(|i| i.tenant_id == tenant_id && i.id == id && i.status == InvoiceStatus::Draft)
            .map(|i| {
                i.due_date = edit.due_date;
                i.notes = edit.notes.clone();
                i.terms = edit.terms.clone();
                i.discount_amount = edit.totals.discount_amount;
                i.total_amount = edit.totals.total_amount;
                i.balance_due = edit.totals.balance_due;
                i.updated_at = Utc::now();
                i.clone()
            }))
    }

    async fn set_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
    ) -> anyhow::Result<Option<Invoice>> {
        let mut inner = self.lock();
        Ok(inner
            .invoices
            .iter_mut()
            .find(|i| i.tenant_id == tenant_id && i.id == id)
            .map(|i| {
                i.status = status;
                i.updated_at = Utc::now();
                i.clone()
            }))
    }

    async fn summary(&self, tenant_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<InvoiceSummary> {
        let inner = self.lock();
        let mine: Vec<&Invoice> = inner
            .invoices
            .iter()
            .filter(|i| i.tenant_id == tenant_id)
            .collect();
        let paid: Vec<f64> = mine
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .map(|i| i.total_amount)
            .collect();
        let total_revenue: f64 = paid.iter().sum();
        Ok(InvoiceSummary {
            total_invoices: mine.len() as i64,
            total_revenue: round_cents(total_revenue),
            pending_amount: round_cents(
                mine.iter()
                    .filter(|i| InvoiceStatus::OUTSTANDING.contains(&i.status))
                    .map(|i| i.balance_due)
                    .sum(),
            ),
            overdue_amount: round_cents(
                mine.iter()
                    .filter(|i| i.is_overdue(now))
                    .map(|i| i.balance_due)
                    .sum(),
            ),
            average_invoice_amount: if paid.is_empty() {
                0.0
            } else {
                round_cents(total_revenue / paid.len() as f64)
            },
        })
    }
}

#[async_trait]
impl PrescriptionRepository for MemoryStore {
    async fn create(
        &self,
        tenant_id: Uuid,
        p: &NewPrescription,
    ) -> anyhow::Result<Prescription> {
        let now = Utc::now();
        let rx = Prescription {
            id: Uuid::new_v4(),
            tenant_id,
            patient_id: p.patient_id,
            dentist_id: p.dentist_id,
            treatment_id: p.treatment_id,
            medication_name: p.medication_name.clone(),
            dosage: p.dosage.clone(),
            frequency: p.frequency.clone(),
            duration: p.duration.clone(),
            instructions: p.instructions.clone(),
            quantity: p.quantity.clone(),
            refills: p.refills,
            is_dispensed: false,
            dispensed_at: None,
            created_at: now,
            updated_at: now,
            expires_at: p.expires_at,
        };
        self.lock().prescriptions.push(rx.clone());
        Ok(rx)
    }

    async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<Prescription>> {
        Ok(self
            .lock()
            .prescriptions
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.id == id)
            .cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: &PrescriptionQuery,
    ) -> anyhow::Result<Vec<Prescription>> {
        let inner = self.lock();
        Ok(paged(
            inner
                .prescriptions
                .iter()
                .filter(|p| p.tenant_id == tenant_id)
                .filter(|p| query.patient_id.is_none_or(|id| p.patient_id == id))
                .filter(|p| query.active_at.is_none_or(|now| p.is_active(now)))
                .cloned(),
            query.page,
        ))
    }

    async fn undispensed_expiring_before(
        &self,
        tenant_id: Uuid,
        before: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Prescription>> {
        Ok(self
            .lock()
            .prescriptions
            .iter()
            .filter(|p| p.tenant_id == tenant_id && !p.is_dispensed && p.expires_at <= before)
            .cloned()
            .collect())
    }

    async fn save(
        &self,
        tenant_id: Uuid,
        prescription: &Prescription,
    ) -> anyhow::Result<Prescription> {
        replace(&mut self.lock().prescriptions, prescription, |p| {
            p.tenant_id == tenant_id && p.id == prescription.id
        })
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let before = inner.prescriptions.len();
        inner
            .prescriptions
            .retain(|p| !(p.tenant_id == tenant_id && p.id == id));
        Ok(inner.prescriptions.len() != before)
    }
}

#[async_trait]
impl MedicalRecordRepository for MemoryStore {
    async fn create(
        &self,
        tenant_id: Uuid,
        r: &NewMedicalRecord,
    ) -> anyhow::Result<MedicalRecord> {
        let now = Utc::now();
        let file = r.file.as_ref();
        let record = MedicalRecord {
            id: r.id,
            tenant_id,
            patient_id: r.patient_id,
            created_by: r.created_by,
            record_type: r.record_type,
            title: r.title.clone(),
            description: r.description.clone(),
            file_path: file.map(|f| f.file_path.clone()),
            file_name: file.map(|f| f.file_name.clone()),
            file_size: file.map(|f| f.file_size),
            mime_type: file.map(|f| f.mime_type.clone()),
            checksum: file.map(|f| f.checksum.clone()),
            clinical_data: r.clinical_data.clone(),
            tags: r.tags.clone(),
            record_date: r.record_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        self.lock().records.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<MedicalRecord>> {
        Ok(self
            .lock()
            .records
            .iter()
            .find(|r| r.tenant_id == tenant_id && r.id == id)
            .cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: &MedicalRecordQuery,
    ) -> anyhow::Result<Vec<MedicalRecord>> {
        let inner = self.lock();
        Ok(paged(
            inner
                .records
                .iter()
                .filter(|r| r.tenant_id == tenant_id)
                .filter(|r| query.patient_id.is_none_or(|id| r.patient_id == id))
                .filter(|r| query.record_type.is_none_or(|t| r.record_type == t))
                .cloned(),
            query.page,
        ))
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let before = inner.records.len();
        inner
            .records
            .retain(|r| !(r.tenant_id == tenant_id && r.id == id));
        Ok(inner.records.len() != before)
    }
}

#[async_trait]
impl MedicalFileStore for MemoryStore {
    async fn store(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredFile> {
        let relative_path = format!("{tenant_id}/{record_id}{extension}");
        self.lock()
            .files
            .insert(relative_path.clone(), bytes.to_vec());
        Ok(StoredFile {
            relative_path,
            size: bytes.len() as i64,
            checksum: sha256_hex(bytes),
        })
    }

    async fn load(&self, relative_path: &str) -> anyhow::Result<Vec<u8>> {
        self.lock()
            .files
            .get(relative_path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("file not found: {relative_path}"))
    }

    async fn secure_delete(&self, relative_path: &str) -> anyhow::Result<()> {
        self.lock().files.remove(relative_path);
        Ok(())
    }

    async fn is_writable(&self) -> bool {
        true
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn record(&self, tenant_id: Uuid, entry: &AuditEntry) -> anyhow::Result<()> {
        self.lock().audit.push(AuditLog {
            id: Uuid::new_v4(),
            tenant_id,
            user_id: entry.user_id,
            action: entry.action,
            entity_type: entry.entity_type.to_string(),
            entity_id: entry.entity_id,
            details: entry.details.clone(),
            ip_address: entry.ip_address.clone(),
            user_agent: entry.user_agent.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list(&self, tenant_id: Uuid, query: &AuditQuery) -> anyhow::Result<Vec<AuditLog>> {
        let inner = self.lock();
        Ok(paged(
            inner
                .audit
                .iter()
                .filter(|a| a.tenant_id == tenant_id)
                .filter(|a| {
                    query
                        .entity_type
                        .as_deref()
                        .is_none_or(|t| a.entity_type == t)
                })
                .filter(|a| query.entity_id.is_none_or(|id| a.entity_id == id))
                .filter(|a| query.user_id.is_none_or(|id| a.user_id == id))
                .cloned(),
            query.page,
        ))
    }
}

#[async_trait]
impl ReportingRepository for MemoryStore {
    async fn dashboard_stats(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DashboardStats> {
        let inner = self.lock();
        let since = now - Duration::days(30);
        let month = month_start(now);
        let today = now.date_naive();
        Ok(DashboardStats {
            total_patients: inner
                .patients
                .iter()
                .filter(|p| p.tenant_id == tenant_id && p.status == PatientStatus::Active)
                .count() as i64,
            total_appointments: inner
                .appointments
                .iter()
                .filter(|a| a.tenant_id == tenant_id && a.appointment_date >= since)
                .count() as i64,
            total_invoices: inner
                .invoices
                .iter()
                .filter(|i| i.tenant_id == tenant_id && i.issue_date >= since)
                .count() as i64,
            monthly_revenue: round_cents(
                inner
                    .invoices
                    .iter()
                    .filter(|i| {
                        i.tenant_id == tenant_id
                            && i.status == InvoiceStatus::Paid
                            && i.paid_date.is_some_and(|d| d >= month)
                    })
                    .map(|i| i.total_amount)
                    .sum(),
            ),
            pending_appointments: inner
                .appointments
                .iter()
                .filter(|a| {
                    a.tenant_id == tenant_id
                        && AppointmentStatus::UPCOMING.contains(&a.status)
                        && a.appointment_date.date_naive() >= today
                })
                .count() as i64,
            overdue_invoices: inner
                .invoices
                .iter()
                .filter(|i| i.tenant_id == tenant_id && i.is_overdue(now))
                .count() as i64,
        })
    }

    async fn appointments_overview(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> anyhow::Result<AppointmentsOverview> {
        let inner = self.lock();
        let window: Vec<&Appointment> = inner
            .appointments
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.appointment_date >= since)
            .collect();
        let mut by_status: HashMap<String, i64> = HashMap::new();
        let mut by_type: HashMap<String, i64> = HashMap::new();
        for a in &window {
            *by_status.entry(a.status.to_string()).or_default() += 1;
            *by_type.entry(a.appointment_type.to_string()).or_default() += 1;
        }
        let mut by_status: Vec<(String, i64)> = by_status.into_iter().collect();
        let mut by_type: Vec<(String, i64)> = by_type.into_iter().collect();
        by_status.sort();
        by_type.sort();
        Ok(AppointmentsOverview {
            total: window.len() as i64,
            by_status,
            by_type,
        })
    }

    async fn revenue_by_month(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MonthlyRevenue>> {
        let inner = self.lock();
        let mut months: HashMap<String, (f64, i64)> = HashMap::new();
        for i in inner.invoices.iter().filter(|i| {
            i.tenant_id == tenant_id
                && i.status == InvoiceStatus::Paid
                && i.paid_date.is_some_and(|d| d >= since)
        }) {
            if let Some(paid) = i.paid_date {
                let entry = months.entry(paid.format("%Y-%m").to_string()).or_default();
                entry.0 += i.total_amount;
                entry.1 += 1;
            }
        }
        let mut out: Vec<MonthlyRevenue> = months
            .into_iter()
            .map(|(month, (revenue, invoices_paid))| MonthlyRevenue {
                month,
                revenue: round_cents(revenue),
                invoices_paid,
            })
            .collect();
        out.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(out)
    }
}
