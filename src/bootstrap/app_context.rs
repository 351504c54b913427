use std::sync::Arc;

use crate::application::ports::appointment_repository::AppointmentRepository;
use crate::application::ports::audit_repository::AuditRepository;
use crate::application::ports::auth_repository::AuthRepository;
use crate::application::ports::cache_port::CachePort;
use crate::application::ports::catalog_repository::CatalogRepository;
use crate::application::ports::consultation_repository::ConsultationRepository;
use crate::application::ports::invoice_repository::InvoiceRepository;
use crate::application::ports::medical_file_store::MedicalFileStore;
use crate::application::ports::medical_record_repository::MedicalRecordRepository;
use crate::application::ports::patient_repository::PatientRepository;
use crate::application::ports::prescription_repository::PrescriptionRepository;
use crate::application::ports::rate_limiter::RateLimiter;
use crate::application::ports::reporting_repository::ReportingRepository;
use crate::application::ports::tenant_repository::TenantRepository;
use crate::application::ports::treatment_repository::TreatmentRepository;
use crate::application::ports::user_repository::UserRepository;
use crate::bootstrap::config::Config;
use crate::infrastructure::db::PgPool;
use crate::infrastructure::db::repositories::{
    appointment_repository_sqlx::SqlxAppointmentRepository,
    audit_repository_sqlx::SqlxAuditRepository, auth_repository_sqlx::SqlxAuthRepository,
    catalog_repository_sqlx::SqlxCatalogRepository,
    consultation_repository_sqlx::SqlxConsultationRepository,
    invoice_repository_sqlx::SqlxInvoiceRepository,
    medical_record_repository_sqlx::SqlxMedicalRecordRepository,
    patient_repository_sqlx::SqlxPatientRepository,
    prescription_repository_sqlx::SqlxPrescriptionRepository,
    reporting_repository_sqlx::SqlxReportingRepository,
    tenant_repository_sqlx::SqlxTenantRepository,
    treatment_repository_sqlx::SqlxTreatmentRepository, user_repository_sqlx::SqlxUserRepository,
};
use crate::infrastructure::storage::EncryptedFsStore;

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

#[derive(Clone)]
pub struct AppServices {
    pool: PgPool,
    tenant_repo: Arc<dyn TenantRepository>,
    user_repo: Arc<dyn UserRepository>,
    auth_repo: Arc<dyn AuthRepository>,
    patient_repo: Arc<dyn PatientRepository>,
    appointment_repo: Arc<dyn AppointmentRepository>,
    catalog_repo: Arc<dyn CatalogRepository>,
    consultation_repo: Arc<dyn ConsultationRepository>,
    treatment_repo: Arc<dyn TreatmentRepository>,
    invoice_repo: Arc<dyn InvoiceRepository>,
    prescription_repo: Arc<dyn PrescriptionRepository>,
    medical_record_repo: Arc<dyn MedicalRecordRepository>,
    medical_files: Arc<dyn MedicalFileStore>,
    audit_repo: Arc<dyn AuditRepository>,
    reporting_repo: Arc<dyn ReportingRepository>,
    cache: Arc<dyn CachePort>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AppServices {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        tenant_repo: Arc<dyn TenantRepository>,
        user_repo: Arc<dyn UserRepository>,
        auth_repo: Arc<dyn AuthRepository>,
        patient_repo: Arc<dyn PatientRepository>,
        appointment_repo: Arc<dyn AppointmentRepository>,
        catalog_repo: Arc<dyn CatalogRepository>,
        consultation_repo: Arc<dyn ConsultationRepository>,
        treatment_repo: Arc<dyn TreatmentRepository>,
        invoice_repo: Arc<dyn InvoiceRepository>,
        prescription_repo: Arc<dyn PrescriptionRepository>,
        medical_record_repo: Arc<dyn MedicalRecordRepository>,
        medical_files: Arc<dyn MedicalFileStore>,
        audit_repo: Arc<dyn AuditRepository>,
        reporting_repo: Arc<dyn ReportingRepository>,
        cache: Arc<dyn CachePort>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            pool,
            tenant_repo,
            user_repo,
            auth_repo,
            patient_repo,
            appointment_repo,
            catalog_repo,
            consultation_repo,
            treatment_repo,
            invoice_repo,
            prescription_repo,
            medical_record_repo,
            medical_files,
            audit_repo,
            reporting_repo,
            cache,
            rate_limiter,
        }
    }

    /// Wires every port to its PostgreSQL adapter and medical files to the encrypted store.
    pub fn postgres(
        cfg: &Config,
        pool: PgPool,
        cache: Arc<dyn CachePort>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self::new(
            pool.clone(),
            Arc::new(SqlxTenantRepository::new(pool.clone())),
            Arc::new(SqlxUserRepository::new(pool.clone())),
            Arc::new(SqlxAuthRepository::new(pool.clone())),
            Arc::new(SqlxPatientRepository::new(
                pool.clone(),
                cfg.file_encryption_key.clone(),
            )),
            Arc::new(SqlxAppointmentRepository::new(pool.clone())),
            Arc::new(SqlxCatalogRepository::new(pool.clone())),
            Arc::new(SqlxConsultationRepository::new(pool.clone())),
            Arc::new(SqlxTreatmentRepository::new(pool.clone())),
            Arc::new(SqlxInvoiceRepository::new(pool.clone())),
            Arc::new(SqlxPrescriptionRepository::new(pool.clone())),
            Arc::new(SqlxMedicalRecordRepository::new(pool.clone())),
            Arc::new(EncryptedFsStore::new(
                cfg.medical_records_storage_path.clone(),
                cfg.file_encryption_key.clone(),
            )),
            Arc::new(SqlxAuditRepository::new(pool.clone())),
            Arc::new(SqlxReportingRepository::new(pool)),
            cache,
            rate_limiter,
        )
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn pool(&self) -> PgPool {
        self.services.pool.clone()
    }

    pub fn tenant_repo(&self) -> Arc<dyn TenantRepository> {
        self.services.tenant_repo.clone()
    }

    pub fn user_repo(&self) -> Arc<dyn UserRepository> {
        self.services.user_repo.clone()
    }

    pub fn auth_repo(&self) -> Arc<dyn AuthRepository> {
        self.services.auth_repo.clone()
    }

    pub fn patient_repo(&self) -> Arc<dyn PatientRepository> {
        self.services.patient_repo.clone()
    }

    pub fn appointment_repo(&self) -> Arc<dyn AppointmentRepository> {
        self.services.appointment_repo.clone()
    }

    pub fn catalog_repo(&self) -> Arc<dyn CatalogRepository> {
        self.services.catalog_repo.clone()
    }

    pub fn consultation_repo(&self) -> Arc<dyn ConsultationRepository> {
        self.services.consultation_repo.clone()
    }

    pub fn treatment_repo(&self) -> Arc<dyn TreatmentRepository> {
        self.services.treatment_repo.clone()
    }

    pub fn invoice_repo(&self) -> Arc<dyn InvoiceRepository> {
        self.services.invoice_repo.clone()
    }

    pub fn prescription_repo(&self) -> Arc<dyn PrescriptionRepository> {
        self.services.prescription_repo.clone()
    }

    pub fn medical_record_repo(&self) -> Arc<dyn MedicalRecordRepository> {
        self.services.medical_record_repo.clone()
    }

    pub fn medical_files(&self) -> Arc<dyn MedicalFileStore> {
        self.services.medical_files.clone()
    }

    pub fn audit_repo(&self) -> Arc<dyn AuditRepository> {
        self.services.audit_repo.clone()
    }

    pub fn reporting_repo(&self) -> Arc<dyn ReportingRepository> {
        self.services.reporting_repo.clone()
    }

    pub fn cache(&self) -> Arc<dyn CachePort> {
        self.services.cache.clone()
    }

    pub fn rate_limiter(&self) -> Arc<dyn RateLimiter> {
        self.services.rate_limiter.clone()
    }
}
