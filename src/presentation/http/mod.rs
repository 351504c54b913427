pub mod appointments;
pub mod audit;
pub mod auth;
pub mod client;
pub mod consultations;
pub mod dashboard;
pub mod error;
pub mod health;
pub mod invoices;
pub mod medical_records;
pub mod patient_assignments;
pub mod patients;
pub mod prescriptions;
pub mod security;
pub mod services;
pub mod tenant;
pub mod tenants;
pub mod treatments;
pub mod users;

use axum::extract::{DefaultBodyLimit, MatchedPath};
use axum::response::Html;
use axum::{Router, routing::get};
use http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::bootstrap::app_context::AppContext;
use crate::bootstrap::config::Config;

pub const API_PREFIX: &str = "/api/v2";

// Room for the multipart text fields that travel next to an upload.
const MULTIPART_SLACK_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
        info(title = "Dental Clinic SaaS API", description = "Multi-tenant dental practice management"),
        paths(
            health::health,
            health::startup_check,
            auth::login,
            auth::refresh,
            auth::logout,
            auth::logout_all,
            auth::register,
            auth::me,
            auth::change_password,
            auth::list_sessions,
            auth::revoke_session,
            auth::revoke_other_sessions,
            auth::list_user_sessions,
            auth::force_logout,
            auth::request_password_reset,
            auth::verify_password_reset,
            auth::complete_password_reset,
            users::list_users,
            users::create_user,
            users::available_dentists,
            users::get_user,
            users::update_user,
            users::deactivate_user,
            tenants::register_tenant,
            tenants::create_tenant,
            tenants::list_tenants,
            tenants::get_tenant,
            tenants::update_tenant,
            tenants::delete_tenant,
            tenants::tenant_stats,
            tenants::tenant_usage,
            tenants::list_public_tenants,
            tenants::tenant_info,
            tenants::tenant_health,
            patients::search_patients,
            patients::create_patient,
            patients::get_patient,
            patients::update_patient,
            patients::delete_patient,
            patient_assignments::assign_dentist,
            patient_assignments::reassign_dentist,
            patient_assignments::remove_dentist,
            patient_assignments::auto_assign_dentist,
            patient_assignments::transfer_patient,
            patient_assignments::all_workloads,
            patient_assignments::dentist_workload,
            patient_assignments::dentist_patients,
            appointments::list_appointments,
            appointments::create_appointment,
            appointments::available_slots,
            appointments::upcoming_appointments,
            appointments::get_appointment,
            appointments::update_appointment,
            appointments::update_status,
            appointments::cancel_appointment,
            services::list_services,
            services::create_service,
            services::categories_summary,
            services::get_service,
            services::update_service,
            services::deactivate_service,
            consultations::list_consultations,
            consultations::create_consultation,
            consultations::get_consultation,
            consultations::update_consultation,
            consultations::add_diagnosis,
            treatments::list_treatments,
            treatments::create_treatment,
            treatments::get_treatment,
            treatments::update_treatment,
            treatments::update_status,
            treatments::add_progress_note,
            treatments::add_item,
            treatments::treatment_cost,
            invoices::list_invoices,
            invoices::create_invoice,
            invoices::invoice_summary,
            invoices::get_invoice,
            invoices::update_invoice,
            invoices::add_payment,
            invoices::send_invoice,
            invoices::cancel_invoice,
            prescriptions::list_prescriptions,
            prescriptions::create_prescription,
            prescriptions::expiry_check,
            prescriptions::get_prescription,
            prescriptions::update_prescription,
            prescriptions::dispense_prescription,
            prescriptions::delete_prescription,
            medical_records::list_records,
            medical_records::create_record,
            medical_records::upload_record,
            medical_records::get_record,
            medical_records::download_record,
            medical_records::delete_record,
            dashboard::dashboard_stats,
            dashboard::appointments_overview,
            dashboard::revenue_overview,
            audit::list_audit_logs,
        ),
        components(schemas(
            error::ErrorBody,
            health::HealthResp,
            health::CheckResult,
            health::StartupCheckResp,
            auth::LoginRequest,
            auth::TokenResponse,
            auth::RefreshRequest,
            auth::LogoutRequest,
            auth::RegisterRequest,
            auth::ChangePasswordRequest,
            auth::SessionResponse,
            auth::RevokedResponse,
            auth::ResetRequest,
            auth::ResetVerifyRequest,
            auth::ResetCompleteRequest,
            auth::MessageResponse,
            users::UserResponse,
            users::CreateUserRequest,
            users::UpdateUserRequest,
            tenants::TenantResponse,
            tenants::PublicTenant,
            tenants::TierFeaturesResponse,
            tenants::TenantInfoResponse,
            tenants::AdminAccount,
            tenants::RegisterTenantRequest,
            tenants::RegisterTenantResponse,
            tenants::CreateTenantRequest,
            tenants::UpdateTenantRequest,
            tenants::TenantStatsResponse,
            tenants::UsageResponse,
            tenants::TenantHealthResponse,
            patients::PatientResponse,
            patients::CreatePatientRequest,
            patients::UpdatePatientRequest,
            patient_assignments::AssignDentistRequest,
            patient_assignments::ReassignDentistRequest,
            patient_assignments::TransferPatientRequest,
            patient_assignments::AssignmentResponse,
            patient_assignments::TransferResponse,
            patient_assignments::WorkloadResponse,
            appointments::AppointmentResponse,
            appointments::CreateAppointmentRequest,
            appointments::UpdateAppointmentRequest,
            appointments::StatusUpdateRequest,
            appointments::SlotResponse,
            appointments::AvailableSlotsResponse,
            services::ServiceResponse,
            services::CreateServiceRequest,
            services::UpdateServiceRequest,
            services::CategorySummaryResponse,
            consultations::ConsultationResponse,
            consultations::CreateConsultationRequest,
            consultations::UpdateConsultationRequest,
            treatments::TreatmentResponse,
            treatments::TreatmentItemResponse,
            treatments::CreateTreatmentRequest,
            treatments::UpdateTreatmentRequest,
            treatments::TreatmentStatusRequest,
            treatments::ProgressNoteRequest,
            treatments::AddItemRequest,
            treatments::TreatmentCostResponse,
            invoices::InvoiceResponse,
            invoices::InvoiceItemResponse,
            invoices::PaymentResponse,
            invoices::InvoiceItemRequest,
            invoices::CreateInvoiceRequest,
            invoices::UpdateInvoiceRequest,
            invoices::AddPaymentRequest,
            invoices::InvoiceSummaryResponse,
            prescriptions::PrescriptionResponse,
            prescriptions::CreatePrescriptionRequest,
            prescriptions::UpdatePrescriptionRequest,
            prescriptions::ExpiryCheckResponse,
            medical_records::MedicalRecordResponse,
            medical_records::CreateRecordRequest,
            medical_records::UploadRecordMultipart,
            dashboard::DashboardStatsResponse,
            dashboard::AppointmentsOverviewResponse,
            dashboard::MonthlyRevenueResponse,
            dashboard::RevenueOverviewResponse,
            audit::AuditLogResponse,
            crate::domain::appointments::AppointmentStatus,
            crate::domain::appointments::AppointmentType,
            crate::domain::audit::AuditAction,
            crate::domain::billing::InvoiceStatus,
            crate::domain::billing::PaymentMethod,
            crate::domain::catalog::ServiceCategory,
            crate::domain::catalog::ServiceStatus,
            crate::domain::medical_records::RecordType,
            crate::domain::patients::PatientStatus,
            crate::domain::tenants::BillingCycle,
            crate::domain::tenants::PaymentStatus,
            crate::domain::tenants::TenantStatus,
            crate::domain::tenants::TenantTier,
            crate::domain::treatments::ItemStatus,
            crate::domain::treatments::TreatmentPriority,
            crate::domain::treatments::TreatmentStatus,
            crate::domain::users::Gender,
            crate::domain::users::Permission,
            crate::domain::users::StaffRole,
        )),
        modifiers(&BearerAuth),
        security(("bearer_auth" = [])),
        tags(
            (name = "Health", description = "Liveness and readiness checks"),
            (name = "Auth", description = "Login, token refresh, sessions and password reset"),
            (name = "Users", description = "Clinic staff"),
            (name = "Tenants", description = "Clinic registration and administration"),
            (name = "Patients", description = "Patient records"),
            (name = "Patient Assignments", description = "Primary dentist assignment and workloads"),
            (name = "Appointments", description = "Scheduling"),
            (name = "Services", description = "Service catalog"),
            (name = "Consultations", description = "Clinical consultations"),
            (name = "Treatments", description = "Treatment plans and procedures"),
            (name = "Invoices", description = "Billing and payments"),
            (name = "Prescriptions", description = "Prescriptions"),
            (name = "Medical Records", description = "Encrypted medical files"),
            (name = "Dashboard", description = "Clinic reporting"),
            (name = "Audit", description = "Audit trail")
        )
    )]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

const REDOC_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Dental Clinic SaaS API</title>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1">
  </head>
  <body>
    <redoc spec-url="/openapi.json"></redoc>
    <script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"></script>
  </body>
</html>
"#;

async fn redoc() -> Html<&'static str> {
    Html(REDOC_PAGE)
}

fn cors_layer(cfg: &Config) -> CorsLayer {
    let mut headers = vec![header::CONTENT_TYPE, header::AUTHORIZATION];
    match HeaderName::try_from(cfg.tenant_id_header.as_str()) {
        Ok(name) => headers.push(name),
        Err(e) => tracing::warn!(error = ?e, header = %cfg.tenant_id_header, "invalid_tenant_header_name"),
    }
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(headers);

    if cfg.allows_any_origin() {
        // Wildcard origins cannot carry credentials.
        return base.allow_origin(AllowOrigin::any());
    }
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "invalid_cors_origin_skipped");
                None
            }
        })
        .collect();
    if !origins.is_empty() {
        return base
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true);
    }
    if cfg.is_production {
        base.allow_origin(AllowOrigin::exact(HeaderValue::from_static("http://invalid")))
    } else {
        base.allow_origin(AllowOrigin::mirror_request())
            .allow_credentials(true)
    }
}

/// Every route of the service under `/api/v2`, plus the docs outside production.
pub fn build_router(ctx: AppContext) -> Router {
    let cfg = ctx.cfg.clone();

    let mut router = Router::new()
        .nest(API_PREFIX, health::routes(ctx.clone()))
        .nest(&format!("{API_PREFIX}/auth"), auth::routes(ctx.clone()))
        .nest(API_PREFIX, users::routes(ctx.clone()))
        .nest(API_PREFIX, tenants::routes(ctx.clone()))
        .nest(API_PREFIX, patients::routes(ctx.clone()))
        .nest(API_PREFIX, patient_assignments::routes(ctx.clone()))
        .nest(API_PREFIX, appointments::routes(ctx.clone()))
        .nest(API_PREFIX, services::routes(ctx.clone()))
        .nest(API_PREFIX, consultations::routes(ctx.clone()))
        .nest(API_PREFIX, treatments::routes(ctx.clone()))
        .nest(API_PREFIX, invoices::routes(ctx.clone()))
        .nest(API_PREFIX, prescriptions::routes(ctx.clone()))
        .nest(API_PREFIX, medical_records::routes(ctx.clone()))
        .nest(API_PREFIX, dashboard::routes(ctx.clone()))
        .nest(API_PREFIX, audit::routes(ctx));

    if cfg.docs_enabled() {
        router = router
            .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
            .route("/redoc", get(redoc));
    }

    router
        .layer(cors_layer(&cfg))
        .layer(DefaultBodyLimit::max(
            cfg.max_upload_bytes.saturating_add(MULTIPART_SLACK_BYTES),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_tag_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let tags: Vec<String> = doc
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.name)
            .collect();
        for expected in ["Health", "Auth", "Patients", "Invoices", "Medical Records", "Audit"] {
            assert!(tags.iter().any(|t| t == expected), "missing tag {expected}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn openapi_paths_carry_the_version_prefix() {
        let doc = ApiDoc::openapi();
        assert!(!doc.paths.paths.is_empty());
        assert!(doc.paths.paths.keys().all(|p| p.starts_with(API_PREFIX)));
        assert!(doc.paths.paths.contains_key("/api/v2/patients/{id}"));
        assert!(doc.paths.paths.contains_key("/api/v2/patient-assignments/transfer"));
        assert!(
            doc.paths
                .paths
                .get("/api/v2/invoices/{id}")
                .is_some_and(|item| item.operations.contains_key(&utoipa::openapi::PathItemType::Put))
        );
    }
}
