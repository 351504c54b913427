use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::bootstrap::app_context::AppContext;
use crate::infrastructure::db;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResp {
    pub status: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
    pub multi_tenant: bool,
    pub rls_enabled: bool,
    pub environment: String,
    pub version: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResult {
    pub ok: bool,
    pub detail: String,
}

impl CheckResult {
    fn new(ok: bool, detail: impl Into<String>) -> Self {
        Self {
            ok,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartupCheckResp {
    pub ready: bool,
    pub database: CheckResult,
    pub migrations: CheckResult,
    pub row_level_security: CheckResult,
    pub redis: CheckResult,
    pub storage: CheckResult,
    pub billing: CheckResult,
}

#[utoipa::path(
    get,
    path = "/api/v2/health",
    tag = "Health",
    security(()),
    responses((status = 200, body = HealthResp))
)]
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResp> {
    let db_ok = db::ping(&ctx.pool()).await;
    Json(HealthResp {
        status: if db_ok { "healthy" } else { "degraded" },
        database: if db_ok { "connected" } else { "disconnected" },
        cache: if ctx.cache().enabled() {
            "enabled"
        } else {
            "disabled"
        },
        multi_tenant: true,
        rls_enabled: true,
        environment: ctx.cfg.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[utoipa::path(
    get,
    path = "/api/v2/startup-check",
    tag = "Health",
    security(()),
    responses(
        (status = 200, body = StartupCheckResp),
        (status = 503, description = "Not ready", body = StartupCheckResp)
    )
)]
pub async fn startup_check(State(ctx): State<AppContext>) -> (StatusCode, Json<StartupCheckResp>) {
    let pool = ctx.pool();
    let db_ok = db::ping(&pool).await;

    let (migrations, row_level_security) = if db_ok {
        let migrations = match db::applied_migrations(&pool).await {
            Ok(n) if n > 0 => CheckResult::new(true, format!("{n} migrations applied")),
            Ok(_) => CheckResult::new(false, "no migrations applied"),
            Err(e) => {
                tracing::warn!(error = ?e, "startup_check_migrations_failed");
                CheckResult::new(false, "migration table unreadable")
            }
        };
        let rls = match db::tables_without_rls(&pool).await {
            Ok(missing) if missing.is_empty() => {
                CheckResult::new(true, "enabled on all tenant tables")
            }
            Ok(missing) => CheckResult::new(false, format!("missing on: {}", missing.join(", "))),
            Err(e) => {
                tracing::warn!(error = ?e, "startup_check_rls_failed");
                CheckResult::new(false, "policy catalog unreadable")
            }
        };
        (migrations, rls)
    } else {
        (
            CheckResult::new(false, "database unreachable"),
            CheckResult::new(false, "database unreachable"),
        )
    };

    let redis = if ctx.cache().ping().await {
        CheckResult::new(true, "reachable")
    } else if ctx.cfg.require_redis {
        CheckResult::new(false, "unreachable")
    } else {
        CheckResult::new(true, "not required")
    };

    let storage = if ctx.medical_files().is_writable().await {
        CheckResult::new(true, ctx.cfg.medical_records_storage_path.clone())
    } else {
        CheckResult::new(false, "storage directory not writable")
    };

    let billing = if ctx.cfg.stripe_secret_key.is_some() {
        CheckResult::new(true, "configured")
    } else {
        CheckResult::new(false, "not configured")
    };

    // Billing is informational; the rest gates readiness.
    let ready = db_ok && migrations.ok && row_level_security.ok && redis.ok && storage.ok;
    if !ready {
        tracing::warn!(db_ok, migrations = migrations.ok, rls = row_level_security.ok, redis = redis.ok, storage = storage.ok, "startup_check_not_ready");
    }
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(StartupCheckResp {
            ready,
            database: CheckResult::new(db_ok, if db_ok { "connected" } else { "unreachable" }),
            migrations,
            row_level_security,
            redis,
            storage,
            billing,
        }),
    )
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/startup-check", get(startup_check))
        .with_state(ctx)
}
