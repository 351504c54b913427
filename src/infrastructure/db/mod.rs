use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::UnknownVariant;

pub type PgPool = Pool<Postgres>;


/// Builds a pool that only connects on first use, so the server can start (and report a
/// degraded health) while the database is down.
pub fn lazy_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_lazy(database_url)?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    // Uses compile-time embedded migrations under ./migrations
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Opens a transaction with `app.tenant_id` set for its duration. Row level security policies
/// compare every tenant-owned row against this setting.
pub async fn begin_tenant_tx(
    pool: &PgPool,
    tenant_id: Uuid,
) -> anyhow::Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
        .bind(tenant_id.to_string())
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

pub async fn ping(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Tables carrying a `tenant_id` column and a `tenant_isolation_<table>` policy.
pub const TENANT_TABLES: &[&str] = &[
    "users",
    "refresh_tokens",
    "login_attempts",
    "password_reset_tokens",
    "patients",
    "appointments",
    "services",
    "consultations",
    "treatments",
    "treatment_items",
    "invoices",
    "invoice_items",
    "payments",
    "prescriptions",
    "medical_records",
    "audit_logs",
];

pub async fn applied_migrations(pool: &PgPool) -> anyhow::Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await?;
    Ok(row.get("n"))
}

/// Tenant tables where row level security is missing or not forced.
pub async fn tables_without_rls(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    let names: Vec<String> = TENANT_TABLES.iter().map(|t| t.to_string()).collect();
    let rows = sqlx::query(
        r#"SELECT relname::text AS relname FROM pg_class
           WHERE relkind = 'r' AND relname::text = ANY($1)
             AND relrowsecurity AND relforcerowsecurity"#,
    )
    .bind(&names)
    .fetch_all(pool)
    .await?;
    let secured: Vec<String> = rows.iter().map(|r| r.get("relname")).collect();
    Ok(names.into_iter().filter(|n| !secured.contains(n)).collect())
}

/// Reads a TEXT column holding one of the domain's `text_enum!` spellings.
pub(crate) fn text_col<T>(row: &PgRow, column: &str) -> anyhow::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    Ok(raw.parse::<T>()?)
}

/// Escapes `%`, `_` and `\` so user input is matched literally inside an ILIKE pattern.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

pub mod repositories;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("smith"), "%smith%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
