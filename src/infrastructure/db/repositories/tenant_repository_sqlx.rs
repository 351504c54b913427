use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::tenant_repository::{
    NewTenant, TenantPatch, TenantRepository, TenantStats, TenantUsage,
};
use crate::application::ports::user_repository::NewUser;
use crate::domain::tenants::{Tenant, TenantStatus};
use crate::domain::users::User;
use crate::infrastructure::db::repositories::user_repository_sqlx::insert_user;
use crate::infrastructure::db::{PgPool, begin_tenant_tx, text_col};

const TENANT_COLUMNS: &str = r#"id, name, slug, contact_email, contact_phone, address, tier,
    payment_status, status, billing_cycle, subscription_id, max_users, max_patients,
    max_storage_gb, max_api_calls_per_month, enabled_features, settings, trial_ends_at,
    subscription_ends_at, grace_period_ends_at, activation_date, created_at, updated_at"#;

pub struct SqlxTenantRepository {
    pub pool: PgPool,
}

impl SqlxTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_tenant(r: &PgRow) -> anyhow::Result<Tenant> {
    Ok(Tenant {
        id: r.get("id"),
        name: r.get("name"),
        slug: r.get("slug"),
        contact_email: r.get("contact_email"),
        contact_phone: r.try_get("contact_phone").ok().flatten(),
        address: r.try_get("address").ok().flatten(),
        tier: text_col(r, "tier")?,
        payment_status: text_col(r, "payment_status")?,
        status: text_col(r, "status")?,
        billing_cycle: text_col(r, "billing_cycle")?,
        subscription_id: r.try_get("subscription_id").ok().flatten(),
        max_users: r.get("max_users"),
        max_patients: r.get("max_patients"),
        max_storage_gb: r.get("max_storage_gb"),
        max_api_calls_per_month: r.get("max_api_calls_per_month"),
        enabled_features: r.get("enabled_features"),
        settings: r.get("settings"),
        trial_ends_at: r.try_get("trial_ends_at").ok().flatten(),
        subscription_ends_at: r.try_get("subscription_ends_at").ok().flatten(),
        grace_period_ends_at: r.try_get("grace_period_ends_at").ok().flatten(),
        activation_date: r.try_get("activation_date").ok().flatten(),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

async fn insert_tenant(
    conn: &mut sqlx::PgConnection,
    t: &NewTenant,
) -> anyhow::Result<Tenant> {
    let sql = format!(
        r#"INSERT INTO tenants (name, slug, contact_email, contact_phone, address, tier,
               payment_status, status, billing_cycle, max_users, max_patients, max_storage_gb,
               max_api_calls_per_month, enabled_features, settings, trial_ends_at, activation_date)
           VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, $9, $10, $11, $12, $13, '{{}}'::jsonb,
                   $14, now())
           RETURNING {TENANT_COLUMNS}"#
    );
    let row = sqlx::query(&sql)
        .bind(&t.name)
        .bind(&t.slug)
        .bind(&t.contact_email)
        .bind(&t.contact_phone)
        .bind(&t.address)
        .bind(t.tier.as_str())
        .bind(t.payment_status.as_str())
        .bind(t.billing_cycle.as_str())
        .bind(t.max_users)
        .bind(t.max_patients)
        .bind(t.max_storage_gb)
        .bind(t.max_api_calls_per_month)
        .bind(&t.enabled_features)
        .bind(t.trial_ends_at)
        .fetch_one(&mut *conn)
        .await?;
    map_tenant(&row)
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[async_trait]
impl TenantRepository for SqlxTenantRepository {
    async fn create(&self, tenant: &NewTenant) -> anyhow::Result<Tenant> {
        let mut conn = self.pool.acquire().await?;
        insert_tenant(&mut conn, tenant).await
    }

    async fn create_with_admin(
        &self,
        tenant: &NewTenant,
        admin: &NewUser,
    ) -> anyhow::Result<(Tenant, User)> {
        let mut tx = self.pool.begin().await?;
        let created = insert_tenant(&mut tx, tenant).await?;
        sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
            .bind(created.id.to_string())
            .execute(&mut *tx)
            .await?;
        let user = insert_user(&mut tx, created.id, admin).await?;
        tx.commit().await?;
        Ok((created, user))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Tenant>> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_tenant).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<Tenant>> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE slug = $1");
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_tenant).transpose()
    }

    async fn name_or_slug_taken(
        &self,
        name: &str,
        slug: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        let row = sqlx::query(
            r#"SELECT EXISTS (
                   SELECT 1 FROM tenants
                   WHERE (lower(name) = lower($1) OR slug = $2)
                     AND ($3::uuid IS NULL OR id <> $3)
               ) AS taken"#,
        )
        .bind(name)
        .bind(slug)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("taken"))
    }

    async fn list(&self, page: Page) -> anyhow::Result<Vec<Tenant>> {
        let sql = format!(
            "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at DESC OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_tenant).collect()
    }

    async fn list_active(&self) -> anyhow::Result<Vec<Tenant>> {
        let sql =
            format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE status = 'active' ORDER BY name");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(map_tenant).collect()
    }

    async fn update(&self, id: Uuid, patch: &TenantPatch) -> anyhow::Result<Option<Tenant>> {
        let sql = format!(
            r#"UPDATE tenants SET
                   name = COALESCE($2, name),
                   contact_email = COALESCE($3, contact_email),
                   contact_phone = COALESCE($4, contact_phone),
                   address = COALESCE($5, address),
                   tier = COALESCE($6, tier),
                   billing_cycle = COALESCE($7, billing_cycle),
                   settings = COALESCE($8, settings),
                   max_users = COALESCE($9, max_users),
                   max_patients = COALESCE($10, max_patients),
                   max_storage_gb = COALESCE($11, max_storage_gb),
                   max_api_calls_per_month = COALESCE($12, max_api_calls_per_month),
                   enabled_features = COALESCE($13, enabled_features),
                   updated_at = now()
               WHERE id = $1
               RETURNING {TENANT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.contact_email)
            .bind(&patch.contact_phone)
            .bind(&patch.address)
            .bind(patch.tier.map(|t| t.as_str()))
            .bind(patch.billing_cycle.map(|b| b.as_str()))
            .bind(&patch.settings)
            .bind(patch.max_users)
            .bind(patch.max_patients)
            .bind(patch.max_storage_gb)
            .bind(patch.max_api_calls_per_month)
            .bind(&patch.enabled_features)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_tenant).transpose()
    }

    async fn set_status(&self, id: Uuid, status: TenantStatus) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE tenants SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn stats(&self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<TenantStats> {
        let mut tx = begin_tenant_tx(&self.pool, id).await?;
        let row = sqlx::query(
            r#"SELECT
                   (SELECT COUNT(*) FROM users WHERE tenant_id = $1) AS users,
                   (SELECT COUNT(*) FROM patients WHERE tenant_id = $1) AS patients,
                   (SELECT COUNT(*) FROM appointments WHERE tenant_id = $1) AS appointments,
                   (SELECT COUNT(*) FROM invoices WHERE tenant_id = $1) AS invoices,
                   (SELECT COALESCE(SUM(total_amount), 0)::float8 FROM invoices
                     WHERE tenant_id = $1 AND status = 'paid' AND paid_date >= $2) AS monthly_revenue,
                   (SELECT COUNT(DISTINCT patient_id) FROM appointments
                     WHERE tenant_id = $1 AND appointment_date >= $3) AS active_patients"#,
        )
        .bind(id)
        .bind(month_start(now))
        .bind(now - Duration::days(30))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(TenantStats {
            users: row.get("users"),
            patients: row.get("patients"),
            appointments: row.get("appointments"),
            invoices: row.get("invoices"),
            monthly_revenue: row.get("monthly_revenue"),
            active_patients: row.get("active_patients"),
        })
    }

    async fn usage(&self, id: Uuid) -> anyhow::Result<TenantUsage> {
        let mut tx = begin_tenant_tx(&self.pool, id).await?;
        let row = sqlx::query(
            r#"SELECT
                   (SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND is_active) AS active_users,
                   (SELECT COUNT(*) FROM patients WHERE tenant_id = $1) AS patients,
                   (SELECT COALESCE(SUM(file_size), 0)::bigint FROM medical_records
                     WHERE tenant_id = $1) AS storage_bytes"#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(TenantUsage {
            active_users: row.get("active_users"),
            patients: row.get("patients"),
            storage_bytes: row.get("storage_bytes"),
        })
    }
}
