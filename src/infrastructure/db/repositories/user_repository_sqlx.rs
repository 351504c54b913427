use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::user_repository::{NewUser, UserPatch, UserQuery, UserRepository};
use crate::domain::users::User;
use crate::infrastructure::db::{PgPool, begin_tenant_tx, text_col};

pub(crate) const USER_COLUMNS: &str = r#"id, tenant_id, first_name, last_name, email,
    password_hash, contact_number, role, gender, date_of_birth, specialization, license_number,
    employee_id, work_schedule, is_available, is_active, is_verified, settings, created_at,
    updated_at, last_login_at"#;

pub struct SqlxUserRepository {
    pub pool: PgPool,
}

impl SqlxUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_user(r: &PgRow) -> anyhow::Result<User> {
    Ok(User {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        email: r.get("email"),
        password_hash: r.get("password_hash"),
        contact_number: r.get("contact_number"),
        role: text_col(r, "role")?,
        gender: text_col(r, "gender")?,
        date_of_birth: r.get("date_of_birth"),
        specialization: r.get("specialization"),
        license_number: r.get("license_number"),
        employee_id: r.get("employee_id"),
        work_schedule: r.get("work_schedule"),
        is_available: r.get("is_available"),
        is_active: r.get("is_active"),
        is_verified: r.get("is_verified"),
        settings: r.get("settings"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        last_login_at: r.get("last_login_at"),
    })
}

/// Inserts a user on a connection whose `app.tenant_id` is already set to `tenant_id`.
pub(crate) async fn insert_user(
    conn: &mut sqlx::PgConnection,
    tenant_id: Uuid,
    u: &NewUser,
) -> anyhow::Result<User> {
    let sql = format!(
        r#"INSERT INTO users (tenant_id, first_name, last_name, email, password_hash,
               contact_number, role, gender, date_of_birth, specialization, license_number,
               employee_id, work_schedule)
           VALUES ($1, $2, $3, lower($4), $5, $6, $7, $8, $9, $10, $11, $12, $13)
           RETURNING {USER_COLUMNS}"#
    );
    let row = sqlx::query(&sql)
        .bind(tenant_id)
        .bind(&u.first_name)
        .bind(&u.last_name)
        .bind(&u.email)
        .bind(&u.password_hash)
        .bind(&u.contact_number)
        .bind(u.role.as_str())
        .bind(u.gender.as_str())
        .bind(u.date_of_birth)
        .bind(&u.specialization)
        .bind(&u.license_number)
        .bind(&u.employee_id)
        .bind(&u.work_schedule)
        .fetch_one(&mut *conn)
        .await?;
    map_user(&row)
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, tenant_id: Uuid, user: &NewUser) -> anyhow::Result<User> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let created = insert_user(&mut tx, tenant_id, user).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<User>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_user).transpose()
    }

    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> anyhow::Result<Option<User>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND email = lower($2)"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_user).transpose()
    }

    async fn list(&self, tenant_id: Uuid, query: &UserQuery) -> anyhow::Result<Vec<User>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {USER_COLUMNS} FROM users
               WHERE tenant_id = $1
                 AND ($2::text IS NULL OR role = $2)
                 AND (NOT $3 OR is_active)
               ORDER BY last_name, first_name
               OFFSET $4 LIMIT $5"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(query.role.map(|r| r.as_str()))
            .bind(query.active_only)
            .bind(query.page.skip)
            .bind(query.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_user).collect()
    }

    async fn count_active(&self, tenant_id: Uuid) -> anyhow::Result<i64> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM users WHERE tenant_id = $1 AND is_active",
        )
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.get("n"))
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: &UserPatch,
    ) -> anyhow::Result<Option<User>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE users SET
                   first_name = COALESCE($3, first_name),
                   last_name = COALESCE($4, last_name),
                   contact_number = COALESCE($5, contact_number),
                   gender = COALESCE($6, gender),
                   date_of_birth = COALESCE($7, date_of_birth),
                   specialization = COALESCE($8, specialization),
                   license_number = COALESCE($9, license_number),
                   employee_id = COALESCE($10, employee_id),
                   work_schedule = COALESCE($11, work_schedule),
                   is_available = COALESCE($12, is_available),
                   role = COALESCE($13, role),
                   is_active = COALESCE($14, is_active),
                   updated_at = now()
               WHERE tenant_id = $1 AND id = $2
               RETURNING {USER_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(&patch.first_name)
            .bind(&patch.last_name)
            .bind(&patch.contact_number)
            .bind(patch.gender.map(|g| g.as_str()))
            .bind(patch.date_of_birth)
            .bind(&patch.specialization)
            .bind(&patch.license_number)
            .bind(&patch.employee_id)
            .bind(&patch.work_schedule)
            .bind(patch.is_available)
            .bind(patch.role.map(|r| r.as_str()))
            .bind(patch.is_active)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_user).transpose()
    }

    async fn set_password(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let res = sqlx::query(
            "UPDATE users SET password_hash = $3, updated_at = now() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    async fn touch_last_login(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        sqlx::query("UPDATE users SET last_login_at = $3 WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn available_dentists(&self, tenant_id: Uuid) -> anyhow::Result<Vec<User>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {USER_COLUMNS} FROM users
               WHERE tenant_id = $1 AND role = 'dentist' AND is_active AND is_available
               ORDER BY last_name, first_name"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_user).collect()
    }
}
