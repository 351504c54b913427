use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::catalog_repository::{
    CatalogRepository, CategorySummary, NewService, ServiceQuery,
};
use crate::domain::catalog::DentalService;
use crate::infrastructure::db::{PgPool, begin_tenant_tx, like_pattern, text_col};

const SERVICE_COLUMNS: &str = r#"id, tenant_id, code, name, description, category,
    base_price::float8 AS base_price, duration_minutes, status, is_taxable,
    tax_rate::float8 AS tax_rate, requirements, materials, created_at, updated_at"#;

pub struct SqlxCatalogRepository {
    pub pool: PgPool,
}

impl SqlxCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_service(r: &PgRow) -> anyhow::Result<DentalService> {
    Ok(DentalService {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        code: r.get("code"),
        name: r.get("name"),
        description: r.get("description"),
        category: text_col(r, "category")?,
        base_price: r.get("base_price"),
        duration_minutes: r.get("duration_minutes"),
        status: text_col(r, "status")?,
        is_taxable: r.get("is_taxable"),
        tax_rate: r.get("tax_rate"),
        requirements: r.get("requirements"),
        materials: r.get("materials"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

#[async_trait]
impl CatalogRepository for SqlxCatalogRepository {
    async fn create(&self, tenant_id: Uuid, s: &NewService) -> anyhow::Result<DentalService> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"INSERT INTO services (tenant_id, code, name, description, category, base_price,
                   duration_minutes, status, is_taxable, tax_rate, requirements, materials)
               VALUES ($1, $2, $3, $4, $5, $6::numeric, $7, 'active', $8, $9::numeric, $10, $11)
               RETURNING {SERVICE_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(&s.code)
            .bind(&s.name)
            .bind(&s.description)
            .bind(s.category.as_str())
            .bind(s.base_price)
            .bind(s.duration_minutes)
            .bind(s.is_taxable)
            .bind(s.tax_rate)
            .bind(&s.requirements)
            .bind(&s.materials)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        map_service(&row)
    }

    async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<DentalService>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql =
            format!("SELECT {SERVICE_COLUMNS} FROM services WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_service).transpose()
    }

    async fn find_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> anyhow::Result<Option<DentalService>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql =
            format!("SELECT {SERVICE_COLUMNS} FROM services WHERE tenant_id = $1 AND code = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(code)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_service).transpose()
    }

    async fn list(&self, tenant_id: Uuid, q: &ServiceQuery) -> anyhow::Result<Vec<DentalService>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {SERVICE_COLUMNS} FROM services
               WHERE tenant_id = $1
                 AND ($2::text IS NULL OR category = $2)
                 AND ($3::text IS NULL OR status = $3)
                 AND ($4::text IS NULL OR name ILIKE $4 OR code ILIKE $4 OR description ILIKE $4)
                 AND ($5::float8 IS NULL OR base_price >= $5::numeric)
                 AND ($6::float8 IS NULL OR base_price <= $6::numeric)
               ORDER BY category, name
               OFFSET $7 LIMIT $8"#
        );
        let pattern = q
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(q.category.map(|c| c.as_str()))
            .bind(q.status.map(|s| s.as_str()))
            .bind(pattern)
            .bind(q.min_price)
            .bind(q.max_price)
            .bind(q.page.skip)
            .bind(q.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_service).collect()
    }

    async fn save(&self, tenant_id: Uuid, s: &DentalService) -> anyhow::Result<DentalService> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE services SET
                   code = $3, name = $4, description = $5, category = $6,
                   base_price = $7::numeric, duration_minutes = $8, status = $9,
                   is_taxable = $10, tax_rate = $11::numeric, requirements = $12,
                   materials = $13, updated_at = $14
               WHERE tenant_id = $1 AND id = $2
               RETURNING {SERVICE_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(s.id)
            .bind(&s.code)
            .bind(&s.name)
            .bind(&s.description)
            .bind(s.category.as_str())
            .bind(s.base_price)
            .bind(s.duration_minutes)
            .bind(s.status.as_str())
            .bind(s.is_taxable)
            .bind(s.tax_rate)
            .bind(&s.requirements)
            .bind(&s.materials)
            .bind(s.updated_at)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        map_service(&row)
    }

    async fn category_summary(&self, tenant_id: Uuid) -> anyhow::Result<Vec<CategorySummary>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let rows = sqlx::query(
            r#"SELECT category,
                      COUNT(*) AS count,
                      ROUND(AVG(base_price), 2)::float8 AS average_price,
                      MIN(base_price)::float8 AS min_price,
                      MAX(base_price)::float8 AS max_price
               FROM services
               WHERE tenant_id = $1 AND status = 'active'
               GROUP BY category
               ORDER BY category"#,
        )
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.iter()
            .map(|r| {
                Ok(CategorySummary {
                    category: text_col(r, "category")?,
                    count: r.get("count"),
                    average_price: r.get("average_price"),
                    min_price: r.get("min_price"),
                    max_price: r.get("max_price"),
                })
            })
            .collect()
    }
}
