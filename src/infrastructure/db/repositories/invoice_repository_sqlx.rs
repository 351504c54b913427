use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::invoice_repository::{
    InvoiceEdit, InvoiceQuery, InvoiceRepository, InvoiceSummary, NewInvoice, NewPayment,
    PaymentRecord,
};
use crate::domain::billing::{
    Invoice, InvoiceItem, InvoiceStatus, Payment, format_invoice_number,
};
use crate::infrastructure::db::{PgPool, begin_tenant_tx, text_col};

const INVOICE_COLUMNS: &str = r#"id, tenant_id, patient_id, invoice_number, status,
    subtotal::float8 AS subtotal, tax_amount::float8 AS tax_amount,
    discount_amount::float8 AS discount_amount, total_amount::float8 AS total_amount,
    amount_paid::float8 AS amount_paid, balance_due::float8 AS balance_due, issue_date, due_date,
    paid_date, notes, terms, created_at, updated_at"#;

const ITEM_COLUMNS: &str = r#"id, tenant_id, invoice_id, treatment_item_id, description,
    quantity, unit_price::float8 AS unit_price, tax_rate::float8 AS tax_rate"#;

const PAYMENT_COLUMNS: &str = r#"id, tenant_id, invoice_id, amount::float8 AS amount,
    payment_method, reference_number, notes, is_confirmed, payment_date, created_at"#;

pub struct SqlxInvoiceRepository {
    pub pool: PgPool,
}

impl SqlxInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_invoice(r: &PgRow) -> anyhow::Result<Invoice> {
    Ok(Invoice {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        patient_id: r.get("patient_id"),
        invoice_number: r.get("invoice_number"),
        status: text_col(r, "status")?,
        subtotal: r.get("subtotal"),
        tax_amount: r.get("tax_amount"),
        discount_amount: r.get("discount_amount"),
        total_amount: r.get("total_amount"),
        amount_paid: r.get("amount_paid"),
        balance_due: r.get("balance_due"),
        issue_date: r.get("issue_date"),
        due_date: r.get("due_date"),
        paid_date: r.get("paid_date"),
        notes: r.get("notes"),
        terms: r.get("terms"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn map_item(r: &PgRow) -> InvoiceItem {
    InvoiceItem {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        invoice_id: r.get("invoice_id"),
        treatment_item_id: r.get("treatment_item_id"),
        description: r.get("description"),
        quantity: r.get("quantity"),
        unit_price: r.get("unit_price"),
        tax_rate: r.get("tax_rate"),
    }
}

fn map_payment(r: &PgRow) -> anyhow::Result<Payment> {
    Ok(Payment {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        invoice_id: r.get("invoice_id"),
        amount: r.get("amount"),
        payment_method: text_col(r, "payment_method")?,
        reference_number: r.get("reference_number"),
        notes: r.get("notes"),
        is_confirmed: r.get("is_confirmed"),
        payment_date: r.get("payment_date"),
        created_at: r.get("created_at"),
    })
}

#[async_trait]
impl InvoiceRepository for SqlxInvoiceRepository {
    async fn create(
        &self,
        tenant_id: Uuid,
        invoice: &NewInvoice,
    ) -> anyhow::Result<(Invoice, Vec<InvoiceItem>)> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let day_key = format!("{tenant_id}:{}", invoice.issue_day);
        // Serialises numbering per tenant and day until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&day_key)
            .execute(&mut *tx)
            .await?;
        let issue_date = invoice
            .issue_day
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or_else(Utc::now);
        let seq_row = sqlx::query(
            r#"SELECT COUNT(*) AS n FROM invoices
               WHERE tenant_id = $1 AND (issue_date AT TIME ZONE 'UTC')::date = $2"#,
        )
        .bind(tenant_id)
        .bind(invoice.issue_day)
        .fetch_one(&mut *tx)
        .await?;
        let sequence: i64 = seq_row.get::<i64, _>("n") + 1;
        let number = format_invoice_number(invoice.issue_day, sequence);

        let sql = format!(
            r#"INSERT INTO invoices (tenant_id, patient_id, invoice_number, status, subtotal,
                   tax_amount, discount_amount, total_amount, amount_paid, balance_due,
                   issue_date, due_date, notes, terms)
               VALUES ($1, $2, $3, 'draft', $4::numeric, $5::numeric, $6::numeric,
                       $7::numeric, 0, $8::numeric, $9, $10, $11, $12)
               RETURNING {INVOICE_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(invoice.patient_id)
            .bind(&number)
            .bind(invoice.totals.subtotal)
            .bind(invoice.totals.tax_amount)
            .bind(invoice.totals.discount_amount)
            .bind(invoice.totals.total_amount)
            .bind(invoice.totals.balance_due)
            .bind(issue_date)
            .bind(invoice.due_date)
            .bind(&invoice.notes)
            .bind(&invoice.terms)
            .fetch_one(&mut *tx)
            .await?;
        let created = map_invoice(&row)?;

        let item_sql = format!(
            r#"INSERT INTO invoice_items (tenant_id, invoice_id, treatment_item_id, description,
                   quantity, unit_price, tax_rate)
               VALUES ($1, $2, $3, $4, $5, $6::numeric, $7::numeric)
               RETURNING {ITEM_COLUMNS}"#
        );
        let mut items = Vec::with_capacity(invoice.items.len());
        for item in &invoice.items {
            let row = sqlx::query(&item_sql)
                .bind(tenant_id)
                .bind(created.id)
                .bind(item.treatment_item_id)
                .bind(&item.description)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(item.tax_rate)
                .fetch_one(&mut *tx)
                .await?;
            items.push(map_item(&row));
        }
        tx.commit().await?;
        Ok((created, items))
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Invoice>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql =
            format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_invoice).transpose()
    }

    async fn items(&self, tenant_id: Uuid, invoice_id: Uuid) -> anyhow::Result<Vec<InvoiceItem>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {ITEM_COLUMNS} FROM invoice_items
               WHERE tenant_id = $1 AND invoice_id = $2 ORDER BY created_at"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(invoice_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows.iter().map(map_item).collect())
    }

    async fn payments(&self, tenant_id: Uuid, invoice_id: Uuid) -> anyhow::Result<Vec<Payment>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {PAYMENT_COLUMNS} FROM payments
               WHERE tenant_id = $1 AND invoice_id = $2 ORDER BY payment_date"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(invoice_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_payment).collect()
    }

    async fn list(&self, tenant_id: Uuid, q: &InvoiceQuery) -> anyhow::Result<Vec<Invoice>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"SELECT {INVOICE_COLUMNS} FROM invoices
               WHERE tenant_id = $1
                 AND ($2::uuid IS NULL OR patient_id = $2)
                 AND ($3::text IS NULL OR status = $3)
               ORDER BY issue_date DESC, invoice_number DESC
               OFFSET $4 LIMIT $5"#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(q.patient_id)
            .bind(q.status.map(|s| s.as_str()))
            .bind(q.page.skip)
            .bind(q.page.limit)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(map_invoice).collect()
    }

    async fn record_payment(
        &self,
        tenant_id: Uuid,
        payment: &NewPayment,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PaymentRecord> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        );
        let Some(row) = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(payment.invoice_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(PaymentRecord::NotFound);
        };
        let invoice = map_invoice(&row)?;
        let outcome = match invoice.apply_payment(payment.amount, now) {
            Ok(outcome) => outcome,
            Err(reason) => return Ok(PaymentRecord::Rejected(reason)),
        };
        sqlx::query(
            r#"UPDATE invoices SET
                   amount_paid = $3::numeric, balance_due = $4::numeric, status = $5,
                   paid_date = $6, updated_at = now()
               WHERE tenant_id = $1 AND id = $2"#,
        )
        .bind(tenant_id)
        .bind(payment.invoice_id)
        .bind(outcome.amount_paid)
        .bind(outcome.balance_due)
        .bind(outcome.status.as_str())
        .bind(outcome.paid_date)
        .execute(&mut *tx)
        .await?;
        let sql = format!(
            r#"INSERT INTO payments (tenant_id, invoice_id, amount, payment_method,
                   reference_number, notes, is_confirmed, payment_date)
               VALUES ($1, $2, $3::numeric, $4, $5, $6, true, now())
               RETURNING {PAYMENT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(payment.invoice_id)
            .bind(payment.amount)
            .bind(payment.payment_method.as_str())
            .bind(&payment.reference_number)
            .bind(&payment.notes)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(PaymentRecord::Recorded {
            payment: map_payment(&row)?,
            outcome,
        })
    }

    async fn update_draft(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        edit: &InvoiceEdit,
    ) -> anyhow::Result<Option<Invoice>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE invoices SET
                   due_date = $3, notes = $4, terms = $5,
                   discount_amount = $6::numeric, total_amount = $7::numeric,
                   balance_due = $8::numeric, updated_at = now()
               WHERE tenant_id = $1 AND id = $2 AND status = 'draft'
               RETURNING {INVOICE_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(edit.due_date)
            .bind(&edit.notes)
            .bind(&edit.terms)
            .bind(edit.totals.discount_amount)
            .bind(edit.totals.total_amount)
            .bind(edit.totals.balance_due)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_invoice).transpose()
    }

    async fn set_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
    ) -> anyhow::Result<Option<Invoice>> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let sql = format!(
            r#"UPDATE invoices SET status = $3, updated_at = now()
               WHERE tenant_id = $1 AND id = $2
               RETURNING {INVOICE_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(map_invoice).transpose()
    }

    async fn summary(&self, tenant_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<InvoiceSummary> {
        let mut tx = begin_tenant_tx(&self.pool, tenant_id).await?;
        let row = sqlx::query(
            r#"SELECT
                   COUNT(*) AS total_invoices,
                   COALESCE(SUM(total_amount) FILTER (WHERE status = 'paid'), 0)::float8
                       AS total_revenue,
                   COALESCE(SUM(balance_due) FILTER (
                       WHERE status IN ('draft', 'sent', 'partial')), 0)::float8
                       AS pending_amount,
                   COALESCE(SUM(balance_due) FILTER (
                       WHERE status IN ('sent', 'partial') AND due_date < $2), 0)::float8
                       AS overdue_amount,
                   COALESCE(ROUND(AVG(total_amount) FILTER (WHERE status = 'paid'), 2), 0)::float8
                       AS average_invoice_amount
               FROM invoices WHERE tenant_id = $1"#,
        )
        .bind(tenant_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(InvoiceSummary {
            total_invoices: row.get("total_invoices"),
            total_revenue: row.get("total_revenue"),
            pending_amount: row.get("pending_amount"),
            overdue_amount: row.get("overdue_amount"),
            average_invoice_amount: row.get("average_invoice_amount"),
        })
    }
}
