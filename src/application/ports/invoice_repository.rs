use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::domain::billing::{
    Invoice, InvoiceItem, InvoiceStatus, InvoiceTotals, Payment, PaymentMethod, PaymentOutcome,
};

#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub treatment_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub tax_rate: f64,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub patient_id: Uuid,
    pub issue_day: NaiveDate,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub totals: InvoiceTotals,
    pub items: Vec<NewInvoiceItem>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub invoice_id: Uuid,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

/// Full replacement values for the editable fields of a draft invoice.
#[derive(Debug, Clone)]
pub struct InvoiceEdit {
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub totals: InvoiceTotals,
}

/// Result of applying a payment against the invoice row as it stands when locked.
#[derive(Debug, Clone)]
pub enum PaymentRecord {
    Recorded { payment: Payment, outcome: PaymentOutcome },
    Rejected(String),
    NotFound,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    pub patient_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub page: Page,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceSummary {
    pub total_invoices: i64,
    pub total_revenue: f64,
    pub pending_amount: f64,
    pub overdue_amount: f64,
    pub average_invoice_amount: f64,
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Persists the invoice with its items, numbering it after the tenant's invoices created on
    /// `issue_day`.
    async fn create(
        &self,
        tenant_id: Uuid,
        invoice: &NewInvoice,
    ) -> anyhow::Result<(Invoice, Vec<InvoiceItem>)>;
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> anyhow::Result<Option<Invoice>>;
    async fn items(&self, tenant_id: Uuid, invoice_id: Uuid) -> anyhow::Result<Vec<InvoiceItem>>;
    async fn payments(&self, tenant_id: Uuid, invoice_id: Uuid) -> anyhow::Result<Vec<Payment>>;
    async fn list(&self, tenant_id: Uuid, query: &InvoiceQuery) -> anyhow::Result<Vec<Invoice>>;
    /// Locks the invoice, re-checks the payment against its current balance, then updates it
    /// and inserts the payment in the same transaction.
    async fn record_payment(
        &self,
        tenant_id: Uuid,
        payment: &NewPayment,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PaymentRecord>;
    /// Applies `edit` while the invoice is still a draft. `None` when it is missing or has
    /// left draft.
    async fn update_draft(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        edit: &InvoiceEdit,
    ) -> anyhow::Result<Option<Invoice>>;
    async fn set_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
    ) -> anyhow::Result<Option<Invoice>>;
    async fn summary(&self, tenant_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<InvoiceSummary>;
}
