use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::invoice_repository::{InvoiceQuery, InvoiceSummary, NewInvoiceItem};
use crate::application::use_cases::invoices::billing::{
    AddPayment, CancelInvoice, CreateInvoice, GetInvoice, InvoiceChanges, InvoiceDetail,
    InvoiceDraft, InvoiceSummaryReport, ListInvoices, PaymentRequest, SendInvoice, UpdateInvoice,
};
use crate::bootstrap::app_context::AppContext;
use crate::domain::billing::{Invoice, InvoiceItem, InvoiceStatus, Payment, PaymentMethod};
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub subtotal: f64,
    pub tax_amount: f64,
    pub discount_amount: f64,
    pub total_amount: f64,
    pub amount_paid: f64,
    pub balance_due: f64,
    pub issue_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub paid_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<InvoiceItemResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payments: Option<Vec<PaymentResponse>>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(i: Invoice) -> Self {
        Self {
            id: i.id,
            tenant_id: i.tenant_id,
            patient_id: i.patient_id,
            invoice_number: i.invoice_number,
            status: i.status,
            subtotal: i.subtotal,
            tax_amount: i.tax_amount,
            discount_amount: i.discount_amount,
            total_amount: i.total_amount,
            amount_paid: i.amount_paid,
            balance_due: i.balance_due,
            issue_date: i.issue_date,
            due_date: i.due_date,
            paid_date: i.paid_date,
            notes: i.notes,
            terms: i.terms,
            created_at: i.created_at,
            updated_at: i.updated_at,
            items: None,
            payments: None,
        }
    }
}

impl From<InvoiceDetail> for InvoiceResponse {
    fn from(d: InvoiceDetail) -> Self {
        let mut body = InvoiceResponse::from(d.invoice);
        body.items = Some(d.items.into_iter().map(Into::into).collect());
        body.payments = Some(d.payments.into_iter().map(Into::into).collect());
        body
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceItemResponse {
    pub id: Uuid,
    pub treatment_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub total_price: f64,
}

impl From<InvoiceItem> for InvoiceItemResponse {
    fn from(i: InvoiceItem) -> Self {
        Self {
            total_price: i.gross(),
            id: i.id,
            treatment_item_id: i.treatment_item_id,
            description: i.description,
            quantity: i.quantity,
            unit_price: i.unit_price,
            tax_rate: i.tax_rate,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub is_confirmed: bool,
    pub payment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            invoice_id: p.invoice_id,
            amount: p.amount,
            payment_method: p.payment_method,
            reference_number: p.reference_number,
            notes: p.notes,
            is_confirmed: p.is_confirmed,
            payment_date: p.payment_date,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvoiceItemRequest {
    pub treatment_item_id: Option<Uuid>,
    pub description: String,
    #[serde(default = "one")]
    pub quantity: i32,
    pub unit_price: f64,
    #[serde(default)]
    pub tax_rate: f64,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub patient_id: Uuid,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub discount_amount: f64,
    pub items: Vec<InvoiceItemRequest>,
}

/// Editable while the invoice is a draft; omitted fields are unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateInvoiceRequest {
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub discount_amount: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddPaymentRequest {
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListInvoicesQuery {
    pub patient_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceSummaryResponse {
    pub total_invoices: i64,
    pub total_revenue: f64,
    pub pending_amount: f64,
    pub overdue_amount: f64,
    pub average_invoice_amount: f64,
}

impl From<InvoiceSummary> for InvoiceSummaryResponse {
    fn from(s: InvoiceSummary) -> Self {
        Self {
            total_invoices: s.total_invoices,
            total_revenue: s.total_revenue,
            pending_amount: s.pending_amount,
            overdue_amount: s.overdue_amount,
            average_invoice_amount: s.average_invoice_amount,
        }
    }
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/summary", get(invoice_summary))
        .route("/invoices/:id", get(get_invoice).put(update_invoice))
        .route("/invoices/:id/payments", post(add_payment))
        .route("/invoices/:id/send", post(send_invoice))
        .route("/invoices/:id/cancel", post(cancel_invoice))
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/invoices", tag = "Invoices", params(ListInvoicesQuery),
    responses((status = 200, body = [InvoiceResponse])))]
pub async fn list_invoices(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<ListInvoicesQuery>,
) -> ApiResult<Json<Vec<InvoiceResponse>>> {
    let repo = ctx.invoice_repo();
    let uc = ListInvoices {
        invoices: repo.as_ref(),
    };
    let query = InvoiceQuery {
        patient_id: q.patient_id,
        status: q.status,
        page: Page::new(q.skip, q.limit),
    };
    let rows = uc.execute(&current.principal, &query).await?;
    Ok(Json(rows.into_iter().map(InvoiceResponse::from).collect()))
}

#[utoipa::path(post, path = "/api/v2/invoices", tag = "Invoices", request_body = CreateInvoiceRequest,
    responses((status = 201, body = InvoiceResponse), (status = 400)))]
pub async fn create_invoice(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<InvoiceResponse>)> {
    let invoices = ctx.invoice_repo();
    let patients = ctx.patient_repo();
    let uc = CreateInvoice {
        invoices: invoices.as_ref(),
        patients: patients.as_ref(),
    };
    let draft = InvoiceDraft {
        patient_id: req.patient_id,
        due_date: req.due_date,
        notes: req.notes,
        terms: req.terms,
        tax_amount: req.tax_amount,
        discount_amount: req.discount_amount,
        items: req
            .items
            .into_iter()
            .map(|i| NewInvoiceItem {
                treatment_item_id: i.treatment_item_id,
                description: i.description,
                quantity: i.quantity,
                unit_price: i.unit_price,
                tax_rate: i.tax_rate,
            })
            .collect(),
    };
    let detail = uc.execute(&current.principal, &draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(detail.into())))
}

#[utoipa::path(get, path = "/api/v2/invoices/summary", tag = "Invoices",
    responses((status = 200, body = InvoiceSummaryResponse)))]
pub async fn invoice_summary(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<Json<InvoiceSummaryResponse>> {
    let repo = ctx.invoice_repo();
    let uc = InvoiceSummaryReport {
        invoices: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, Utc::now()).await?.into()))
}

#[utoipa::path(get, path = "/api/v2/invoices/{id}", tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses((status = 200, body = InvoiceResponse), (status = 404)))]
pub async fn get_invoice(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvoiceResponse>> {
    let repo = ctx.invoice_repo();
    let uc = GetInvoice {
        invoices: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

#[utoipa::path(put, path = "/api/v2/invoices/{id}", tag = "Invoices", request_body = UpdateInvoiceRequest,
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses((status = 200, body = InvoiceResponse), (status = 400), (status = 404)))]
pub async fn update_invoice(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInvoiceRequest>,
) -> ApiResult<Json<InvoiceResponse>> {
    let repo = ctx.invoice_repo();
    let uc = UpdateInvoice {
        invoices: repo.as_ref(),
    };
    let changes = InvoiceChanges {
        due_date: req.due_date,
        notes: req.notes,
        terms: req.terms,
        discount_amount: req.discount_amount,
    };
    Ok(Json(uc.execute(&current.principal, id, &changes).await?.into()))
}

#[utoipa::path(post, path = "/api/v2/invoices/{id}/payments", tag = "Invoices", request_body = AddPaymentRequest,
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses((status = 201, body = PaymentResponse), (status = 400)))]
pub async fn add_payment(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddPaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentResponse>)> {
    let repo = ctx.invoice_repo();
    let uc = AddPayment {
        invoices: repo.as_ref(),
    };
    let payment = uc
        .execute(
            &current.principal,
            id,
            &PaymentRequest {
                amount: req.amount,
                payment_method: req.payment_method,
                reference_number: req.reference_number,
                notes: req.notes,
            },
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

#[utoipa::path(post, path = "/api/v2/invoices/{id}/send", tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses((status = 200, body = InvoiceResponse), (status = 400)))]
pub async fn send_invoice(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvoiceResponse>> {
    let repo = ctx.invoice_repo();
    let uc = SendInvoice {
        invoices: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

#[utoipa::path(post, path = "/api/v2/invoices/{id}/cancel", tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses((status = 200, body = InvoiceResponse), (status = 400)))]
pub async fn cancel_invoice(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvoiceResponse>> {
    let repo = ctx.invoice_repo();
    let uc = CancelInvoice {
        invoices: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}
