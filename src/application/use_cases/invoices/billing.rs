use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::access::{BILLING_STAFF, Principal, require_roles};
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::ports::invoice_repository::{
    InvoiceEdit, InvoiceQuery, InvoiceRepository, InvoiceSummary, NewInvoice, NewInvoiceItem,
    NewPayment, PaymentRecord,
};
use crate::application::ports::patient_repository::PatientRepository;
use crate::application::services::validation::required;
use crate::domain::billing::{
    Invoice, InvoiceItem, InvoiceStatus, InvoiceTotals, Payment, PaymentMethod,
};

async fn load_invoice<R: InvoiceRepository + ?Sized>(
    repo: &R,
    tenant_id: Uuid,
    id: Uuid,
) -> ServiceResult<Invoice> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Invoice"))
}

#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub patient_id: Uuid,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub tax_amount: f64,
    pub discount_amount: f64,
    pub items: Vec<NewInvoiceItem>,
}

/// An invoice together with its lines and the payments recorded against it.
#[derive(Debug, Clone)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
}

pub struct CreateInvoice<'a, I, P>
where
    I: InvoiceRepository + ?Sized,
    P: PatientRepository + ?Sized,
{
    pub invoices: &'a I,
    pub patients: &'a P,
}

impl<'a, I, P> CreateInvoice<'a, I, P>
where
    I: InvoiceRepository + ?Sized,
    P: PatientRepository + ?Sized,
{
    pub async fn execute(
        &self,
        principal: &Principal,
        draft: &InvoiceDraft,
        now: DateTime<Utc>,
    ) -> ServiceResult<InvoiceDetail> {
        require_roles(principal, BILLING_STAFF)?;
        let tenant_id = principal.tenant_id;
        if draft.items.is_empty() {
            return Err(ServiceError::validation("Invoice must have at least one item"));
        }
        for item in &draft.items {
            required("Item description", &item.description)?;
            if item.quantity < 1 {
                return Err(ServiceError::validation("Quantity must be at least 1"));
            }
            if item.unit_price < 0.0 || !(0.0..=100.0).contains(&item.tax_rate) {
                return Err(ServiceError::validation("Invalid item price or tax rate"));
            }
        }
        if draft.tax_amount < 0.0 || draft.discount_amount < 0.0 {
            return Err(ServiceError::validation("Tax and discount cannot be negative"));
        }
        self.patients
            .find_by_id(tenant_id, draft.patient_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Patient"))?;

        let totals = InvoiceTotals::compute(
            draft
                .items
                .iter()
                .map(|i| (i.quantity, i.unit_price, i.tax_rate)),
            draft.tax_amount,
            draft.discount_amount,
            0.0,
        )
        .map_err(ServiceError::Validation)?;
        let (invoice, items) = self
            .invoices
            .create(
                tenant_id,
                &NewInvoice {
                    patient_id: draft.patient_id,
                    issue_day: now.date_naive(),
                    due_date: draft.due_date,
                    notes: draft.notes.clone(),
                    terms: draft.terms.clone(),
                    totals,
                    items: draft.items.clone(),
                },
            )
            .await?;
        tracing::info!(
            tenant_id = %tenant_id,
            invoice_number = %invoice.invoice_number,
            total = invoice.total_amount,
            "invoice_created"
        );
        Ok(InvoiceDetail {
            invoice,
            items,
            payments: Vec::new(),
        })
    }
}

pub struct GetInvoice<'a, I: InvoiceRepository + ?Sized> {
    pub invoices: &'a I,
}

impl<'a, I: InvoiceRepository + ?Sized> GetInvoice<'a, I> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<InvoiceDetail> {
        require_roles(principal, BILLING_STAFF)?;
        let invoice = load_invoice(self.invoices, principal.tenant_id, id).await?;
        let items = self.invoices.items(principal.tenant_id, id).await?;
        let payments = self.invoices.payments(principal.tenant_id, id).await?;
        Ok(InvoiceDetail {
            invoice,
            items,
            payments,
        })
    }
}

pub struct ListInvoices<'a, I: InvoiceRepository + ?Sized> {
    pub invoices: &'a I,
}

impl<'a, I: InvoiceRepository + ?Sized> ListInvoices<'a, I> {
    pub async fn execute(
        &self,
        principal: &Principal,
        query: &InvoiceQuery,
    ) -> ServiceResult<Vec<Invoice>> {
        require_roles(principal, BILLING_STAFF)?;
        Ok(self.invoices.list(principal.tenant_id, query).await?)
    }
}

const DRAFT_ONLY: &str = "Only draft invoices can be edited";

/// Fields left `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub discount_amount: Option<f64>,
}

pub struct UpdateInvoice<'a, I: InvoiceRepository + ?Sized> {
    pub invoices: &'a I,
}

impl<'a, I: InvoiceRepository + ?Sized> UpdateInvoice<'a, I> {
    pub async fn execute(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: &InvoiceChanges,
    ) -> ServiceResult<Invoice> {
        require_roles(principal, BILLING_STAFF)?;
        let invoice = load_invoice(self.invoices, principal.tenant_id, id).await?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(ServiceError::validation(DRAFT_ONLY));
        }
        let totals = invoice
            .rediscount(changes.discount_amount.unwrap_or(invoice.discount_amount))
            .map_err(ServiceError::Validation)?;
        let edit = InvoiceEdit {
            due_date: changes.due_date.or(invoice.due_date),
            notes: changes.notes.clone().or(invoice.notes),
            terms: changes.terms.clone().or(invoice.terms),
            totals,
        };
        // Sent between the read and the write.
        let updated = self
            .invoices
            .update_draft(principal.tenant_id, id, &edit)
            .await?
            .ok_or_else(|| ServiceError::validation(DRAFT_ONLY))?;
        tracing::info!(
            tenant_id = %principal.tenant_id,
            invoice_id = %id,
            total = updated.total_amount,
            "invoice_updated"
        );
        Ok(updated)
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

pub struct AddPayment<'a, I: InvoiceRepository + ?Sized> {
    pub invoices: &'a I,
}

impl<'a, I: InvoiceRepository + ?Sized> AddPayment<'a, I> {
    pub async fn execute(
        &self,
        principal: &Principal,
        invoice_id: Uuid,
        req: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<Payment> {
        require_roles(principal, BILLING_STAFF)?;
        let recorded = self
            .invoices
            .record_payment(
                principal.tenant_id,
                &NewPayment {
                    invoice_id,
                    amount: req.amount,
                    payment_method: req.payment_method,
                    reference_number: req.reference_number.clone(),
                    notes: req.notes.clone(),
                },
                now,
            )
            .await?;
        let (payment, outcome) = match recorded {
            PaymentRecord::Recorded { payment, outcome } => (payment, outcome),
            PaymentRecord::Rejected(reason) => return Err(ServiceError::Validation(reason)),
            PaymentRecord::NotFound => return Err(ServiceError::not_found("Invoice")),
        };
        tracing::info!(
            tenant_id = %principal.tenant_id,
            invoice_id = %invoice_id,
            amount = req.amount,
            status = %outcome.status,
            "payment_recorded"
        );
        Ok(payment)
    }
}

pub struct SendInvoice<'a, I: InvoiceRepository + ?Sized> {
    pub invoices: &'a I,
}

impl<'a, I: InvoiceRepository + ?Sized> SendInvoice<'a, I> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<Invoice> {
        require_roles(principal, BILLING_STAFF)?;
        let invoice = load_invoice(self.invoices, principal.tenant_id, id).await?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(ServiceError::validation("Only draft invoices can be sent"));
        }
        self.invoices
            .set_status(principal.tenant_id, id, InvoiceStatus::Sent)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice"))
    }
}

pub struct CancelInvoice<'a, I: InvoiceRepository + ?Sized> {
    pub invoices: &'a I,
}

impl<'a, I: InvoiceRepository + ?Sized> CancelInvoice<'a, I> {
    pub async fn execute(&self, principal: &Principal, id: Uuid) -> ServiceResult<Invoice> {
        require_roles(principal, BILLING_STAFF)?;
        let invoice = load_invoice(self.invoices, principal.tenant_id, id).await?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(ServiceError::validation("Cannot cancel paid invoice"));
        }
        self.invoices
            .set_status(principal.tenant_id, id, InvoiceStatus::Cancelled)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice"))
    }
}

pub struct InvoiceSummaryReport<'a, I: InvoiceRepository + ?Sized> {
    pub invoices: &'a I,
}

impl<'a, I: InvoiceRepository + ?Sized> InvoiceSummaryReport<'a, I> {
    pub async fn execute(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> ServiceResult<InvoiceSummary> {
        require_roles(principal, BILLING_STAFF)?;
        Ok(self.invoices.summary(principal.tenant_id, now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::domain::users::StaffRole;

    fn draft(patient_id: Uuid) -> InvoiceDraft {
        InvoiceDraft {
            patient_id,
            due_date: None,
            notes: None,
            terms: Some("Net 30".into()),
            tax_amount: 0.0,
            discount_amount: 20.0,
            items: vec![
                NewInvoiceItem {
                    treatment_item_id: None,
                    description: "Composite filling".into(),
                    quantity: 2,
                    unit_price: 50.0,
                    tax_rate: 10.0,
                },
                NewInvoiceItem {
                    treatment_item_id: None,
                    description: "Exam".into(),
                    quantity: 1,
                    unit_price: 80.0,
                    tax_rate: 0.0,
                },
            ],
        }
    }

    fn setup(store: &MemoryStore) -> (Principal, Uuid) {
        let tenant = store.seed_tenant();
        let desk = store.seed_user(tenant.id, "desk@clinic.test", StaffRole::Receptionist);
        let patient = store.seed_patient(tenant.id, "Lena", "Okafor", desk.id);
        (store.principal_for(&desk), patient.id)
    }

    #[tokio::test]
    async fn numbering_counts_the_days_invoices() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let uc = CreateInvoice {
            invoices: &store,
            patients: &store,
        };
        let now = Utc::now();
        let first = uc.execute(&principal, &draft(patient_id), now).await.unwrap();
        let second = uc.execute(&principal, &draft(patient_id), now).await.unwrap();
        let day = now.format("%Y%m%d");
        assert_eq!(first.invoice.invoice_number, format!("INV-{day}-0001"));
        assert_eq!(second.invoice.invoice_number, format!("INV-{day}-0002"));
        assert_eq!(first.invoice.subtotal, 190.0);
        assert_eq!(first.invoice.total_amount, 170.0);
        assert_eq!(first.invoice.status, InvoiceStatus::Draft);
        assert_eq!(first.items.len(), 2);
    }

    #[tokio::test]
    async fn payments_move_invoice_to_partial_then_paid() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let now = Utc::now();
        let created = CreateInvoice {
            invoices: &store,
            patients: &store,
        }
        .execute(&principal, &draft(patient_id), now)
        .await
        .unwrap();
        let id = created.invoice.id;
        let pay = AddPayment { invoices: &store };
        let req = |amount| PaymentRequest {
            amount,
            payment_method: PaymentMethod::Card,
            reference_number: None,
            notes: None,
        };
        pay.execute(&principal, id, &req(70.0), now).await.unwrap();
        let detail = GetInvoice { invoices: &store }
            .execute(&principal, id)
            .await
            .unwrap();
        assert_eq!(detail.invoice.status, InvoiceStatus::Partial);
        assert_eq!(detail.invoice.balance_due, 100.0);

        let err = pay.execute(&principal, id, &req(100.5), now).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        pay.execute(&principal, id, &req(100.0), now).await.unwrap();
        let detail = GetInvoice { invoices: &store }
            .execute(&principal, id)
            .await
            .unwrap();
        assert_eq!(detail.invoice.status, InvoiceStatus::Paid);
        assert_eq!(detail.invoice.paid_date, Some(now));
        assert_eq!(detail.payments.len(), 2);

        let err = CancelInvoice { invoices: &store }
            .execute(&principal, id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn concurrent_payments_never_exceed_the_balance() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let now = Utc::now();
        let created = CreateInvoice {
            invoices: &store,
            patients: &store,
        }
        .execute(&principal, &draft(patient_id), now)
        .await
        .unwrap();
        let id = created.invoice.id;
        let pay = AddPayment { invoices: &store };
        let req = PaymentRequest {
            amount: 60.0,
            payment_method: PaymentMethod::Cash,
            reference_number: None,
            notes: None,
        };
        let (a, b, c) = tokio::join!(
            pay.execute(&principal, id, &req, now),
            pay.execute(&principal, id, &req, now),
            pay.execute(&principal, id, &req, now),
        );
        let results = [a, b, c];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, ServiceError::Validation(_)))
        );

        let detail = GetInvoice { invoices: &store }
            .execute(&principal, id)
            .await
            .unwrap();
        let recorded: f64 = detail.payments.iter().map(|p| p.amount).sum();
        assert_eq!(recorded, detail.invoice.amount_paid);
        assert_eq!(detail.invoice.amount_paid, 120.0);
        assert_eq!(detail.invoice.balance_due, 50.0);
    }

    #[tokio::test]
    async fn payment_is_checked_against_the_stored_balance() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let now = Utc::now();
        let created = CreateInvoice {
            invoices: &store,
            patients: &store,
        }
        .execute(&principal, &draft(patient_id), now)
        .await
        .unwrap();
        let full = NewPayment {
            invoice_id: created.invoice.id,
            amount: 170.0,
            payment_method: PaymentMethod::Card,
            reference_number: None,
            notes: None,
        };
        let first = store
            .record_payment(principal.tenant_id, &full, now)
            .await
            .unwrap();
        assert!(matches!(first, PaymentRecord::Recorded { .. }));
        // Same request built from the pre-payment read of the invoice.
        let second = store
            .record_payment(principal.tenant_id, &full, now)
            .await
            .unwrap();
        assert!(matches!(second, PaymentRecord::Rejected(_)));

        let err = AddPayment { invoices: &store }
            .execute(
                &principal,
                Uuid::new_v4(),
                &PaymentRequest {
                    amount: 10.0,
                    payment_method: PaymentMethod::Card,
                    reference_number: None,
                    notes: None,
                },
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn drafts_can_be_edited_until_sent() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let created = CreateInvoice {
            invoices: &store,
            patients: &store,
        }
        .execute(&principal, &draft(patient_id), Utc::now())
        .await
        .unwrap();
        let id = created.invoice.id;
        let update = UpdateInvoice { invoices: &store };

        let edited = update
            .execute(
                &principal,
                id,
                &InvoiceChanges {
                    notes: Some("Insurance claim pending".into()),
                    discount_amount: Some(40.0),
                    ..InvoiceChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.subtotal, 190.0);
        assert_eq!(edited.total_amount, 150.0);
        assert_eq!(edited.balance_due, 150.0);
        assert_eq!(edited.notes.as_deref(), Some("Insurance claim pending"));
        assert_eq!(edited.terms.as_deref(), Some("Net 30"));

        let err = update
            .execute(
                &principal,
                id,
                &InvoiceChanges {
                    discount_amount: Some(500.0),
                    ..InvoiceChanges::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        SendInvoice { invoices: &store }
            .execute(&principal, id)
            .await
            .unwrap();
        let err = update
            .execute(&principal, id, &InvoiceChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(m) if m == DRAFT_ONLY));
    }

    #[tokio::test]
    async fn only_drafts_can_be_sent() {
        let store = MemoryStore::default();
        let (principal, patient_id) = setup(&store);
        let created = CreateInvoice {
            invoices: &store,
            patients: &store,
        }
        .execute(&principal, &draft(patient_id), Utc::now())
        .await
        .unwrap();
        let send = SendInvoice { invoices: &store };
        let sent = send.execute(&principal, created.invoice.id).await.unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);
        assert!(send.execute(&principal, created.invoice.id).await.is_err());
    }

    #[tokio::test]
    async fn hygienists_have_no_billing_access() {
        let store = MemoryStore::default();
        let tenant = store.seed_tenant();
        let hygienist = store.seed_user(tenant.id, "h@clinic.test", StaffRole::Hygienist);
        let err = ListInvoices { invoices: &store }
            .execute(&store.principal_for(&hygienist), &InvoiceQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
