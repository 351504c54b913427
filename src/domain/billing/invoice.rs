use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::money::round_cents;

text_enum!(InvoiceStatus {
    Draft => "draft",
    Sent => "sent",
    Partial => "partial",
    Paid => "paid",
    Overdue => "overdue",
    Cancelled => "cancelled",
});

text_enum!(PaymentMethod {
    Cash => "cash",
    Card => "card",
    Insurance => "insurance",
    BankTransfer => "bank_transfer",
    Check => "check",
    Online => "online",
});

impl InvoiceStatus {
    /// Statuses whose balance is still expected to be collected.
    pub const OUTSTANDING: [InvoiceStatus; 3] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Partial,
    ];

    /// Statuses that become overdue once the due date passes.
    pub const COLLECTIBLE: [InvoiceStatus; 2] = [InvoiceStatus::Sent, InvoiceStatus::Partial];
}

#[derive(Debug, Clone)]
pub struct Invoice {
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
}

#[derive(Debug, Clone)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub treatment_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub tax_rate: f64,
}

impl InvoiceItem {
    /// Line amount including the line's tax.
    pub fn gross(&self) -> f64 {
        line_gross(self.quantity, self.unit_price, self.tax_rate)
    }
}

pub fn line_gross(quantity: i32, unit_price: f64, tax_rate: f64) -> f64 {
    f64::from(quantity) * unit_price * (1.0 + tax_rate / 100.0)
}

#[derive(Debug, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub is_confirmed: bool,
    pub payment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub discount_amount: f64,
    pub total_amount: f64,
    pub balance_due: f64,
}

impl InvoiceTotals {
    /// `subtotal` is the sum of gross lines; `total = subtotal + tax − discount`.
    pub fn compute(
        lines: impl IntoIterator<Item = (i32, f64, f64)>,
        tax_amount: f64,
        discount_amount: f64,
        amount_paid: f64,
    ) -> Result<Self, String> {
        let subtotal = round_cents(
            lines
                .into_iter()
                .map(|(q, p, t)| line_gross(q, p, t))
                .sum(),
        );
        let tax_amount = round_cents(tax_amount);
        let discount_amount = round_cents(discount_amount);
        let total_amount = round_cents(subtotal + tax_amount - discount_amount);
        if total_amount < 0.0 {
            return Err("Discount cannot exceed the invoice total".into());
        }
        Ok(Self {
            subtotal,
            tax_amount,
            discount_amount,
            total_amount,
            balance_due: round_cents(total_amount - amount_paid),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentOutcome {
    pub amount_paid: f64,
    pub balance_due: f64,
    pub status: InvoiceStatus,
    pub paid_date: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        InvoiceStatus::COLLECTIBLE.contains(&self.status)
            && self.due_date.is_some_and(|due| due < now)
    }

    /// Totals after replacing the discount; lines and tax stay as issued.
    pub fn rediscount(&self, discount_amount: f64) -> Result<InvoiceTotals, String> {
        if !discount_amount.is_finite() || discount_amount < 0.0 {
            return Err("Tax and discount cannot be negative".into());
        }
        let discount_amount = round_cents(discount_amount);
        let total_amount = round_cents(self.subtotal + self.tax_amount - discount_amount);
        if total_amount < 0.0 {
            return Err("Discount cannot exceed the invoice total".into());
        }
        Ok(InvoiceTotals {
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            discount_amount,
            total_amount,
            balance_due: round_cents(total_amount - self.amount_paid),
        })
    }

    /// Validates a payment against the invoice and returns the resulting balances and status.
    pub fn apply_payment(&self, amount: f64, now: DateTime<Utc>) -> Result<PaymentOutcome, String> {
        if matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            return Err(format!("Cannot add payment to {} invoice", self.status));
        }
        if amount <= 0.0 {
            return Err("Payment amount must be positive".into());
        }
        if round_cents(amount) > round_cents(self.balance_due) {
            return Err("Payment amount exceeds balance due".into());
        }
        let amount_paid = round_cents(self.amount_paid + amount);
        let balance_due = round_cents(self.total_amount - amount_paid);
        let (status, paid_date) = if balance_due <= 0.0 {
            (InvoiceStatus::Paid, Some(now))
        } else if amount_paid > 0.0 {
            (InvoiceStatus::Partial, self.paid_date)
        } else {
            (self.status, self.paid_date)
        };
        Ok(PaymentOutcome {
            amount_paid,
            balance_due,
            status,
            paid_date,
        })
    }
}

/// `INV-YYYYMMDD-NNNN` where `NNNN` is the day's sequence number.
pub fn format_invoice_number(day: NaiveDate, sequence: i64) -> String {
    format!("INV-{}-{:04}", day.format("%Y%m%d"), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invoice(total: f64, paid: f64, status: InvoiceStatus) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            invoice_number: "INV-20240101-0001".into(),
            status,
            subtotal: total,
            tax_amount: 0.0,
            discount_amount: 0.0,
            total_amount: total,
            amount_paid: paid,
            balance_due: total - paid,
            issue_date: now,
            due_date: None,
            paid_date: None,
            notes: None,
            terms: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn totals_include_line_tax() {
        let totals =
            InvoiceTotals::compute([(2, 50.0, 10.0), (1, 80.0, 0.0)], 0.0, 20.0, 0.0).unwrap();
        assert_eq!(totals.subtotal, 190.0);
        assert_eq!(totals.total_amount, 170.0);
        assert_eq!(totals.balance_due, 170.0);
    }

    #[test]
    fn discount_larger_than_total_is_rejected() {
        assert!(InvoiceTotals::compute([(1, 10.0, 0.0)], 0.0, 11.0, 0.0).is_err());
    }

    #[test]
    fn rediscount_keeps_lines_and_tax() {
        let mut inv = invoice(190.0, 0.0, InvoiceStatus::Draft);
        inv.tax_amount = 10.0;
        let totals = inv.rediscount(25.5).unwrap();
        assert_eq!(totals.subtotal, 190.0);
        assert_eq!(totals.total_amount, 174.5);
        assert_eq!(totals.balance_due, 174.5);
        assert!(inv.rediscount(200.01).is_err());
        assert!(inv.rediscount(-1.0).is_err());
    }

    #[test]
    fn partial_then_paid() {
        let now = Utc::now();
        let inv = invoice(100.0, 0.0, InvoiceStatus::Sent);
        let first = inv.apply_payment(40.0, now).unwrap();
        assert_eq!(first.status, InvoiceStatus::Partial);
        assert_eq!(first.balance_due, 60.0);
        assert_eq!(first.paid_date, None);

        let inv = invoice(100.0, 40.0, InvoiceStatus::Partial);
        let second = inv.apply_payment(60.0, now).unwrap();
        assert_eq!(second.status, InvoiceStatus::Paid);
        assert_eq!(second.balance_due, 0.0);
        assert_eq!(second.paid_date, Some(now));
    }

    #[test]
    fn paid_and_cancelled_invoices_refuse_payments() {
        let now = Utc::now();
        assert!(invoice(100.0, 100.0, InvoiceStatus::Paid).apply_payment(1.0, now).is_err());
        assert!(invoice(100.0, 0.0, InvoiceStatus::Cancelled).apply_payment(1.0, now).is_err());
    }

    #[test]
    fn overpayment_is_rejected() {
        let inv = invoice(100.0, 0.0, InvoiceStatus::Draft);
        assert!(inv.apply_payment(100.01, Utc::now()).is_err());
        assert!(inv.apply_payment(0.0, Utc::now()).is_err());
    }

    #[test]
    fn overdue_only_for_sent_or_partial_past_due() {
        let now = Utc::now();
        let mut inv = invoice(100.0, 0.0, InvoiceStatus::Sent);
        inv.due_date = Some(now - Duration::days(1));
        assert!(inv.is_overdue(now));
        inv.status = InvoiceStatus::Draft;
        assert!(!inv.is_overdue(now));
    }

    #[test]
    fn invoice_number_is_zero_padded() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert_eq!(format_invoice_number(day, 7), "INV-20240209-0007");
    }
}
