pub mod invoice;

pub use invoice::{
    Invoice, InvoiceItem, InvoiceStatus, InvoiceTotals, Payment, PaymentMethod, PaymentOutcome,
    format_invoice_number,
};
