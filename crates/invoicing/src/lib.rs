//! `cargoflow-invoicing` — freight invoices (client-owned, shipment-linked).

pub mod invoice;

pub use invoice::{
    ChargeLine, Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceStatus, IssueInvoice,
    RegisterPayment, VoidInvoice,
};
