//! Invoice document rendering
//!
//! Rendering is a pure function of an [`InvoiceDocument`] snapshot: no I/O,
//! no clock. The issue date printed is the invoice's creation time, so
//! re-rendering the same invoice yields the same bytes.

pub mod pdf;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::business::{Business, SenderIdentity};
use crate::invoice::model::{Invoice, InvoiceStatus};
use crate::invoice::numbering::format_invoice_number;

pub use pdf::PdfRenderer;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// Document assembly failed
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Serialization to bytes failed
    #[error("PDF write error: {0}")]
    Io(#[from] std::io::Error),
}

/// One printed row
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLine {
    pub description: String,
    pub quantity: u32,
    pub amount: Decimal,
}

/// Everything printed on an invoice, resolved ahead of rendering
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub display_offset: FixedOffset,
    pub sender: SenderIdentity,
    pub client_name: String,
    pub client_email: String,
    pub currency: String,
    pub lines: Vec<DocumentLine>,
    pub total: Decimal,
    pub payment_link: Option<String>,
    pub brand_name: String,
}

impl InvoiceDocument {
    /// Snapshot an invoice and its issuer for rendering
    pub fn new(
        invoice: &Invoice,
        business: &Business,
        display_offset: FixedOffset,
        brand_name: &str,
    ) -> Self {
        Self {
            invoice_number: format_invoice_number(invoice.invoice_number, Some(&business.name)),
            status: invoice.status,
            issued_at: invoice.created_at,
            due_date: invoice.due_date,
            display_offset,
            sender: business.sender_identity(),
            client_name: invoice.client_name.clone(),
            client_email: invoice.client_email.clone(),
            currency: invoice.currency.clone(),
            lines: invoice
                .items
                .iter()
                .map(|item| DocumentLine {
                    description: item.description.clone(),
                    quantity: item.quantity,
                    amount: item.amount,
                })
                .collect(),
            total: invoice.total,
            payment_link: invoice.payment_link.clone(),
            brand_name: brand_name.to_string(),
        }
    }

    /// Date in the display offset, e.g. `07 Nov 2026`
    pub fn display_date(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.display_offset)
            .format("%d %b %Y")
            .to_string()
    }

    /// Amount with currency code and two decimals
    pub fn display_amount(&self, amount: Decimal) -> String {
        format!("{} {:.2}", self.currency, amount)
    }

    /// Attachment file name
    pub fn file_name(&self) -> String {
        format!("{}.pdf", self.invoice_number)
    }
}

/// Produces a binary document from a snapshot
pub trait DocumentRenderer: Send + Sync + 'static {
    /// MIME type of the produced bytes
    fn content_type(&self) -> &'static str;

    /// Render the document
    fn render(&self, document: &InvoiceDocument) -> Result<Vec<u8>, RenderError>;
}
