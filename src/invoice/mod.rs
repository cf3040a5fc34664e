//! Invoices: domain model, persistence, request/response shapes and the
//! lifecycle orchestrator.

pub mod model;
pub mod numbering;
pub mod repository;
pub mod request;
pub mod service;
pub mod view;

pub use model::{Invoice, InvoiceStatus, LineItem};
pub use repository::{InMemoryInvoiceRepository, InvoiceRepository, RepositoryError};
pub use request::{CreateInvoiceRequest, ListQuery};
pub use service::{CreatedInvoice, EmailDelivery, InvoiceService, InvoiceSettings};
pub use view::{InvoiceList, InvoiceView, Pagination};
