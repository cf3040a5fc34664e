//! HTTP handlers

pub mod auth;
pub mod envelope;
pub mod invoices;
pub mod status;

pub use auth::AuthUser;
pub use envelope::ApiResponse;
pub use invoices::invoice_router;
pub use status::{status_router, track_latency, StatusState};
