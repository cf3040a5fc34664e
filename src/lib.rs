//! InvoicePay - invoicing backend with hosted checkout links
//!
//! Freelancers and small businesses create invoices; each one gets a Stripe
//! checkout link, a PDF copy and an email to the client. Stripe webhooks drive
//! the invoice to PAID or OVERDUE.
//!
//! # Architecture
//!
//! ```text
//! HTTP ──▶ handlers ──▶ InvoiceService ──▶ InvoiceRepository
//!                            │   │  │
//!                            │   │  └──▶ NotificationSender (email + PDF)
//!                            │   └─────▶ DocumentRenderer
//!                            └─────────▶ PaymentGateway (Stripe)
//!
//! Stripe ──▶ /webhook ──▶ SignatureVerifier ──▶ EventProcessor
//!                                                   │
//!                                                   ▼
//!                                  CheckoutReconciler (InvoiceService)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use invoicepay::{AppConfig, AppServices};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let app = AppServices::from_config(&config)?.router();
//!
//!     let listener = tokio::net::TcpListener::bind((config.host, config.port)).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod app;
pub mod business;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod invoice;
pub mod metrics;
pub mod notify;
pub mod render;
pub mod stripe;

// Re-exports for convenience
pub use app::AppServices;
pub use business::{Business, BusinessDirectory, InMemoryBusinessDirectory};
pub use config::{AppConfig, ConfigError};
pub use error::{Error, Result};
pub use invoice::{Invoice, InvoiceService, InvoiceStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
