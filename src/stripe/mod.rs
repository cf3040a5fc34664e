//! Stripe integration
//!
//! Outbound: hosted checkout sessions for invoices ([`client`]).
//! Inbound: signed `checkout.session.*` webhooks that reconcile invoice
//! status ([`signature`], [`events`], [`processor`], [`handler`]).
//!
//! ```text
//! POST /webhook -> Signature Verify -> Parse -> Dispatch -> 200 {received:true}
//!                        |               |          |
//!                        v               v          v
//!                       400             400        500 (Stripe retries)
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod handler;
pub mod processor;
pub mod signature;

pub use client::{CheckoutLink, CheckoutRequest, PaymentGateway, StripeClient};
pub use error::{GatewayError, GatewayResult, StripeWebhookError, StripeWebhookResult};
pub use events::{CheckoutSession, StripeEvent, StripeEventType};
pub use handler::{stripe_webhook_handler, stripe_webhook_router, StripeWebhookState};
pub use processor::{CheckoutReconciler, EventProcessor, ProcessOutcome, ReconcileOutcome};
pub use signature::SignatureVerifier;
