//! Webhook event dispatch
//!
//! Verified events are dispatched inline, under a time bound, to a
//! [`CheckoutReconciler`]. The response to Stripe waits for the outcome so a
//! storage failure surfaces as a 500 and Stripe redelivers the event.
//!
//! ```text
//! Verified event
//!       |
//!       v
//! [Known type?] --no--> Ignored
//!       |
//!       v
//! [invoiceId in metadata?] --no--> Ignored
//!       |
//!       v
//! [Reconciler] --> Transitioned | Unchanged | InvoiceMissing
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use uuid::Uuid;

use crate::stripe::error::{StripeWebhookError, StripeWebhookResult};
use crate::stripe::events::{CheckoutSession, StripeEvent, StripeEventType};

/// What a reconciler did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The invoice changed status
    Transitioned,
    /// The guard held; nothing changed
    Unchanged,
    /// No invoice with that id
    InvoiceMissing,
}

/// Why an event was acknowledged without reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Event type not handled
    UnhandledType,
    /// Session metadata carries no invoice id
    NoInvoiceReference,
    /// Invoice id present but not a UUID
    UnparseableInvoiceReference,
}

/// Result of processing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Ignored(IgnoreReason),
    Reconciled(ReconcileOutcome),
}

impl ProcessOutcome {
    /// Label used in metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored(_) => "ignored",
            Self::Reconciled(ReconcileOutcome::Transitioned) => "transitioned",
            Self::Reconciled(ReconcileOutcome::Unchanged) => "unchanged",
            Self::Reconciled(ReconcileOutcome::InvoiceMissing) => "invoice_missing",
        }
    }
}

/// Applies checkout outcomes to invoices
#[async_trait]
pub trait CheckoutReconciler: Send + Sync + 'static {
    /// Payment collected for `invoice_id`
    async fn on_checkout_completed(
        &self,
        invoice_id: Uuid,
        session: &CheckoutSession,
    ) -> anyhow::Result<ReconcileOutcome>;

    /// Checkout for `invoice_id` expired unpaid
    async fn on_checkout_expired(
        &self,
        invoice_id: Uuid,
        session: &CheckoutSession,
    ) -> anyhow::Result<ReconcileOutcome>;
}

/// Dispatches verified events to a reconciler
#[derive(Clone)]
pub struct EventProcessor {
    reconciler: Arc<dyn CheckoutReconciler>,
    processing_timeout: Duration,
}

impl EventProcessor {
    pub fn new(reconciler: Arc<dyn CheckoutReconciler>, processing_timeout: Duration) -> Self {
        Self {
            reconciler,
            processing_timeout,
        }
    }

    /// Process one event to completion
    pub async fn process(&self, event: &StripeEvent) -> StripeWebhookResult<ProcessOutcome> {
        let event_type = event.typed_event_type();
        if !event_type.is_known() {
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Ignoring unhandled event type"
            );
            return Ok(ProcessOutcome::Ignored(IgnoreReason::UnhandledType));
        }

        let session = event.as_checkout_session()?;
        let invoice_id = match session.invoice_id() {
            None => {
                tracing::debug!(
                    event_id = %event.id,
                    session_id = %session.id,
                    "Checkout session has no invoice reference"
                );
                return Ok(ProcessOutcome::Ignored(IgnoreReason::NoInvoiceReference));
            }
            Some(Err(e)) => {
                tracing::warn!(
                    event_id = %event.id,
                    session_id = %session.id,
                    error = %e,
                    "Ignoring checkout session with unparseable invoice reference"
                );
                return Ok(ProcessOutcome::Ignored(
                    IgnoreReason::UnparseableInvoiceReference,
                ));
            }
            Some(Ok(id)) => id,
        };

        let dispatch = async {
            match event_type {
                StripeEventType::CheckoutSessionCompleted => {
                    self.reconciler
                        .on_checkout_completed(invoice_id, &session)
                        .await
                }
                StripeEventType::CheckoutSessionExpired => {
                    self.reconciler
                        .on_checkout_expired(invoice_id, &session)
                        .await
                }
                StripeEventType::Unknown => Ok(ReconcileOutcome::Unchanged),
            }
        };

        let outcome = timeout(self.processing_timeout, dispatch)
            .await
            .map_err(|_| {
                StripeWebhookError::ProcessingFailed(format!(
                    "Processing timed out after {:?}",
                    self.processing_timeout
                ))
            })?
            .map_err(|e| StripeWebhookError::ProcessingFailed(e.to_string()))?;

        tracing::info!(
            event_id = %event.id,
            event_type = event_type.as_str(),
            invoice_id = %invoice_id,
            outcome = ?outcome,
            "Webhook event reconciled"
        );

        Ok(ProcessOutcome::Reconciled(outcome))
    }
}
