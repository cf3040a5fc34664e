//! Invoice lifecycle orchestration
//!
//! # Create
//!
//! ```text
//! validate -> business check -> insert (number assigned) -> checkout session
//!                                                              |
//!                                  failure: delete invoice <---+
//!                                                              |
//!                                   attach link -> commit point
//!                                                              |
//!                                  render PDF -> send email (best-effort)
//! ```
//!
//! Everything after the commit point is post-commit delivery: its failure is
//! reported in [`CreatedInvoice::email`] and never rolls the invoice back.
//!
//! # Reconcile
//!
//! `UNPAID|OVERDUE|FAILED -> PAID` on checkout completion, and
//! `UNPAID -> OVERDUE` on checkout expiry once the due date has passed. Both
//! are compare-and-set against the status read, so duplicate deliveries apply
//! at most once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::business::{require_complete, Business, BusinessDirectory};
use crate::config::{normalize_currency, AppConfig};
use crate::error::{Error, Result};
use crate::invoice::model::{Invoice, InvoiceDraft, InvoiceStatus, PaymentCompletion, StatusUpdate};
use crate::invoice::numbering::format_invoice_number;
use crate::invoice::repository::InvoiceRepository;
use crate::invoice::request::{CreateInvoiceRequest, ListQuery};
use crate::invoice::view::{BusinessView, InvoiceList, InvoiceView, Pagination};
use crate::metrics::global_metrics;
use crate::notify::{invoice_email, Attachment, Notification, NotificationSender, NotifyError};
use crate::render::{DocumentRenderer, InvoiceDocument};
use crate::stripe::client::{CheckoutRequest, PaymentGateway};
use crate::stripe::error::GatewayError;
use crate::stripe::events::CheckoutSession;
use crate::stripe::processor::{CheckoutReconciler, ReconcileOutcome};

/// Payment method recorded when the gateway cannot say
pub const UNKNOWN_PAYMENT_METHOD: &str = "unknown";

const MAX_TRANSITION_ATTEMPTS: usize = 3;

/// Settings the orchestrator needs from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct InvoiceSettings {
    pub default_currency: String,
    pub brand_name: String,
    pub display_offset: FixedOffset,
    pub gateway_timeout: Duration,
    pub notification_timeout: Duration,
}

impl InvoiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_currency: config.default_currency.clone(),
            brand_name: config.brand_name.clone(),
            display_offset: config.display_offset,
            gateway_timeout: config.stripe.request_timeout,
            notification_timeout: config.mail.timeout,
        }
    }
}

/// Outcome of the post-commit email step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDelivery {
    Sent,
    Failed,
}

/// A created invoice and how its email fared
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedInvoice {
    pub invoice: InvoiceView,
    pub email: EmailDelivery,
}

/// The invoice orchestrator
#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    businesses: Arc<dyn BusinessDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    renderer: Arc<dyn DocumentRenderer>,
    notifier: Arc<dyn NotificationSender>,
    settings: InvoiceSettings,
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        businesses: Arc<dyn BusinessDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: Arc<dyn NotificationSender>,
        settings: InvoiceSettings,
    ) -> Self {
        Self {
            invoices,
            businesses,
            gateway,
            renderer,
            notifier,
            settings,
        }
    }

    /// Create an invoice, issue its payment link and email it to the client
    #[instrument(skip(self, request), fields(owner_id = %owner_id))]
    pub async fn create(
        &self,
        owner_id: &str,
        request: CreateInvoiceRequest,
    ) -> Result<CreatedInvoice> {
        let validated = request.validate()?;
        let business = require_complete(self.businesses.find_by_owner(owner_id).await?)?;

        let currency = validated
            .currency
            .or_else(|| {
                business
                    .default_currency
                    .as_deref()
                    .and_then(normalize_currency)
            })
            .unwrap_or_else(|| self.settings.default_currency.clone());

        let draft = InvoiceDraft::new(
            owner_id,
            Some(business.id),
            validated.client_name,
            validated.client_email,
            currency,
            validated.due_date,
            validated.items,
        )
        .ok_or_else(|| Error::validation("items total is too large."))?;
        let invoice = self.invoices.create(draft).await?;
        let formatted = format_invoice_number(invoice.invoice_number, Some(&business.name));

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_number = %formatted,
            total = %invoice.total,
            currency = %invoice.currency,
            "Invoice persisted; requesting payment link"
        );

        let checkout = CheckoutRequest {
            invoice_id: invoice.id,
            invoice_number: formatted,
            amount: invoice.total,
            currency: invoice.currency.clone(),
            customer_email: invoice.client_email.clone(),
        };
        let link = match bounded(
            self.settings.gateway_timeout,
            self.gateway.create_checkout_session(&checkout),
        )
        .await
        {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!(invoice_id = %invoice.id, error = %e, "Payment link generation failed");
                global_metrics().record_payment_link_failure();
                self.compensate(invoice.id, None).await;
                return Err(Error::PaymentLink(e.to_string()));
            }
        };

        let invoice = match self
            .invoices
            .attach_payment_link(invoice.id, &link.url, &link.session_id)
            .await
        {
            Ok(invoice) => invoice,
            Err(e) => {
                tracing::error!(invoice_id = %invoice.id, error = %e, "Failed to record payment link");
                self.compensate(invoice.id, Some(&link.session_id)).await;
                return Err(e.into());
            }
        };
        global_metrics().record_invoice_created();

        let email = self.deliver(&invoice, &business, &link.url).await;

        Ok(CreatedInvoice {
            invoice: InvoiceView::project(&invoice, Some(BusinessView::summary(&business))),
            email,
        })
    }

    /// One page of the owner's invoices, newest number first
    #[instrument(skip(self, query), fields(owner_id = %owner_id))]
    pub async fn list(&self, owner_id: &str, query: &ListQuery) -> Result<InvoiceList> {
        let (page, limit) = query.resolve();
        let offset = (page - 1).saturating_mul(limit);

        let result = self.invoices.list_for_owner(owner_id, offset, limit).await?;
        let business = self.businesses.find_by_owner(owner_id).await?;

        let data = result
            .invoices
            .iter()
            .map(|invoice| {
                let summary = business
                    .as_ref()
                    .filter(|b| invoice.business_id == Some(b.id))
                    .map(BusinessView::summary);
                InvoiceView::project(invoice, summary)
            })
            .collect();

        Ok(InvoiceList {
            data,
            pagination: Pagination::new(result.total, page, limit),
        })
    }

    /// A single invoice with items and business details
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %id))]
    pub async fn get(&self, owner_id: &str, id: Uuid) -> Result<InvoiceView> {
        let invoice = self.owned(owner_id, id).await?;
        let business = self
            .businesses
            .find_by_owner(owner_id)
            .await?
            .filter(|b| invoice.business_id == Some(b.id));

        Ok(InvoiceView::project(
            &invoice,
            business.as_ref().map(BusinessView::detailed),
        ))
    }

    /// Delete an unpaid invoice, expiring its checkout session first
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %id))]
    pub async fn delete(&self, owner_id: &str, id: Uuid) -> Result<()> {
        let invoice = self.owned(owner_id, id).await?;
        if invoice.status.is_paid() {
            return Err(Error::Conflict("Cannot delete a paid invoice".to_string()));
        }

        if let Some(session_id) = invoice.payment_session_id.as_deref() {
            self.expire_session(id, session_id).await;
        }

        if !self.invoices.delete(id).await? {
            return Err(Error::not_found("Invoice not found"));
        }

        global_metrics().record_invoice_deleted();
        tracing::info!("Invoice deleted");
        Ok(())
    }

    async fn owned(&self, owner_id: &str, id: Uuid) -> Result<Invoice> {
        self.invoices
            .find_for_owner(id, owner_id)
            .await?
            .ok_or_else(|| Error::not_found("Invoice not found"))
    }

    /// Undo a create whose payment link could not be recorded
    async fn compensate(&self, id: Uuid, session_id: Option<&str>) {
        if let Some(session_id) = session_id {
            self.expire_session(id, session_id).await;
        }

        match self.invoices.delete(id).await {
            Ok(_) => tracing::info!(invoice_id = %id, "Rolled back partially created invoice"),
            Err(e) => {
                global_metrics().record_compensation_failure();
                tracing::error!(
                    invoice_id = %id,
                    error = %e,
                    "Compensating delete failed; invoice needs manual cleanup"
                );
            }
        }
    }

    async fn expire_session(&self, id: Uuid, session_id: &str) {
        if let Err(e) = bounded(
            self.settings.gateway_timeout,
            self.gateway.expire_checkout_session(session_id),
        )
        .await
        {
            tracing::warn!(
                invoice_id = %id,
                session_id = %session_id,
                error = %e,
                "Could not expire checkout session"
            );
        }
    }

    /// Render the PDF and email the client. Never fails the caller.
    async fn deliver(&self, invoice: &Invoice, business: &Business, link: &str) -> EmailDelivery {
        let document = InvoiceDocument::new(
            invoice,
            business,
            self.settings.display_offset,
            &self.settings.brand_name,
        );

        let attachment = match self.renderer.render(&document) {
            Ok(bytes) => Some(Attachment {
                file_name: document.file_name(),
                content_type: self.renderer.content_type().to_string(),
                bytes,
            }),
            Err(e) => {
                tracing::warn!(invoice_id = %invoice.id, error = %e, "PDF rendering failed; sending without attachment");
                None
            }
        };

        let (subject, html) = invoice_email(&document, link);
        let notification = Notification {
            to: invoice.client_email.clone(),
            subject,
            html,
            attachment,
        };

        let limit = self.settings.notification_timeout;
        let sent = tokio::time::timeout(limit, self.notifier.send(&notification))
            .await
            .unwrap_or(Err(NotifyError::Timeout(limit)));

        match sent {
            Ok(()) => {
                global_metrics().record_email(true);
                tracing::info!(invoice_id = %invoice.id, "Invoice email sent");
                EmailDelivery::Sent
            }
            Err(e) => {
                global_metrics().record_email(false);
                tracing::error!(invoice_id = %invoice.id, error = %e, "Invoice email failed");
                EmailDelivery::Failed
            }
        }
    }

    async fn payment_method_for(&self, session: &CheckoutSession) -> String {
        let Some(intent) = session.payment_intent.as_deref() else {
            return UNKNOWN_PAYMENT_METHOD.to_string();
        };

        match bounded(
            self.settings.gateway_timeout,
            self.gateway.payment_method_type(intent),
        )
        .await
        {
            Ok(Some(method)) => method,
            Ok(None) => UNKNOWN_PAYMENT_METHOD.to_string(),
            Err(e) => {
                tracing::warn!(payment_intent = %intent, error = %e, "Payment method lookup failed");
                UNKNOWN_PAYMENT_METHOD.to_string()
            }
        }
    }
}

#[async_trait]
impl CheckoutReconciler for InvoiceService {
    async fn on_checkout_completed(
        &self,
        invoice_id: Uuid,
        session: &CheckoutSession,
    ) -> anyhow::Result<ReconcileOutcome> {
        let Some(invoice) = self.invoices.find_by_id(invoice_id).await? else {
            return Ok(ReconcileOutcome::InvoiceMissing);
        };
        if invoice.status.is_paid() {
            return Ok(ReconcileOutcome::Unchanged);
        }

        let payment = PaymentCompletion {
            session_id: session.id.clone(),
            payment_intent_id: session.payment_intent.clone(),
            payment_method: self.payment_method_for(session).await,
            metadata: session.metadata.clone(),
        };

        let mut observed = invoice.status;
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let update = StatusUpdate::paid(Utc::now(), payment.clone());
            if self
                .invoices
                .update_status(invoice_id, observed, update)
                .await?
                .is_some()
            {
                global_metrics().record_transition(InvoiceStatus::Paid);
                tracing::info!(invoice_id = %invoice_id, from = %observed, "Invoice marked paid");
                return Ok(ReconcileOutcome::Transitioned);
            }

            // Status moved under us; re-read and retry unless it is now paid or gone
            match self.invoices.find_by_id(invoice_id).await? {
                None => return Ok(ReconcileOutcome::InvoiceMissing),
                Some(current) if current.status.is_paid() => {
                    return Ok(ReconcileOutcome::Unchanged)
                }
                Some(current) => observed = current.status,
            }
        }

        anyhow::bail!("invoice {invoice_id} status kept changing; giving up")
    }

    async fn on_checkout_expired(
        &self,
        invoice_id: Uuid,
        _session: &CheckoutSession,
    ) -> anyhow::Result<ReconcileOutcome> {
        let Some(invoice) = self.invoices.find_by_id(invoice_id).await? else {
            return Ok(ReconcileOutcome::InvoiceMissing);
        };

        // Compared against processing time, not event time
        let now = Utc::now();
        if invoice.status != InvoiceStatus::Unpaid || now <= invoice.due_date {
            return Ok(ReconcileOutcome::Unchanged);
        }

        let moved = self
            .invoices
            .update_status(invoice_id, InvoiceStatus::Unpaid, StatusUpdate::overdue(now))
            .await?;

        Ok(match moved {
            Some(_) => {
                global_metrics().record_transition(InvoiceStatus::Overdue);
                tracing::info!(invoice_id = %invoice_id, "Invoice marked overdue");
                ReconcileOutcome::Transitioned
            }
            None => ReconcileOutcome::Unchanged,
        })
    }
}

/// Run a gateway call under a time bound
async fn bounded<T, F>(limit: Duration, call: F) -> std::result::Result<T, GatewayError>
where
    F: Future<Output = std::result::Result<T, GatewayError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(GatewayError::Timeout(limit)))
}
