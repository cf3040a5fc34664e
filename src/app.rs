//! Router assembly and service wiring
//!
//! ```text
//!            ┌── /invoices ───────> InvoiceService ──> repository, gateway,
//!            │                                          renderer, notifier
//! Router ────┼── /webhook ────────> EventProcessor ──> InvoiceService (reconciler)
//!            │
//!            └── /health /ready /status /metrics
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::business::{BusinessDirectory, InMemoryBusinessDirectory};
use crate::config::AppConfig;
use crate::cors::{cors_layer, CorsConfig};
use crate::handlers::{invoice_router, status_router, track_latency, StatusState};
use crate::invoice::{InMemoryInvoiceRepository, InvoiceRepository, InvoiceService, InvoiceSettings};
use crate::notify::{HttpMailer, LogMailer, NotificationSender};
use crate::render::{DocumentRenderer, PdfRenderer};
use crate::stripe::{
    stripe_webhook_router, EventProcessor, PaymentGateway, SignatureVerifier, StripeClient,
    StripeWebhookState,
};

/// Everything the router needs
#[derive(Clone)]
pub struct AppServices {
    pub invoices: Arc<InvoiceService>,
    pub webhook: Arc<StripeWebhookState>,
    pub status: Arc<StatusState>,
    pub cors: CorsConfig,
}

impl AppServices {
    /// Wire the webhook pipeline onto an existing invoice service
    pub fn new(
        invoices: Arc<InvoiceService>,
        verifier: SignatureVerifier,
        webhook_timeout: Duration,
        cors: CorsConfig,
    ) -> Self {
        let processor = EventProcessor::new(invoices.clone(), webhook_timeout);
        Self {
            invoices,
            webhook: Arc::new(StripeWebhookState::new(verifier, processor)),
            status: Arc::new(StatusState::new()),
            cors,
        }
    }

    /// Build the production service graph from configuration
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let businesses = match &config.business_profiles_path {
            Some(path) => InMemoryBusinessDirectory::load(path)
                .with_context(|| format!("loading business profiles from {}", path.display()))?,
            None => {
                warn!("BUSINESS_PROFILES_PATH not set; every create will require setup");
                InMemoryBusinessDirectory::new()
            }
        };
        info!(profiles = businesses.len(), "Business directory ready");

        let gateway = StripeClient::new(&config.stripe).context("building Stripe client")?;

        let notifier: Arc<dyn NotificationSender> = match &config.mail.api_url {
            Some(url) => Arc::new(
                HttpMailer::new(url.clone(), &config.mail).context("building mail client")?,
            ),
            None => {
                warn!("MAIL_API_URL not set; invoice emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        let invoices: Arc<dyn InvoiceRepository> = Arc::new(InMemoryInvoiceRepository::new());
        let businesses: Arc<dyn BusinessDirectory> = Arc::new(businesses);
        let gateway: Arc<dyn PaymentGateway> = Arc::new(gateway);
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(PdfRenderer::new());

        let service = Arc::new(InvoiceService::new(
            invoices,
            businesses,
            gateway,
            renderer,
            notifier,
            InvoiceSettings::from_config(config),
        ));

        let verifier = SignatureVerifier::new(
            config.stripe.webhook_secret.clone(),
            config.stripe.webhook_tolerance,
        );

        // A reconcile may wait on one gateway lookup and then the store.
        let webhook_timeout = config.stripe.request_timeout.saturating_mul(2);

        Ok(Self::new(
            service,
            verifier,
            webhook_timeout,
            CorsConfig::new(config.allowed_origins.iter()),
        ))
    }

    /// Assemble the full HTTP surface
    pub fn router(&self) -> Router {
        Router::new()
            .merge(invoice_router(self.invoices.clone()))
            .merge(stripe_webhook_router(self.webhook.clone()))
            .merge(status_router(self.status.clone()))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors_layer(self.cors.clone()))
                    .layer(middleware::from_fn_with_state(
                        self.status.clone(),
                        track_latency,
                    )),
            )
    }
}
